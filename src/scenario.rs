//! A scenario describes one site: the water to handle, the space available and the user's
//! preferences. It is built from a JSON request and checked before any technology is evaluated.
use crate::surface::stormwater::SoilClass;
use crate::technology::{
    Burden, Catalog, Climate, ConcentrationPollutant, EcosystemService, RemovalPollutant,
    TechnologyID, WaterType,
};
use crate::units::{Area, Flow, Volume};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::str::FromStr;
use strum::IntoEnumIterator;

/// Daily water use per person when the user doesn't give one (litres)
pub const DEFAULT_LITRES_PER_PERSON: f64 = 120.0;

/// Duration of a rain event when the user doesn't give one (hours)
pub const DEFAULT_DURATION: f64 = 24.0;

/// The request body, as a JSON object
pub type Body = Map<String, Value>;

/// Inlet and outlet concentration for one pollutant (mg/L)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationTarget {
    /// Concentration of the incoming water
    pub inlet: f64,
    /// Concentration to reach, if any
    pub outlet: Option<f64>,
}

/// Concentration targets for each pollutant the user gave
pub type ConcentrationMap = IndexMap<ConcentrationPollutant, ConcentrationTarget>;

/// A validated request with defaults filled in
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Only consider these technologies
    pub tech_ids: Option<Vec<TechnologyID>>,
    /// The kind of water to handle
    pub water_type: WaterType,
    /// Treatment inflow
    pub inflow: Option<Flow>,
    /// Daily water use per person (litres)
    pub litres_per_person: f64,
    /// Whether vertical technologies are acceptable
    pub vertical: Option<bool>,
    /// Available horizontal area
    pub area: Option<Area>,
    /// Available vertical area
    pub vertical_area: Option<Area>,
    /// Climate zone of the site
    pub climate: Climate,
    /// Average yearly temperature (°C)
    pub avg_temperature: Option<f64>,
    /// Whether only household or building-scale solutions are wanted
    pub household: Option<bool>,
    /// Pollutants which must be removed
    pub pollutants: Vec<RemovalPollutant>,
    /// Pollutant concentrations at the inlet and outlet
    pub concentrations: ConcentrationMap,
    /// Minimum rating for each requested ecosystem service
    pub ecosystem_services: IndexMap<EcosystemService, u8>,
    /// Whether an energy supply is available
    pub energy: Option<bool>,
    /// Maximum tolerated rating for each operational burden
    pub burden_limits: IndexMap<Burden, u8>,
    /// Stormwater volume to manage
    pub volume: Option<Volume>,
    /// Duration of the rain event (hours)
    pub duration: f64,
    /// Soil infiltration rate (mm/h)
    pub infiltration_rate: Option<f64>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            tech_ids: None,
            water_type: WaterType::AnyWastewater,
            inflow: None,
            litres_per_person: DEFAULT_LITRES_PER_PERSON,
            vertical: None,
            area: None,
            vertical_area: None,
            climate: Climate::default(),
            avg_temperature: None,
            household: None,
            pollutants: Vec::new(),
            concentrations: ConcentrationMap::new(),
            ecosystem_services: IndexMap::new(),
            energy: None,
            burden_limits: IndexMap::new(),
            volume: None,
            duration: DEFAULT_DURATION,
            infiltration_rate: None,
        }
    }
}

impl Scenario {
    /// Population equivalents served by the inflow, if known
    pub fn population_equivalents(&self) -> Option<f64> {
        self.inflow
            .map(|inflow| inflow.value() * 1000.0 / self.litres_per_person)
    }

    /// Temperature used for kinetic corrections (°C)
    pub fn temperature(&self) -> f64 {
        self.avg_temperature.unwrap_or(20.0)
    }

    /// Whether any inlet concentration was given
    pub fn has_inlet_concentrations(&self) -> bool {
        !self.concentrations.is_empty()
    }

    /// Build a scenario from a JSON request.
    ///
    /// Fields are checked in a fixed order and the first problem found is returned as the error.
    ///
    /// # Arguments
    ///
    /// * `body` - The JSON request
    /// * `catalog` - The catalog, used to check technology IDs
    pub fn from_json(body: &Value, catalog: &Catalog) -> Result<Self> {
        let body = as_body(body)?;
        let mut scenario = Scenario::default();

        if let Some(value) = body.get("techIds") {
            scenario.tech_ids = Some(read_tech_ids(value, catalog)?);
        }

        if let Some(value) = body.get("waterType") {
            let name = value.as_str().context("waterType must be a string")?;
            scenario.water_type = WaterType::from_str(name)
                .ok()
                .context("waterType is not in the list")?;
        }

        scenario.inflow = read_positive(body, "inflow")?.map(Flow);
        if let Some(litres_per_person) = read_positive(body, "litresPerPerson")? {
            scenario.litres_per_person = litres_per_person;
        }
        if scenario.inflow.is_none()
            && let Some(inhabitants) = read_positive(body, "inhabitants")?
        {
            scenario.inflow = Some(Flow(inhabitants * scenario.litres_per_person / 1000.0));
        }

        scenario.vertical = read_bool(body, "vertical")?;
        scenario.area = read_positive(body, "area")?.map(Area);
        if body.contains_key("verticalArea") {
            ensure!(
                scenario.vertical != Some(false),
                "you are providing a vertical area but rejecting vertical technologies"
            );
            scenario.vertical_area = read_positive(body, "verticalArea")?.map(Area);
        }

        read_climate(body, &mut scenario)?;
        scenario.household = read_bool(body, "household")?;

        if let Some(value) = body.get("pollutants") {
            scenario.pollutants = read_pollutants(value)?;
        }
        if let Some(value) = body.get("ecosystemServices") {
            scenario.ecosystem_services = read_ecosystem_services(value)?;
        }
        if let Some(value) = body.get("pollutantsConcentrations") {
            scenario.concentrations = read_concentrations(value)?;
        }

        if let Some(value) = body.get("energy") {
            scenario.energy = match value.as_str() {
                Some("yes") => Some(true),
                Some("no") => Some(false),
                _ => bail!("energy must be \"yes\" or \"no\""),
            };
        }
        for (key, burden) in [
            ("manPower", Burden::Manpower),
            ("skills", Burden::Skills),
            ("biohazardRisk", Burden::Biohazard),
        ] {
            if let Some(limit) = read_level(body, key)? {
                scenario.burden_limits.insert(burden, limit);
            }
        }

        read_stormwater(body, &mut scenario)?;

        Ok(scenario)
    }
}

/// Check that the request is a JSON object
pub fn as_body(body: &Value) -> Result<&Body> {
    match body {
        Value::Object(body) => Ok(body),
        Value::Array(_) => bail!("body must be an object, not an array"),
        _ => bail!("body must be an object"),
    }
}

/// Read an array of technology IDs, each of which must be in the catalog
pub fn read_tech_ids(value: &Value, catalog: &Catalog) -> Result<Vec<TechnologyID>> {
    let ids = value.as_array().context("techIds must be an array")?;
    ids.iter()
        .map(|id| {
            let id = id.as_str().context("techIds must be an array of strings")?;
            catalog.get_id(id)
        })
        .collect()
}

fn read_positive(body: &Body, key: &str) -> Result<Option<f64>> {
    let Some(value) = body.get(key) else {
        return Ok(None);
    };

    let value = value
        .as_f64()
        .filter(|value| value.is_finite() && *value > 0.0)
        .with_context(|| format!("{key} must be a positive number"))?;

    Ok(Some(value))
}

fn read_bool(body: &Body, key: &str) -> Result<Option<bool>> {
    body.get(key)
        .map(|value| {
            value
                .as_bool()
                .with_context(|| format!("{key} must be true or false"))
        })
        .transpose()
}

/// Read an integer rating between 0 and 3
fn read_level(body: &Body, key: &str) -> Result<Option<u8>> {
    body.get(key).map(|value| as_level(value, key)).transpose()
}

fn as_level(value: &Value, key: &str) -> Result<u8> {
    value
        .as_u64()
        .and_then(|value| u8::try_from(value).ok())
        .filter(|value| *value <= 3)
        .with_context(|| format!("Value for {key} must be between 0 and 3"))
}

fn read_climate(body: &Body, scenario: &mut Scenario) -> Result<()> {
    let climate = body
        .get("climate")
        .map(|value| {
            value
                .as_str()
                .and_then(|name| Climate::from_str(name).ok())
                .context("climate is not in the list of accepted climates")
        })
        .transpose()?;

    if let Some(value) = body.get("avgTemperature") {
        let avg_temperature = value
            .as_f64()
            .filter(|value| value.is_finite())
            .context("avgTemperature must be a number")?;
        let derived = Climate::from_temperature(avg_temperature);
        ensure!(
            climate.is_none_or(|climate| climate == derived),
            "avgTemperature does not correspond with climate, pick one of both"
        );
        scenario.avg_temperature = Some(avg_temperature);
        scenario.climate = derived;
    } else if let Some(climate) = climate {
        scenario.climate = climate;
    }

    Ok(())
}

fn read_pollutants(value: &Value) -> Result<Vec<RemovalPollutant>> {
    let pollutants = value.as_array().context("pollutants must be an array")?;
    pollutants
        .iter()
        .map(|pollutant| {
            pollutant
                .as_str()
                .and_then(|name| RemovalPollutant::from_str(name).ok())
                .context("pollutants must be in the list")
        })
        .collect()
}

fn read_ecosystem_services(value: &Value) -> Result<IndexMap<EcosystemService, u8>> {
    let services = value
        .as_object()
        .filter(|services| !services.is_empty())
        .context("ecosystemServices must be an object with key:value")?;

    services
        .iter()
        .map(|(key, value)| {
            let service = EcosystemService::from_str(key).ok().with_context(|| {
                format!("{key} is not in the list of admitted ecosystem services")
            })?;
            Ok((service, as_level(value, key)?))
        })
        .collect()
}

/// Read inlet/outlet concentrations.
///
/// Every outlet needs its inlet and vice versa, except for BOD, whose inlet can be given alone.
fn read_concentrations(value: &Value) -> Result<ConcentrationMap> {
    let values = value
        .as_object()
        .context("pollutantsConcentrations must be an object")?;

    let mut inlets = IndexMap::new();
    let mut outlets = IndexMap::new();
    for (key, value) in values {
        let (pollutant, is_inlet) = parse_concentration_key(key)?;
        let value = value
            .as_f64()
            .filter(|value| value.is_finite() && *value > 0.0)
            .with_context(|| format!("{key} must be a positive number"))?;
        if is_inlet {
            inlets.insert(pollutant, value);
        } else {
            outlets.insert(pollutant, value);
        }
    }

    let mut concentrations = ConcentrationMap::new();
    for pollutant in ConcentrationPollutant::iter() {
        let inlet = inlets.get(&pollutant).copied();
        let outlet = outlets.get(&pollutant).copied();
        match (inlet, outlet) {
            (None, None) => continue,
            (None, Some(_)) => bail!("{pollutant}_out is provided without {pollutant}_in"),
            (Some(_), None) => ensure!(
                pollutant == ConcentrationPollutant::Bod,
                "{pollutant}_in is provided without {pollutant}_out"
            ),
            (Some(inlet), Some(outlet)) => ensure!(
                outlet < inlet,
                "{pollutant}_out must be lower than {pollutant}_in"
            ),
        }

        let inlet = inlet.unwrap_or_default();
        concentrations.insert(pollutant, ConcentrationTarget { inlet, outlet });
    }

    Ok(concentrations)
}

/// Split a key like `bod_in` into its pollutant and whether it is an inlet
fn parse_concentration_key(key: &str) -> Result<(ConcentrationPollutant, bool)> {
    let parsed = if let Some(pollutant) = key.strip_suffix("_in") {
        ConcentrationPollutant::from_str(pollutant).map(|pollutant| (pollutant, true))
    } else if let Some(pollutant) = key.strip_suffix("_out") {
        ConcentrationPollutant::from_str(pollutant).map(|pollutant| (pollutant, false))
    } else {
        bail!("{key} is not an accepted pollutant concentration")
    };

    parsed
        .ok()
        .with_context(|| format!("{key} is not an accepted pollutant concentration"))
}

/// Read the stormwater fields: volume (or rain and catchment), duration and infiltration
fn read_stormwater(body: &Body, scenario: &mut Scenario) -> Result<()> {
    let volume = read_positive(body, "volume")?;
    let cum_rain = read_positive(body, "cumRain")?;
    let catchment_area = read_positive(body, "catchmentArea")?;
    scenario.volume = match (volume, cum_rain, catchment_area) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            bail!("volume cannot be provided together with cumRain and catchmentArea")
        }
        (Some(volume), None, None) => Some(Volume(volume)),
        (None, Some(cum_rain), Some(catchment_area)) => {
            Some(Volume(cum_rain / 1000.0 * catchment_area))
        }
        (None, Some(_), None) | (None, None, Some(_)) => {
            bail!("cumRain and catchmentArea must be provided together")
        }
        (None, None, None) => None,
    };

    if let Some(duration) = read_positive(body, "duration")? {
        scenario.duration = duration;
    }

    let rate = read_positive(body, "infiltration")?;
    let soil = body
        .get("infiltrationSoils")
        .map(|value| {
            value
                .as_str()
                .and_then(|name| SoilClass::from_str(name).ok())
                .context("infiltrationSoils is not in the list of soil classes")
        })
        .transpose()?;
    scenario.infiltration_rate = match (rate, soil) {
        (Some(_), Some(_)) => bail!("provide either infiltration or infiltrationSoils, not both"),
        (Some(rate), None) => Some(rate),
        (None, Some(soil)) => Some(soil.infiltration_rate()),
        (None, None) => None,
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, catalog};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn test_defaults(catalog: Catalog) {
        let scenario = Scenario::from_json(&json!({}), &catalog).unwrap();
        assert_eq!(scenario, Scenario::default());
        assert_eq!(scenario.water_type, WaterType::AnyWastewater);
        assert_eq!(scenario.climate, Climate::Temperate);
        assert_eq!(scenario.population_equivalents(), None);
    }

    #[rstest]
    #[case(json!([]), "body must be an object, not an array")]
    #[case(json!("text"), "body must be an object")]
    #[case(json!(null), "body must be an object")]
    #[case(json!({"waterType": 3}), "waterType must be a string")]
    #[case(json!({"waterType": "sewage"}), "waterType is not in the list")]
    #[case(json!({"inflow": -1}), "inflow must be a positive number")]
    #[case(json!({"inflow": "100"}), "inflow must be a positive number")]
    #[case(json!({"inhabitants": "dds"}), "inhabitants must be a positive number")]
    #[case(json!({"area": 0}), "area must be a positive number")]
    #[case(json!({"verticalArea": -2}), "verticalArea must be a positive number")]
    #[case(
        json!({"vertical": false, "verticalArea": 10}),
        "you are providing a vertical area but rejecting vertical technologies"
    )]
    #[case(
        json!({"inflow": 1000, "climate": "mediterranean"}),
        "climate is not in the list of accepted climates"
    )]
    #[case(
        json!({"inflow": 100, "avgTemperature": -5, "climate": "tropical"}),
        "avgTemperature does not correspond with climate, pick one of both"
    )]
    #[case(json!({"household": "true"}), "household must be true or false")]
    #[case(json!({"pollutants": "c_removal"}), "pollutants must be an array")]
    #[case(json!({"pollutants": ["c_removal", "phosphorus"]}), "pollutants must be in the list")]
    #[case(
        json!({"ecosystemServices": {}}),
        "ecosystemServices must be an object with key:value"
    )]
    #[case(
        json!({"ecosystemServices": {"es_biodiversity": 2}}),
        "es_biodiversity is not in the list of admitted ecosystem services"
    )]
    #[case(
        json!({"ecosystemServices": {"es_biodiversity_fauna": true}}),
        "Value for es_biodiversity_fauna must be between 0 and 3"
    )]
    #[case(json!({"techIds": "WW"}), "techIds must be an array")]
    #[case(json!({"energy": true}), "energy must be \"yes\" or \"no\"")]
    #[case(json!({"manPower": 4}), "Value for manPower must be between 0 and 3")]
    #[case(json!({"waterType": "rain_water", "volume": -2}), "volume must be a positive number")]
    #[case(json!({"cumRain": 30}), "cumRain and catchmentArea must be provided together")]
    #[case(
        json!({"infiltration": 3, "infiltrationSoils": "clay"}),
        "provide either infiltration or infiltrationSoils, not both"
    )]
    fn test_invalid_requests(catalog: Catalog, #[case] body: Value, #[case] msg: &str) {
        assert_error!(Scenario::from_json(&body, &catalog), msg);
    }

    #[rstest]
    fn test_unknown_tech_id(catalog: Catalog) {
        assert_error!(
            Scenario::from_json(&json!({"techIds": ["French_CW", "XX"]}), &catalog),
            "Unknown technology ID XX"
        );
    }

    #[rstest]
    #[case(json!({"pollutantsConcentrations": ["bod_in", 10]}), "pollutantsConcentrations must be an object")]
    #[case(
        json!({"pollutantsConcentrations": {"c_in": 10, "c_out": 20}}),
        "c_in is not an accepted pollutant concentration"
    )]
    #[case(
        json!({"pollutantsConcentrations": {"bod_in": 10, "cod_out": 20}}),
        "cod_out is provided without cod_in"
    )]
    #[case(
        json!({"pollutantsConcentrations": {"cod_in": 10}}),
        "cod_in is provided without cod_out"
    )]
    #[case(
        json!({"pollutantsConcentrations": {"bod_in": 10, "bod_out": 20}}),
        "bod_out must be lower than bod_in"
    )]
    #[case(
        json!({"pollutantsConcentrations": {"tn_in": 0, "tn_out": 20}}),
        "tn_in must be a positive number"
    )]
    fn test_invalid_concentrations(catalog: Catalog, #[case] body: Value, #[case] msg: &str) {
        assert_error!(Scenario::from_json(&body, &catalog), msg);
    }

    #[rstest]
    fn test_bod_inlet_alone(catalog: Catalog) {
        let body = json!({"pollutantsConcentrations": {"bod_in": 80}});
        let scenario = Scenario::from_json(&body, &catalog).unwrap();
        assert_eq!(
            scenario.concentrations[&ConcentrationPollutant::Bod],
            ConcentrationTarget {
                inlet: 80.0,
                outlet: None
            }
        );
    }

    #[rstest]
    fn test_inflow_from_inhabitants(catalog: Catalog) {
        let body = json!({"inhabitants": 200, "litresPerPerson": 150});
        let scenario = Scenario::from_json(&body, &catalog).unwrap();
        assert_approx_eq!(Flow, scenario.inflow.unwrap(), Flow(30.0));
        assert_approx_eq!(f64, scenario.population_equivalents().unwrap(), 200.0);

        // inflow takes precedence
        let body = json!({"inflow": 50, "inhabitants": 200});
        let scenario = Scenario::from_json(&body, &catalog).unwrap();
        assert_eq!(scenario.inflow, Some(Flow(50.0)));
    }

    #[rstest]
    #[case(json!({"avgTemperature": -4}), Climate::Continental)]
    #[case(json!({"avgTemperature": 25, "climate": "tropical"}), Climate::Tropical)]
    #[case(json!({"climate": "dry"}), Climate::Dry)]
    #[case(json!({"avgTemperature": 10}), Climate::Temperate)]
    fn test_climate(catalog: Catalog, #[case] body: Value, #[case] expected: Climate) {
        let scenario = Scenario::from_json(&body, &catalog).unwrap();
        assert_eq!(scenario.climate, expected);
    }

    #[rstest]
    fn test_stormwater_fields(catalog: Catalog) {
        let body = json!({
            "waterType": "rain_water",
            "cumRain": 300,
            "catchmentArea": 1000,
            "duration": 2,
            "infiltrationSoils": "clay"
        });
        let scenario = Scenario::from_json(&body, &catalog).unwrap();
        assert_approx_eq!(Volume, scenario.volume.unwrap(), Volume(300.0));
        assert_eq!(scenario.duration, 2.0);
        assert_eq!(scenario.infiltration_rate, Some(0.6));
    }

    #[rstest]
    fn test_filters_read(catalog: Catalog) {
        let body = json!({
            "techIds": ["WW", "A_HA"],
            "pollutants": ["c_removal"],
            "ecosystemServices": {"es_recreation": 2},
            "energy": "no",
            "skills": 1
        });
        let scenario = Scenario::from_json(&body, &catalog).unwrap();
        assert_eq!(
            scenario.tech_ids,
            Some(vec![TechnologyID::new("WW"), TechnologyID::new("A_HA")])
        );
        assert_eq!(scenario.pollutants, [RemovalPollutant::CRemoval]);
        assert_eq!(
            scenario.ecosystem_services[&EcosystemService::EsRecreation],
            2
        );
        assert_eq!(scenario.energy, Some(false));
        assert_eq!(scenario.burden_limits[&Burden::Skills], 1);
    }
}
