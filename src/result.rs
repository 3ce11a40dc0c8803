//! Results for one technology: the catalog record plus everything estimated for the request.
use crate::mcda::Assessment;
use crate::surface::stormwater::StormwaterOutcome;
use crate::surface::{SurfaceBand, SurfaceEstimate, SurfaceMethod};
use crate::technology::{Catalog, ConcentrationPollutant, Technology};
use crate::units::{Area, Volume};
use anyhow::{Context, Result, bail};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::rc::Rc;
use std::str::FromStr;

/// A technology annotated with its estimates and scores
#[derive(Debug, Clone, PartialEq)]
pub struct TechnologyResult {
    /// The catalog record
    pub technology: Rc<Technology>,
    /// Surface estimate, if the request allowed one
    pub estimate: Option<SurfaceEstimate>,
    /// Stormwater sizing details
    pub stormwater: Option<StormwaterOutcome>,
    /// Multi-criteria scores, once assessed
    pub assessment: Option<Assessment>,
}

impl TechnologyResult {
    /// A result with nothing estimated yet
    pub fn new(technology: Rc<Technology>) -> Self {
        Self {
            technology,
            estimate: None,
            stormwater: None,
            assessment: None,
        }
    }

    /// A result with a surface estimate
    pub fn estimated(
        technology: Rc<Technology>,
        estimate: SurfaceEstimate,
        stormwater: Option<StormwaterOutcome>,
    ) -> Self {
        Self {
            estimate: Some(estimate),
            stormwater,
            ..Self::new(technology)
        }
    }

    /// Rebuild a result from a record produced by an earlier request.
    ///
    /// Catalog fields come from the catalog, looked up by `id`. Only estimate fields are read from
    /// the record itself.
    pub fn from_json(record: &Value, catalog: &Catalog) -> Result<Self> {
        let record = record
            .as_object()
            .context("techs must be an array of technology objects")?;
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .context("every technology in techs must have an id")?;
        let technology = catalog
            .get(id)
            .with_context(|| format!("Unknown technology ID {id}"))?
            .clone();

        let mut result = Self::new(technology);
        result.estimate = read_estimate(record).with_context(|| format!("Invalid record for {id}"))?;
        if result.estimate.is_some() {
            result.stormwater =
                read_stormwater(record).with_context(|| format!("Invalid record for {id}"))?;
        }

        Ok(result)
    }
}

fn read_number(record: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    record
        .get(key)
        .map(|value| {
            value
                .as_f64()
                .with_context(|| format!("{key} must be a number"))
        })
        .transpose()
}

fn read_band(record: &Map<String, Value>, prefix: &str) -> Result<Option<SurfaceBand>> {
    let Some(mean) = read_number(record, &format!("{prefix}_mean"))? else {
        return Ok(None);
    };
    let low = read_number(record, &format!("{prefix}_low"))?.unwrap_or(mean);
    let high = read_number(record, &format!("{prefix}_high"))?.unwrap_or(mean);

    Ok(Some(SurfaceBand {
        low: Area(low),
        mean: Area(mean),
        high: Area(high),
    }))
}

fn read_estimate(record: &Map<String, Value>) -> Result<Option<SurfaceEstimate>> {
    let surface = read_band(record, "surface")?;
    let vertical_surface = read_band(record, "vertical_surface")?;
    if surface.is_none() && vertical_surface.is_none() {
        return Ok(None);
    }

    let method = record
        .get("surface_method")
        .and_then(Value::as_str)
        .context("surface_method must be given with surface estimates")?;
    let Ok(method) = SurfaceMethod::from_str(method) else {
        bail!("Unknown surface_method {method}");
    };
    let pollutant = match record.get("surface_pollutant") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_str()
                .and_then(|name| ConcentrationPollutant::from_str(name).ok())
                .context("Unknown surface_pollutant")?,
        ),
    };

    Ok(Some(SurfaceEstimate {
        method,
        pollutant,
        surface: surface.unwrap_or_default(),
        vertical_surface: vertical_surface.unwrap_or_default(),
    }))
}

fn read_stormwater(record: &Map<String, Value>) -> Result<Option<StormwaterOutcome>> {
    let Some(daily_volume) = read_number(record, "daily_volume")? else {
        return Ok(None);
    };
    let enough_area = record
        .get("enough_area")
        .map(|value| value.as_bool().context("enough_area must be true or false"))
        .transpose()?;

    Ok(Some(StormwaterOutcome {
        daily_volume: Volume(daily_volume),
        enough_area,
        infiltration_rate: read_number(record, "infiltration_rate")?.unwrap_or(0.0),
    }))
}

fn serialize_band<M: SerializeMap>(
    map: &mut M,
    prefix: &str,
    band: &SurfaceBand,
) -> Result<(), M::Error> {
    map.serialize_entry(&format!("{prefix}_low"), &band.low)?;
    map.serialize_entry(&format!("{prefix}_mean"), &band.mean)?;
    map.serialize_entry(&format!("{prefix}_high"), &band.high)
}

impl Serialize for TechnologyResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.technology.serialize_entries(&mut map)?;

        if let Some(estimate) = &self.estimate {
            map.serialize_entry("surface_method", <&str>::from(estimate.method))?;
            if let Some(pollutant) = estimate.pollutant {
                map.serialize_entry("surface_pollutant", <&str>::from(pollutant))?;
            }
            serialize_band(&mut map, "surface", &estimate.surface)?;
            serialize_band(&mut map, "vertical_surface", &estimate.vertical_surface)?;
        }

        if let Some(stormwater) = &self.stormwater {
            map.serialize_entry("daily_volume", &stormwater.daily_volume)?;
            if let Some(enough_area) = stormwater.enough_area {
                map.serialize_entry("enough_area", &enough_area)?;
            }
            map.serialize_entry("infiltration_rate", &stormwater.infiltration_rate)?;
        }

        if let Some(assessment) = &self.assessment {
            assessment.serialize_entries(&mut map)?;
        }

        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, catalog};
    use crate::surface::MethodEstimate;
    use rstest::rstest;
    use serde_json::json;

    fn estimated(catalog: &Catalog, id: &str) -> TechnologyResult {
        let estimate = MethodEstimate {
            method: SurfaceMethod::HydraulicLoadRatio,
            pollutant: None,
            surface: SurfaceBand::with_uncertainty(Area(100.0)),
        };
        let technology = catalog.get(id).unwrap().clone();
        let vertical = technology.vertical;
        TechnologyResult::estimated(technology, SurfaceEstimate::new(estimate, vertical), None)
    }

    #[rstest]
    fn test_serialise_without_estimate(catalog: Catalog) {
        let result = TechnologyResult::new(catalog.get("WW").unwrap().clone());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["id"], "WW");
        assert!(value.get("surface_mean").is_none());
        assert!(value.get("vertical_surface_low").is_none());
        assert!(value.get("score").is_none());
    }

    #[rstest]
    fn test_serialise_with_estimate(catalog: Catalog) {
        let value = serde_json::to_value(estimated(&catalog, "French_CW")).unwrap();
        assert_eq!(value["surface_method"], "hydraulic_load_ratio");
        assert_eq!(value["surface_mean"], 100.0);
        assert_eq!(value["surface_low"], 75.0);
        assert_eq!(value["vertical_surface_high"], 0.0);
        assert!(value.get("surface_pollutant").is_none());
        assert!(value.get("daily_volume").is_none());
    }

    #[rstest]
    fn test_round_trip_through_json(catalog: Catalog) {
        let result = estimated(&catalog, "HF_GW");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(TechnologyResult::from_json(&value, &catalog).unwrap(), result);
    }

    #[rstest]
    fn test_from_json_ignores_catalog_fields(catalog: Catalog) {
        let record = json!({"id": "WW", "capex_low": 1e9});
        let result = TechnologyResult::from_json(&record, &catalog).unwrap();
        assert_eq!(result, TechnologyResult::new(catalog.get("WW").unwrap().clone()));
    }

    #[rstest]
    #[case(json!("WW"), "techs must be an array of technology objects")]
    #[case(json!({"name": "WW"}), "every technology in techs must have an id")]
    #[case(json!({"id": "XX"}), "Unknown technology ID XX")]
    #[case(json!({"id": "WW", "surface_mean": 10}), "Invalid record for WW")]
    fn test_from_json_invalid(catalog: Catalog, #[case] record: Value, #[case] msg: &str) {
        assert_error!(TechnologyResult::from_json(&record, &catalog), msg);
    }
}
