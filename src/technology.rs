//! Technologies are the nature-based solutions (NBS) in the catalog. The data structures in this
//! module describe what each technology can treat or store, the services it provides and what it
//! costs to build and run.
use crate::id::{IDCollection, define_id_type};
use crate::input::technology::{read_embedded_technologies, read_technologies};
use crate::units::{FlowPerArea, Length, MoneyPerArea};
use anyhow::Result;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::ops::RangeInclusive;
use std::path::Path;
use std::rc::Rc;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

define_id_type! {TechnologyID}

/// A map of [`Technology`]s, keyed by technology ID, in catalog order
pub type TechnologyMap = IndexMap<TechnologyID, Rc<Technology>>;

/// Above this area per population equivalent, a climate coefficient is a degenerate extrapolation
pub const DEGENERATE_M2_PE: f64 = 100_000.0;

/// The module a technology belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Module {
    /// Wastewater treatment, sized by inflow and pollutant loads
    Treatment,
    /// Stormwater management, sized by runoff volume
    Swm,
}

/// The kinds of water a technology may be asked to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum WaterType {
    /// Wastewater of any origin
    AnyWastewater,
    /// Untreated sewage from households
    RawDomesticWastewater,
    /// Water from sinks, showers and washing machines
    Greywater,
    /// Effluent of a secondary treatment stage
    SecondaryTreatedWastewater,
    /// Combined sewer overflow discharge
    CsoDischargeWater,
    /// Domestic sewage after primary treatment
    PretreatedDomesticWastewater,
    /// River water polluted by wastewater
    RiverDilutedWastewater,
    /// Wastewater from campsites, with seasonal loads
    CampingWastewater,
    /// Wastewater from office buildings
    OfficesWastewater,
    /// Rain collected from roofs
    RainWater,
    /// Runoff from paved and other sealed surfaces
    RunoffWater,
}

impl WaterType {
    /// The module whose technologies handle this kind of water
    pub fn module(self) -> Module {
        match self {
            Self::RainWater | Self::RunoffWater => Module::Swm,
            _ => Module::Treatment,
        }
    }
}

/// Climate zones, used to pick the area per population equivalent
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Climate {
    /// Warm all year
    Tropical,
    /// Arid or semi-arid
    Dry,
    /// Mild, with cool winters
    #[default]
    Temperate,
    /// Cold winters
    Continental,
}

impl Climate {
    /// Derive the climate zone from the average yearly temperature in °C.
    ///
    /// Dry climates can't be told apart by temperature, so they are never returned.
    pub fn from_temperature(avg_temperature: f64) -> Self {
        if avg_temperature < 3.0 {
            Self::Continental
        } else if avg_temperature < 18.0 {
            Self::Temperate
        } else {
            Self::Tropical
        }
    }

    /// The catalog column holding the area per population equivalent for this climate
    pub fn m2_pe_column(self) -> String {
        format!("m2_pe_{self}")
    }
}

/// Pollutant-removal capabilities which can be requested as targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RemovalPollutant {
    /// Organic carbon (BOD/COD)
    CRemoval,
    /// Ammonium, by nitrification
    NRemovalNitrification,
    /// Nitrate, by denitrification
    NRemovalNitrateremoval,
    /// Phosphorus
    PRemoval,
    /// Pathogens
    PathogensReduction,
}

/// Pollutants whose inlet/outlet concentrations drive surface estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConcentrationPollutant {
    /// Biochemical oxygen demand
    Bod,
    /// Chemical oxygen demand
    Cod,
    /// Total nitrogen
    Tn,
    /// Ammonium
    Nh4,
    /// Nitrate
    No3,
    /// Total phosphorus
    Tp,
}

/// Ecosystem services, rated 0 (none) to 3 (high) for each technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum EcosystemService {
    /// Habitat for animals
    EsBiodiversityFauna,
    /// Habitat for plants
    EsBiodiversityFlora,
    /// Local cooling
    EsTemperatureRegulation,
    /// Reduction of flood peaks
    EsFloodMitigation,
    /// Fewer combined sewer overflows
    EsCsoMitigation,
    /// Carbon stored in plants and soil
    EsCarbonSequestration,
    /// Harvestable biomass
    EsBiomassProduction,
    /// Visual amenity
    EsAestheticValue,
    /// Space for leisure
    EsRecreation,
    /// Support for pollinators
    EsPollination,
    /// Food production
    EsFoodSource,
    /// Treated water fit for reuse
    EsWaterReuse,
    /// Recoverable sludge and nutrients
    EsBiosolids,
}

/// Operational burdens, rated 0 (none) to 3 (high)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum Burden {
    /// Labour needed to run it
    #[strum(serialize = "inv_es_manpower")]
    Manpower,
    /// Expertise needed to run it
    #[strum(serialize = "inv_es_skills")]
    Skills,
    /// Health risk to operators
    #[strum(serialize = "inv_es_biohazard")]
    Biohazard,
}

/// The functional form of a fitted surface regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ModelForm {
    /// `y = a + b·x`
    Linear,
    /// `y = a·exp(b·x)`
    Exponential,
    /// `y = a·x^b`, fitted in log-log space
    Power,
}

/// A regression of surface (m²) against removed pollutant load (kg/day)
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionModel {
    /// The model form
    pub form: ModelForm,
    /// First coefficient
    pub a: f64,
    /// Second coefficient
    pub b: f64,
    /// Half-width of the prediction interval.
    ///
    /// Additive for linear and exponential models, in log space for power models.
    pub interval: f64,
    /// The range of removed loads the model was calibrated on
    pub load_range: RangeInclusive<f64>,
}

/// Parameters for sizing stormwater storage
#[derive(Debug, Clone, PartialEq)]
pub struct StorageParameters {
    /// Fraction of the structure volume available for water (pessimistic)
    pub capacity_low: f64,
    /// Fraction of the structure volume available for water (optimistic)
    pub capacity_high: f64,
    /// Depth of the structure
    pub depth: Length,
    /// Whether water can infiltrate into the soil below
    pub infiltration: bool,
}

/// A low/high cost range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRange {
    /// Low end of the range
    pub low: MoneyPerArea,
    /// High end of the range
    pub high: MoneyPerArea,
}

impl CostRange {
    /// Midpoint of the range
    pub fn mean(&self) -> MoneyPerArea {
        MoneyPerArea((self.low.0 + self.high.0) / 2.0)
    }
}

/// A nature-based solution in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    /// Unique identifier (e.g. `French_CW`)
    pub id: TechnologyID,
    /// Human-readable name
    pub name: String,
    /// Which module the technology belongs to
    pub module: Module,
    /// Compatibility coefficient for each water type
    pub water_types: IndexMap<WaterType, f64>,
    /// Whether the technology is built on vertical surfaces (e.g. green walls)
    pub vertical: bool,
    /// Whether the technology suits single households or buildings
    pub household: bool,
    /// Whether the technology needs an energy supply
    pub energy: bool,
    /// Pollutant-removal capabilities
    pub removal: IndexMap<RemovalPollutant, bool>,
    /// Ecosystem-service ratings
    pub ecosystem_services: IndexMap<EcosystemService, u8>,
    /// Operational burden ratings
    pub burdens: IndexMap<Burden, u8>,
    /// Area per population equivalent (m²/PE) for each climate, where known
    pub m2_pe: IndexMap<Climate, f64>,
    /// Hydraulic loading rate
    pub hydraulic_loading_rate: Option<FlowPerArea>,
    /// Stormwater storage parameters
    pub storage: Option<StorageParameters>,
    /// Capital cost per m²
    pub capex: CostRange,
    /// Yearly operating cost per m²
    pub opex: CostRange,
    /// Surface regressions for each pollutant, where fitted
    pub regressions: IndexMap<ConcentrationPollutant, RegressionModel>,
}

impl Technology {
    /// Compatibility coefficient for the given water type
    pub fn compatibility(&self, water_type: WaterType) -> f64 {
        self.water_types.get(&water_type).copied().unwrap_or(0.0)
    }

    /// Whether the technology removes the given pollutant
    pub fn removes(&self, pollutant: RemovalPollutant) -> bool {
        self.removal.get(&pollutant).copied().unwrap_or(false)
    }

    /// Rating for the given ecosystem service
    pub fn rating(&self, service: EcosystemService) -> u8 {
        self.ecosystem_services.get(&service).copied().unwrap_or(0)
    }

    /// Rating for the given operational burden
    pub fn burden(&self, burden: Burden) -> u8 {
        self.burdens.get(&burden).copied().unwrap_or(0)
    }

    /// Area per population equivalent for a climate, if known
    pub fn area_per_pe(&self, climate: Climate) -> Option<f64> {
        self.m2_pe.get(&climate).copied()
    }

    /// Write the catalog columns of this technology as entries of a serialised map
    pub fn serialize_entries<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("module", <&str>::from(self.module))?;
        for (water_type, coefficient) in &self.water_types {
            map.serialize_entry(<&str>::from(*water_type), coefficient)?;
        }
        map.serialize_entry("vertical", &u8::from(self.vertical))?;
        map.serialize_entry("household_building_solutions", &u8::from(self.household))?;
        map.serialize_entry("energy", &u8::from(self.energy))?;
        for (pollutant, removes) in &self.removal {
            map.serialize_entry(<&str>::from(*pollutant), &u8::from(*removes))?;
        }
        for (service, rating) in &self.ecosystem_services {
            map.serialize_entry(<&str>::from(*service), rating)?;
        }
        for (burden, rating) in &self.burdens {
            map.serialize_entry(<&str>::from(*burden), rating)?;
        }
        for (climate, m2_pe) in &self.m2_pe {
            map.serialize_entry(&climate.m2_pe_column(), m2_pe)?;
        }
        map.serialize_entry("hydraulic_loading_rate", &self.hydraulic_loading_rate)?;
        if let Some(storage) = &self.storage {
            map.serialize_entry("storage_capacity_low", &storage.capacity_low)?;
            map.serialize_entry("storage_capacity_high", &storage.capacity_high)?;
            map.serialize_entry("depth", &storage.depth)?;
            map.serialize_entry("infiltration", &u8::from(storage.infiltration))?;
        }
        map.serialize_entry("capex_low", &self.capex.low)?;
        map.serialize_entry("capex_high", &self.capex.high)?;
        map.serialize_entry("opex_low", &self.opex.low)?;
        map.serialize_entry("opex_high", &self.opex.high)
    }
}

impl Serialize for Technology {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.serialize_entries(&mut map)?;
        map.end()
    }
}

/// The read-only table of technologies every request is evaluated against
#[derive(Debug, PartialEq)]
pub struct Catalog {
    technologies: TechnologyMap,
}

impl Catalog {
    /// Create a catalog from already-validated technologies
    pub fn new(technologies: TechnologyMap) -> Self {
        Self { technologies }
    }

    /// Load the catalog from a CSV file, or the bundled catalog if no path is given
    pub fn load(file_path: Option<&Path>) -> Result<Self> {
        let technologies = match file_path {
            Some(file_path) => read_technologies(file_path)?,
            None => read_embedded_technologies()?,
        };

        Ok(Self::new(technologies))
    }

    /// Look up a technology by its ID
    pub fn get(&self, id: &str) -> Option<&Rc<Technology>> {
        self.technologies.get(id)
    }

    /// Get the canonical copy of an ID, or an error if it isn't in the catalog
    pub fn get_id(&self, id: &str) -> Result<TechnologyID> {
        self.technologies.get_id_by_str(id)
    }

    /// Iterate over technologies in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Rc<Technology>> {
        self.technologies.values()
    }

    /// The number of technologies
    pub fn len(&self) -> usize {
        self.technologies.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.technologies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{catalog, technology};
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(-5.0, Climate::Continental)]
    #[case(2.9, Climate::Continental)]
    #[case(3.0, Climate::Temperate)]
    #[case(17.9, Climate::Temperate)]
    #[case(18.0, Climate::Tropical)]
    #[case(30.0, Climate::Tropical)]
    fn test_climate_from_temperature(#[case] avg_temperature: f64, #[case] expected: Climate) {
        assert_eq!(Climate::from_temperature(avg_temperature), expected);
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(
            WaterType::from_str("cso_discharge_water").unwrap(),
            WaterType::CsoDischargeWater
        );
        assert_eq!(WaterType::RainWater.to_string(), "rain_water");
        assert_eq!(
            RemovalPollutant::NRemovalNitrateremoval.to_string(),
            "n_removal_nitrateremoval"
        );
        assert_eq!(
            EcosystemService::EsCsoMitigation.to_string(),
            "es_cso_mitigation"
        );
        assert_eq!(Burden::Manpower.to_string(), "inv_es_manpower");
        assert_eq!(ConcentrationPollutant::Nh4.to_string(), "nh4");
        assert_eq!(Climate::Dry.m2_pe_column(), "m2_pe_dry");
        assert!(WaterType::from_str("sewage").is_err());
    }

    #[test]
    fn test_water_type_module() {
        assert_eq!(WaterType::RunoffWater.module(), Module::Swm);
        assert_eq!(WaterType::Greywater.module(), Module::Treatment);
    }

    #[rstest]
    fn test_technology_accessors(technology: Technology) {
        assert_eq!(technology.compatibility(WaterType::AnyWastewater), 1.0);
        assert_eq!(technology.compatibility(WaterType::RainWater), 0.0);
        assert!(technology.removes(RemovalPollutant::CRemoval));
        assert!(!technology.removes(RemovalPollutant::PRemoval));
        assert_eq!(technology.area_per_pe(Climate::Temperate), Some(0.002));
        assert_eq!(technology.capex.mean(), MoneyPerArea(275.0));
    }

    #[rstest]
    fn test_technology_serialises_flat(technology: Technology) {
        let value = serde_json::to_value(&technology).unwrap();
        assert_eq!(value["id"], "French_CW");
        assert_eq!(value["module"], "treatment");
        assert_eq!(value["any_wastewater"], 1.0);
        assert_eq!(value["household_building_solutions"], 0);
        assert_eq!(value["es_biosolids"], 3);
        assert_eq!(value["m2_pe_temperate"], 0.002);
    }

    #[rstest]
    fn test_catalog_lookup(catalog: Catalog) {
        assert!(!catalog.is_empty());
        assert!(catalog.get("French_CW").is_some());
        assert_eq!(catalog.get_id("WS").unwrap(), TechnologyID::new("WS"));
        assert!(catalog.get_id("NOT_A_TECH").is_err());
    }
}
