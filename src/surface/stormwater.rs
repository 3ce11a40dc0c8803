//! Volume-based sizing of stormwater technologies.
use super::{Estimation, MethodEstimate, SurfaceBand, SurfaceEstimate, SurfaceMethod};
use crate::scenario::Scenario;
use crate::technology::{StorageParameters, Technology};
use crate::units::{Area, Length, Volume};
use log::debug;
use strum::{Display, EnumIter, EnumString};

/// Soil texture classes, used when the user knows the soil but not its infiltration rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SoilClass {
    /// Sand
    Sand,
    /// Loamy sand
    LoamySand,
    /// Sandy loam
    SandyLoam,
    /// Loam
    Loam,
    /// Silt loam
    SiltLoam,
    /// Sandy clay loam
    SandyClayLoam,
    /// Clay loam
    ClayLoam,
    /// Silty clay loam
    SiltyClayLoam,
    /// Sandy clay
    SandyClay,
    /// Silty clay
    SiltyClay,
    /// Clay
    Clay,
}

impl SoilClass {
    /// Saturated infiltration rate (mm/h)
    pub fn infiltration_rate(self) -> f64 {
        match self {
            Self::Sand => 210.0,
            Self::LoamySand => 61.1,
            Self::SandyLoam => 25.9,
            Self::Loam => 13.2,
            Self::SiltLoam => 6.8,
            Self::SandyClayLoam => 4.3,
            Self::ClayLoam => 2.3,
            Self::SiltyClayLoam => 1.5,
            Self::SandyClay => 1.2,
            Self::SiltyClay => 0.9,
            Self::Clay => 0.6,
        }
    }
}

/// The stormwater-specific part of a sizing result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StormwaterOutcome {
    /// Volume the technology can take in per day
    pub daily_volume: Volume,
    /// Whether the available area fits the mean surface (only known when an area was given)
    pub enough_area: Option<bool>,
    /// Infiltration rate used in the sizing (mm/h), zero if none
    pub infiltration_rate: f64,
}

/// Water held per m² of technology, including what infiltrates during the event
fn capacity_per_area(
    storage_capacity: f64,
    depth: Length,
    infiltration_rate: Option<f64>,
    duration: f64,
) -> Length {
    let infiltrated = infiltration_rate.map_or(0.0, |rate| rate * duration / 1000.0);
    Length(storage_capacity * depth.value() + infiltrated)
}

/// Size a storage structure for a volume of water.
///
/// The optimistic capacity gives the low surface and the pessimistic capacity the high one.
/// Returns `None` if the structure can't hold any water.
///
/// # Arguments
///
/// * `storage` - Storage parameters of the technology
/// * `volume` - Volume to manage
/// * `duration` - Duration of the rain event (hours)
/// * `infiltration_rate` - Soil infiltration rate (mm/h), ignored unless the technology infiltrates
/// * `area` - Available area, if known
pub fn size_storage(
    storage: &StorageParameters,
    volume: Volume,
    duration: f64,
    infiltration_rate: Option<f64>,
    area: Option<Area>,
) -> Option<(MethodEstimate, StormwaterOutcome)> {
    let infiltration_rate = infiltration_rate.filter(|_| storage.infiltration);
    let capacity =
        |storage_capacity| capacity_per_area(storage_capacity, storage.depth, infiltration_rate, duration);
    let capacity_low = capacity(storage.capacity_low);
    let capacity_high = capacity(storage.capacity_high);
    let capacity_mean = capacity((storage.capacity_low + storage.capacity_high) / 2.0);
    if capacity_low.value() <= 0.0 {
        return None;
    }

    let mut surface = SurfaceBand {
        low: volume / capacity_high,
        mean: volume / capacity_mean,
        high: volume / capacity_low,
    };

    let mut daily_volume = volume;
    let enough_area = area.map(|area| {
        let enough_area = surface.mean <= area;
        if enough_area {
            surface.high = surface.high.min(area);
        } else {
            daily_volume = area * capacity_mean;
        }

        enough_area
    });

    let estimate = MethodEstimate {
        method: SurfaceMethod::StorageVolume,
        pollutant: None,
        surface,
    };
    let outcome = StormwaterOutcome {
        daily_volume,
        enough_area,
        infiltration_rate: infiltration_rate.unwrap_or(0.0),
    };

    Some((estimate, outcome))
}

/// Estimate the surface of a stormwater technology for the scenario's volume
pub fn estimate(technology: &Technology, scenario: &Scenario) -> Estimation {
    let Some(volume) = scenario.volume else {
        return Estimation::NotRequested;
    };
    let Some(storage) = &technology.storage else {
        debug!("{} has no storage parameters", technology.id);
        return Estimation::Infeasible;
    };

    match size_storage(
        storage,
        volume,
        scenario.duration,
        scenario.infiltration_rate,
        scenario.area,
    ) {
        Some((estimate, outcome)) => Estimation::Estimated(
            SurfaceEstimate::new(estimate, technology.vertical),
            Some(outcome),
        ),
        None => {
            debug!("{} cannot store water without infiltration", technology.id);
            Estimation::Infeasible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};
    use std::str::FromStr;

    #[fixture]
    fn basin() -> StorageParameters {
        StorageParameters {
            capacity_low: 0.2,
            capacity_high: 0.4,
            depth: Length(1.0),
            infiltration: true,
        }
    }

    #[test]
    fn test_soil_class() {
        assert_eq!(SoilClass::from_str("silty_clay_loam").unwrap(), SoilClass::SiltyClayLoam);
        assert_eq!(SoilClass::Sand.infiltration_rate(), 210.0);
        assert!(SoilClass::from_str("gravel").is_err());
    }

    #[rstest]
    fn test_size_storage(basin: StorageParameters) {
        let (estimate, outcome) = size_storage(&basin, Volume(120.0), 24.0, None, None).unwrap();
        assert_eq!(estimate.method, SurfaceMethod::StorageVolume);
        assert_approx_eq!(Area, estimate.surface.low, Area(300.0));
        assert_approx_eq!(Area, estimate.surface.mean, Area(400.0));
        assert_approx_eq!(Area, estimate.surface.high, Area(600.0));
        assert_eq!(outcome.daily_volume, Volume(120.0));
        assert_eq!(outcome.enough_area, None);
        assert_eq!(outcome.infiltration_rate, 0.0);
    }

    #[rstest]
    fn test_infiltration_shrinks_surface(mut basin: StorageParameters) {
        let (dry, _) = size_storage(&basin, Volume(120.0), 24.0, None, None).unwrap();
        let (wet, outcome) = size_storage(&basin, Volume(120.0), 24.0, Some(5.0), None).unwrap();
        assert!(wet.surface.mean < dry.surface.mean);
        assert_eq!(outcome.infiltration_rate, 5.0);

        // Ignored when the technology doesn't infiltrate
        basin.infiltration = false;
        let (sealed, outcome) = size_storage(&basin, Volume(120.0), 24.0, Some(5.0), None).unwrap();
        assert_eq!(sealed.surface, dry.surface);
        assert_eq!(outcome.infiltration_rate, 0.0);
    }

    #[rstest]
    fn test_enough_area(basin: StorageParameters) {
        let (estimate, outcome) =
            size_storage(&basin, Volume(120.0), 24.0, None, Some(Area(500.0))).unwrap();
        assert_eq!(outcome.enough_area, Some(true));
        assert_eq!(outcome.daily_volume, Volume(120.0));
        assert_eq!(estimate.surface.high, Area(500.0));
    }

    #[rstest]
    fn test_not_enough_area(basin: StorageParameters) {
        let (estimate, outcome) =
            size_storage(&basin, Volume(120.0), 24.0, None, Some(Area(100.0))).unwrap();
        assert_eq!(outcome.enough_area, Some(false));
        assert_approx_eq!(Volume, outcome.daily_volume, Volume(30.0));
        assert!(estimate.surface.mean > Area(100.0));
    }

    #[rstest]
    fn test_no_capacity(mut basin: StorageParameters) {
        basin.capacity_low = 0.0;
        basin.infiltration = false;
        assert!(size_storage(&basin, Volume(120.0), 24.0, Some(5.0), None).is_none());
    }
}
