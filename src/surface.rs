//! Estimation of the surface a technology needs for a scenario.
//!
//! Treatment technologies try an ordered list of strategies, from the most mechanistic to the
//! crudest, and take the first that gives an answer. Stormwater technologies are sized by volume.
use crate::scenario::Scenario;
use crate::technology::{ConcentrationPollutant, Module, Technology};
use crate::units::{Area, Dimensionless, Flow};
use log::{debug, warn};
use strum::{Display, EnumString, IntoStaticStr};

pub mod regression;
pub mod stormwater;
pub mod tis;

use stormwater::StormwaterOutcome;

/// Relative half-width of the band around estimates with no statistical interval
pub const UNCERTAINTY: f64 = 0.25;

/// Vertical surface needed per unit of horizontal surface
pub const HORIZONTAL_TO_VERTICAL_RATIO: f64 = 1.5;

/// How a surface was estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub enum SurfaceMethod {
    /// Mechanistic tanks-in-series model
    #[strum(serialize = "tis_model")]
    TisModel,
    /// Linear regression on removed load
    #[strum(serialize = "linear")]
    Linear,
    /// Exponential regression on removed load
    #[strum(serialize = "exponential")]
    Exponential,
    /// Power regression on removed load
    #[strum(serialize = "power")]
    Power,
    /// Inflow over hydraulic loading rate
    #[strum(serialize = "hydraulic_load_ratio")]
    HydraulicLoadRatio,
    /// Area per population equivalent
    #[strum(serialize = "ratio_m2_pe")]
    RatioM2Pe,
    /// Runoff volume over storage capacity
    #[strum(serialize = "storage_volume")]
    StorageVolume,
}

/// A low/mean/high range of surfaces
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceBand {
    /// Optimistic surface
    pub low: Area,
    /// Central estimate
    pub mean: Area,
    /// Pessimistic surface
    pub high: Area,
}

impl SurfaceBand {
    /// A band of ±[`UNCERTAINTY`] around an estimate
    pub fn with_uncertainty(mean: Area) -> Self {
        Self {
            low: mean * Dimensionless(1.0 - UNCERTAINTY),
            mean,
            high: mean * Dimensionless(1.0 + UNCERTAINTY),
        }
    }

    /// Multiply every value in the band
    pub fn scale(self, factor: f64) -> Self {
        let factor = Dimensionless(factor);
        Self {
            low: self.low * factor,
            mean: self.mean * factor,
            high: self.high * factor,
        }
    }
}

/// The output of one estimation method, before vertical surfaces are split out
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodEstimate {
    /// The method used
    pub method: SurfaceMethod,
    /// The pollutant which controls the surface, if any
    pub pollutant: Option<ConcentrationPollutant>,
    /// The estimated surface
    pub surface: SurfaceBand,
}

/// A surface estimate split into horizontal and vertical parts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceEstimate {
    /// The method used
    pub method: SurfaceMethod,
    /// The pollutant which controls the surface, if any
    pub pollutant: Option<ConcentrationPollutant>,
    /// Horizontal surface
    pub surface: SurfaceBand,
    /// Vertical surface
    pub vertical_surface: SurfaceBand,
}

impl SurfaceEstimate {
    /// Place an estimate on the ground, or on a wall for vertical technologies
    pub fn new(estimate: MethodEstimate, vertical: bool) -> Self {
        let (surface, vertical_surface) = if vertical {
            (
                SurfaceBand::default(),
                estimate.surface.scale(HORIZONTAL_TO_VERTICAL_RATIO),
            )
        } else {
            (estimate.surface, SurfaceBand::default())
        };

        Self {
            method: estimate.method,
            pollutant: estimate.pollutant,
            surface,
            vertical_surface,
        }
    }

    /// Total mean surface, horizontal plus vertical
    pub fn footprint(&self) -> Area {
        self.surface.mean + self.vertical_surface.mean
    }
}

/// The result of estimating the surface of one technology
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimation {
    /// A surface was estimated
    Estimated(SurfaceEstimate, Option<StormwaterOutcome>),
    /// The scenario has no flow or volume to size for
    NotRequested,
    /// The technology can't handle the scenario
    Infeasible,
}

/// One way of estimating the surface of a treatment technology
pub struct TreatmentStrategy {
    /// Whether the strategy is worth trying for this technology and scenario
    pub applies: fn(&Technology, &Scenario) -> bool,
    /// Estimate the surface, or `None` to fall through to the next strategy
    pub estimate: fn(&Technology, &Scenario, Flow) -> Option<MethodEstimate>,
}

/// Treatment strategies in order of preference
pub const TREATMENT_STRATEGIES: [TreatmentStrategy; 4] = [
    TreatmentStrategy {
        applies: tis::applies,
        estimate: tis::estimate,
    },
    TreatmentStrategy {
        applies: regression::applies,
        estimate: regression::estimate,
    },
    TreatmentStrategy {
        applies: hydraulic_load_applies,
        estimate: hydraulic_load_ratio,
    },
    TreatmentStrategy {
        applies: always,
        estimate: ratio_m2_pe,
    },
];

fn always(_: &Technology, _: &Scenario) -> bool {
    true
}

fn hydraulic_load_applies(_: &Technology, scenario: &Scenario) -> bool {
    scenario.has_inlet_concentrations()
}

/// Surface from the inflow and the technology's hydraulic loading rate
fn hydraulic_load_ratio(
    technology: &Technology,
    _: &Scenario,
    inflow: Flow,
) -> Option<MethodEstimate> {
    let rate = technology.hydraulic_loading_rate?;

    Some(MethodEstimate {
        method: SurfaceMethod::HydraulicLoadRatio,
        pollutant: None,
        surface: SurfaceBand::with_uncertainty(inflow / rate),
    })
}

/// Surface from the population equivalents and the area per PE for the climate
fn ratio_m2_pe(technology: &Technology, scenario: &Scenario, inflow: Flow) -> Option<MethodEstimate> {
    let m2_pe = technology.area_per_pe(scenario.climate)?;
    let population_equivalents = inflow.value() * 1000.0 / scenario.litres_per_person;

    Some(population_ratio(m2_pe, population_equivalents))
}

/// Surface for a population from an area per population equivalent
pub fn population_ratio(m2_pe: f64, population_equivalents: f64) -> MethodEstimate {
    MethodEstimate {
        method: SurfaceMethod::RatioM2Pe,
        pollutant: None,
        surface: SurfaceBand::with_uncertainty(Area(m2_pe * population_equivalents)),
    }
}

fn estimate_treatment(technology: &Technology, scenario: &Scenario) -> Estimation {
    let Some(inflow) = scenario.inflow else {
        return Estimation::NotRequested;
    };

    for strategy in &TREATMENT_STRATEGIES {
        if !(strategy.applies)(technology, scenario) {
            continue;
        }

        if let Some(estimate) = (strategy.estimate)(technology, scenario, inflow) {
            debug!(
                "Sized {} with {} ({} m²)",
                technology.id,
                estimate.method,
                estimate.surface.mean.value()
            );
            return Estimation::Estimated(SurfaceEstimate::new(estimate, technology.vertical), None);
        }
    }

    warn!("No surface estimation method available for {}", technology.id);
    Estimation::NotRequested
}

/// Estimate the surface a technology needs for a scenario.
///
/// # Arguments
///
/// * `technology` - The technology to size
/// * `scenario` - The validated scenario
pub fn estimate_surface(technology: &Technology, scenario: &Scenario) -> Estimation {
    match technology.module {
        Module::Treatment => estimate_treatment(technology, scenario),
        Module::Swm => stormwater::estimate(technology, scenario),
    }
}
