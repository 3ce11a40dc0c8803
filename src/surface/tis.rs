//! A mechanistic tanks-in-series (TIS) model with first-order removal kinetics.
//!
//! The reactor is a chain of `N` well-mixed tanks, where `N` grows with the length-to-depth ratio
//! of the bed. As the bed's length depends on its area, the required area is found by iterating to
//! a fixed point from the plug-flow solution.
use super::{MethodEstimate, SurfaceBand, SurfaceMethod};
use crate::scenario::Scenario;
use crate::technology::{ConcentrationPollutant, Technology};
use crate::units::{Area, Flow, Length};
use log::debug;

/// Relative change in area below which the iteration stops
const TOLERANCE: f64 = 1e-9;

/// Maximum number of fixed-point iterations
const MAX_ITERATIONS: usize = 100;

/// Reference temperature of the kinetic constants (°C)
const REFERENCE_TEMPERATURE: f64 = 20.0;

/// Geometry of a reactor family
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reactor {
    /// Length over width
    pub aspect_ratio: f64,
    /// Depth of the bed
    pub depth: Length,
}

/// Technologies which can be sized with the TIS model
const REACTORS: [(&str, Reactor); 2] = [
    // Constructed wetland
    (
        "HSSF_CW",
        Reactor {
            aspect_ratio: 2.0,
            depth: Length(0.7),
        },
    ),
    // Green wall
    (
        "HF_GW",
        Reactor {
            aspect_ratio: 10.0,
            depth: Length(0.2),
        },
    ),
];

/// Look up the reactor geometry for a technology
pub fn reactor(id: &str) -> Option<Reactor> {
    REACTORS
        .iter()
        .find(|(reactor_id, _)| *reactor_id == id)
        .map(|(_, reactor)| *reactor)
}

/// First-order removal constants for a pollutant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinetics {
    /// Areal rate constant at 20 °C (m/yr)
    pub k: f64,
    /// Temperature correction coefficient
    pub theta: f64,
    /// Background concentration which can't be removed (mg/L)
    pub background: f64,
}

impl Kinetics {
    /// Kinetic constants for a pollutant at a given inlet concentration.
    ///
    /// BOD constants depend on the inlet; `None` if it is too dilute to model.
    pub fn for_pollutant(pollutant: ConcentrationPollutant, inlet: f64) -> Option<Self> {
        let (k, theta, background) = match pollutant {
            ConcentrationPollutant::Bod => {
                let k = if inlet > 200.0 {
                    66.0
                } else if inlet > 100.0 {
                    25.0
                } else if inlet > 30.0 {
                    37.0
                } else if inlet > 3.0 {
                    86.0
                } else {
                    return None;
                };
                (k, 0.981, 0.6 + 0.4 * inlet.powf(0.55))
            }
            ConcentrationPollutant::Cod => (37.6, 1.0, 0.0),
            ConcentrationPollutant::Nh4 => (11.4, 1.014, 0.0),
            ConcentrationPollutant::Tn => (8.4, 1.005, 1.0),
            ConcentrationPollutant::No3 => (41.8, 1.110, 0.0),
            ConcentrationPollutant::Tp => (60.0, 1.0, 0.002),
        };

        Some(Self {
            k,
            theta,
            background,
        })
    }

    /// Rate constant corrected for temperature
    pub fn rate_at(&self, temperature: f64) -> f64 {
        self.k * self.theta.powf(temperature - REFERENCE_TEMPERATURE)
    }
}

/// Area needed to bring a pollutant from `inlet` to `outlet`.
///
/// Returns `None` if the target is below the background concentration or the model doesn't give a
/// usable area.
pub fn required_area(
    reactor: &Reactor,
    kinetics: &Kinetics,
    inlet: f64,
    outlet: f64,
    inflow: Flow,
    temperature: f64,
) -> Option<Area> {
    if outlet <= kinetics.background {
        return None;
    }

    let k = kinetics.rate_at(temperature);
    let remaining = (outlet - kinetics.background) / (inlet - kinetics.background);
    let yearly_flow = inflow.value() * 365.0;

    // Plug flow is the limit of infinitely many tanks
    let mut area = -yearly_flow * remaining.ln() / k;
    for _ in 0..MAX_ITERATIONS {
        let length = (area * reactor.aspect_ratio).sqrt();
        let tanks = 0.686 * (length / reactor.depth.value()).powf(0.671);
        let next = (remaining.powf(-1.0 / tanks) - 1.0) * yearly_flow * tanks / k;
        let converged = ((next - area) / area).abs() < TOLERANCE;
        area = next;
        if converged || !area.is_finite() {
            break;
        }
    }

    (area.is_finite() && area > 0.0).then_some(Area(area))
}

/// Whether the technology has a reactor geometry for the TIS model
pub fn applies(technology: &Technology, scenario: &Scenario) -> bool {
    reactor(&technology.id.0).is_some() && scenario.has_inlet_concentrations()
}

/// Size a technology with the TIS model, controlled by its most demanding pollutant
pub fn estimate(
    technology: &Technology,
    scenario: &Scenario,
    inflow: Flow,
) -> Option<MethodEstimate> {
    let reactor = reactor(&technology.id.0)?;
    let temperature = scenario.temperature();

    scenario
        .concentrations
        .iter()
        .filter_map(|(pollutant, target)| {
            let outlet = target.outlet?;
            let kinetics = Kinetics::for_pollutant(*pollutant, target.inlet)?;
            let area = required_area(
                &reactor,
                &kinetics,
                target.inlet,
                outlet,
                inflow,
                temperature,
            );
            if area.is_none() {
                debug!(
                    "TIS model can't reach {pollutant} target of {outlet} for {}",
                    technology.id
                );
            }

            Some((*pollutant, area?))
        })
        .max_by(|(_, a), (_, b)| a.value().total_cmp(&b.value()))
        .map(|(pollutant, area)| MethodEstimate {
            method: SurfaceMethod::TisModel,
            pollutant: Some(pollutant),
            surface: SurfaceBand::with_uncertainty(area),
        })
}
