//! Filters which select the technologies suitable for a scenario.
//!
//! Every filter is a predicate over a technology. A technology is kept only if it passes all of
//! them, so the order in which they run doesn't change the result.
use crate::scenario::Scenario;
use crate::technology::{Catalog, Climate, DEGENERATE_M2_PE, Module, Technology};
use log::debug;
use std::rc::Rc;

/// A named predicate over technologies
struct Filter<'a> {
    name: &'static str,
    keep: Box<dyn Fn(&Technology) -> bool + 'a>,
}

impl<'a> Filter<'a> {
    fn new(name: &'static str, keep: impl Fn(&Technology) -> bool + 'a) -> Self {
        Self {
            name,
            keep: Box::new(keep),
        }
    }
}

/// The filters which apply to a scenario. Filters for fields the user left out are not included.
fn filters_for(scenario: &Scenario) -> Vec<Filter<'_>> {
    let mut filters = Vec::new();

    if let Some(tech_ids) = &scenario.tech_ids {
        filters.push(Filter::new("technology ID", move |technology| {
            tech_ids.contains(&technology.id)
        }));
    }

    filters.push(Filter::new("water type", |technology| {
        is_fully_compatible(technology.compatibility(scenario.water_type))
    }));

    if scenario.vertical == Some(false) {
        filters.push(Filter::new("vertical", |technology| !technology.vertical));
    }

    if scenario.climate == Climate::Continental {
        filters.push(Filter::new("continental climate", |technology| {
            technology
                .area_per_pe(Climate::Continental)
                .is_none_or(|m2_pe| m2_pe < DEGENERATE_M2_PE)
        }));
    }

    if scenario.household == Some(true) {
        filters.push(Filter::new("household", |technology| technology.household));
    }

    for pollutant in &scenario.pollutants {
        filters.push(Filter::new("pollutant removal", move |technology| {
            technology.removes(*pollutant)
        }));
    }

    for (service, minimum) in &scenario.ecosystem_services {
        filters.push(Filter::new("ecosystem service", move |technology| {
            technology.rating(*service) >= *minimum
        }));
    }

    if let Some(energy) = scenario.energy {
        filters.push(Filter::new("energy", move |technology| {
            technology.energy == energy
        }));
    }

    for (burden, limit) in &scenario.burden_limits {
        filters.push(Filter::new("operational burden", move |technology| {
            technology.burden(*burden) <= *limit
        }));
    }

    if scenario.infiltration_rate.is_none() {
        filters.push(Filter::new("storage", |technology| {
            technology.module != Module::Swm
                || technology
                    .storage
                    .as_ref()
                    .is_some_and(|storage| storage.capacity_low > 0.0)
        }));
    }

    filters
}

/// Only exact compatibility counts; partial coefficients are not used for selection
#[allow(clippy::float_cmp)]
fn is_fully_compatible(coefficient: f64) -> bool {
    coefficient == 1.0
}

/// Select the catalog technologies which pass every filter for the scenario.
///
/// # Arguments
///
/// * `scenario` - The validated scenario
/// * `catalog` - All available technologies
///
/// # Returns
///
/// The selected technologies, in catalog order.
pub fn apply_filters(scenario: &Scenario, catalog: &Catalog) -> Vec<Rc<Technology>> {
    let mut technologies: Vec<_> = catalog.iter().cloned().collect();
    for filter in filters_for(scenario) {
        technologies.retain(|technology| (filter.keep)(technology));
        debug!(
            "{} technologies left after {} filter",
            technologies.len(),
            filter.name
        );
    }

    technologies
}
