//! The search for technologies suited to a scenario: filter the catalog, estimate surfaces and
//! drop whatever doesn't fit the available space.
use crate::filter::apply_filters;
use crate::result::TechnologyResult;
use crate::scenario::Scenario;
use crate::surface::{Estimation, estimate_surface};
use crate::technology::Catalog;
use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::Value;

/// Find the technologies suited to a request.
///
/// # Arguments
///
/// * `body` - The JSON request
/// * `catalog` - All available technologies
///
/// # Returns
///
/// The suitable technologies, in catalog order, with surface estimates where the request gives
/// enough to size them.
pub fn find_nbs(body: &Value, catalog: &Catalog) -> Result<Vec<TechnologyResult>> {
    let scenario = Scenario::from_json(body, catalog)?;
    let results = run_scenario(&scenario, catalog);
    info!("Found {} suitable technologies", results.len());

    Ok(results)
}

/// Run [`find_nbs`] for each request in an array.
///
/// Every request succeeds or fails independently of the others.
pub fn find_nbs_multiple(
    body: &Value,
    catalog: &Catalog,
) -> Result<Vec<Result<Vec<TechnologyResult>>>> {
    let requests = body
        .as_array()
        .context("body must be an array of scenarios")?;

    Ok(requests
        .iter()
        .map(|request| find_nbs(request, catalog))
        .collect())
}

/// Filter and size technologies for a validated scenario
pub fn run_scenario(scenario: &Scenario, catalog: &Catalog) -> Vec<TechnologyResult> {
    apply_filters(scenario, catalog)
        .into_iter()
        .filter_map(|technology| match estimate_surface(&technology, scenario) {
            Estimation::Estimated(estimate, stormwater) => Some(TechnologyResult::estimated(
                technology, estimate, stormwater,
            )),
            Estimation::NotRequested => Some(TechnologyResult::new(technology)),
            Estimation::Infeasible => {
                debug!("Dropping {}: cannot be sized for this scenario", technology.id);
                None
            }
        })
        .filter(|result| fits_area(result, scenario))
        .collect()
}

/// Whether the optimistic surface estimate fits the available areas
fn fits_area(result: &TechnologyResult, scenario: &Scenario) -> bool {
    let Some(estimate) = &result.estimate else {
        return true;
    };

    let fits = scenario
        .area
        .is_none_or(|area| estimate.surface.low <= area)
        && scenario
            .vertical_area
            .is_none_or(|area| estimate.vertical_surface.low <= area);
    if !fits {
        debug!("Dropping {}: not enough space", result.technology.id);
    }

    fits
}
