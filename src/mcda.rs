//! Multi-criteria decision analysis (MCDA) of a set of technologies.
//!
//! Each technology gets eight sub-scores between 0 and 1. Space and cost scores are relative to
//! the other technologies of the same module in the set, the rest depend only on the technology.
//! The weighted sum of the sub-scores gives the composite score used for ranking.
use crate::find::run_scenario;
use crate::result::TechnologyResult;
use crate::scenario::{Body, DEFAULT_DURATION, Scenario, as_body};
use crate::surface::stormwater::size_storage;
use crate::surface::{SurfaceEstimate, population_ratio};
use crate::technology::{
    Burden, Catalog, Climate, EcosystemService, Module, RemovalPollutant, Technology,
};
use crate::units::{Area, Money, Volume};
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use serde::ser::SerializeMap;
use serde_json::Value;
use std::str::FromStr;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

pub mod weights;
pub use weights::{WeightInput, Weights, calculate_weights, read_weight_input};

/// Population treatment technologies are costed for
pub const REFERENCE_POPULATION_EQUIVALENTS: f64 = 1000.0;

/// Volume stormwater technologies are costed for
pub const REFERENCE_VOLUME: Volume = Volume(100.0);

/// The criteria technologies are scored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Criterion {
    /// Carbon sequestration, temperature regulation and energy use
    EnvImpact,
    /// Habitat for fauna, flora and pollinators
    Biodiversity,
    /// Ease of operation
    Operation,
    /// Space needed
    SpaceRequirements,
    /// Capital cost
    Capex,
    /// Resources recovered
    Circularity,
    /// Aesthetic and recreational value
    SocialBenefits,
    /// Pollutant removal or stormwater mitigation
    RemovalPerformance,
}

impl Criterion {
    /// The name of this criterion's weight in requests
    pub fn weight_name(self) -> &'static str {
        match self {
            Self::EnvImpact => "wEnvImpact",
            Self::Biodiversity => "wBiodiversity",
            Self::Operation => "wOperation",
            Self::SpaceRequirements => "wSpaceRequirements",
            Self::Capex => "wCapex",
            Self::Circularity => "wCircularity",
            Self::SocialBenefits => "wSocialBenefits",
            Self::RemovalPerformance => "wRemovalPerformance",
        }
    }

    /// Look up a criterion by the name of its weight
    pub fn from_weight_name(name: &str) -> Option<Self> {
        Self::iter().find(|criterion| criterion.weight_name() == name)
    }
}

/// The MCDA scores of one technology
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Capital cost for the surface used in costing, if one could be found
    pub estimated_capex_mean: Option<Money>,
    /// Sub-score for each criterion, between 0 and 1
    pub scores: IndexMap<Criterion, f64>,
    /// Sub-scores multiplied by the criterion weights
    pub weighted: IndexMap<Criterion, f64>,
    /// Sum of the weighted scores
    pub score: f64,
    /// Position in the ranking, starting at 1
    pub rank: usize,
}

impl Assessment {
    /// Write the scores as entries of a serialised map
    pub fn serialize_entries<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        map.serialize_entry("estimated_capex_mean", &self.estimated_capex_mean)?;
        for (criterion, score) in &self.scores {
            map.serialize_entry(&format!("score_{criterion}"), score)?;
        }
        for (criterion, weighted) in &self.weighted {
            map.serialize_entry(&format!("weighted_{criterion}"), weighted)?;
        }
        map.serialize_entry("score", &self.score)?;
        map.serialize_entry("rank", &self.rank)
    }
}

/// Score and rank a set of technologies.
///
/// The request holds either `techs`, records from an earlier search, or `techIds`, in which case
/// the rest of the request is run through the search first. Results keep the input order.
///
/// # Arguments
///
/// * `body` - The JSON request
/// * `catalog` - All available technologies
pub fn mcda(body: &Value, catalog: &Catalog) -> Result<Vec<TechnologyResult>> {
    let body = as_body(body)?;
    let input = body
        .get("weights")
        .map(read_weight_input)
        .transpose()?
        .unwrap_or_default();
    let weights = calculate_weights(&input);

    let (mut results, climate) = match (body.get("techs"), body.get("techIds")) {
        (Some(_), Some(_)) => bail!("provide either techs or techIds, not both"),
        (Some(techs), None) => {
            let techs = techs.as_array().context("techs must be an array")?;
            let results = techs
                .iter()
                .map(|record| TechnologyResult::from_json(record, catalog))
                .collect::<Result<Vec<_>>>()?;
            (results, read_climate(body)?)
        }
        (None, Some(_)) => {
            let scenario = Scenario::from_json(&Value::Object(body.clone()), catalog)?;
            (run_scenario(&scenario, catalog), scenario.climate)
        }
        (None, None) => bail!("body must contain techs or techIds"),
    };

    assess(&mut results, &weights, climate);

    Ok(results)
}

fn read_climate(body: &Body) -> Result<Climate> {
    let Some(value) = body.get("climate") else {
        return Ok(Climate::default());
    };

    value
        .as_str()
        .and_then(|name| Climate::from_str(name).ok())
        .context("climate is not in the list of accepted climates")
}

/// Attach an [`Assessment`] to every result
pub fn assess(results: &mut [TechnologyResult], weights: &Weights, climate: Climate) {
    let costs = results
        .iter()
        .map(|result| {
            let technology = &result.technology;
            let surface = capex_surface(technology, climate)?;
            Some(technology.capex.mean() * surface)
        })
        .collect_vec();

    let mut space_scores = vec![0.0; results.len()];
    let mut capex_scores = vec![0.0; results.len()];
    for module in Module::iter() {
        let indices = results
            .iter()
            .positions(|result| result.technology.module == module)
            .collect_vec();
        if indices.is_empty() {
            continue;
        }

        let space = match module {
            Module::Treatment => inverse_scores(&treatment_footprints(results, &indices, climate)),
            Module::Swm => proportional_scores(
                &indices
                    .iter()
                    .map(|&i| storage_capacity(&results[i].technology))
                    .collect_vec(),
            ),
        };
        let capex = inverse_scores(
            &indices
                .iter()
                .map(|&i| costs[i].map(Money::value))
                .collect_vec(),
        );
        for (k, &i) in indices.iter().enumerate() {
            space_scores[i] = space[k];
            capex_scores[i] = capex[k];
        }
    }

    let mut assessments = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let technology = &result.technology;
            let scores: IndexMap<_, _> = Criterion::iter()
                .map(|criterion| {
                    let score = match criterion {
                        Criterion::SpaceRequirements => space_scores[i],
                        Criterion::Capex => capex_scores[i],
                        _ => intrinsic_score(technology, criterion),
                    };
                    (criterion, score.clamp(0.0, 1.0))
                })
                .collect();
            let weighted: IndexMap<_, _> = scores
                .iter()
                .map(|(criterion, score)| (*criterion, score * weights.get(*criterion)))
                .collect();
            let score = weighted.values().sum::<f64>().clamp(0.0, 1.0);

            Assessment {
                estimated_capex_mean: costs[i],
                scores,
                weighted,
                score,
                rank: 0,
            }
        })
        .collect_vec();

    // Stable sort, so ties keep input order
    let order = (0..assessments.len())
        .sorted_by(|&a, &b| assessments[b].score.total_cmp(&assessments[a].score))
        .collect_vec();
    for (position, i) in order.into_iter().enumerate() {
        assessments[i].rank = position + 1;
    }

    for (result, assessment) in results.iter_mut().zip(assessments) {
        debug!(
            "{} scored {:.3} (rank {})",
            result.technology.id, assessment.score, assessment.rank
        );
        result.assessment = Some(assessment);
    }
}

fn ratings(technology: &Technology, services: &[EcosystemService]) -> f64 {
    services
        .iter()
        .map(|service| f64::from(technology.rating(*service)))
        .sum()
}

/// Scores which depend only on the technology itself
fn intrinsic_score(technology: &Technology, criterion: Criterion) -> f64 {
    use EcosystemService as Es;

    match criterion {
        Criterion::EnvImpact => {
            let services = ratings(technology, &[Es::EsCarbonSequestration, Es::EsTemperatureRegulation]);
            0.5 * services / 6.0 + 0.5 * (1.0 - f64::from(u8::from(technology.energy)))
        }
        Criterion::Biodiversity => {
            ratings(
                technology,
                &[Es::EsBiodiversityFauna, Es::EsBiodiversityFlora, Es::EsPollination],
            ) / 9.0
        }
        Criterion::Operation => {
            let burdens: f64 = Burden::iter()
                .map(|burden| f64::from(technology.burden(burden)))
                .sum();
            1.0 - burdens / 9.0
        }
        Criterion::Circularity => {
            ratings(
                technology,
                &[Es::EsWaterReuse, Es::EsBiosolids, Es::EsBiomassProduction, Es::EsFoodSource],
            ) / 12.0
        }
        Criterion::SocialBenefits => {
            ratings(technology, &[Es::EsAestheticValue, Es::EsRecreation]) / 6.0
        }
        Criterion::RemovalPerformance => match technology.module {
            Module::Treatment => {
                let removed: f64 = RemovalPollutant::iter()
                    .map(|pollutant| f64::from(u8::from(technology.removes(pollutant))))
                    .sum();
                removed / 5.0
            }
            Module::Swm => ratings(technology, &[Es::EsFloodMitigation, Es::EsCsoMitigation]) / 6.0,
        },
        Criterion::SpaceRequirements | Criterion::Capex => 0.0,
    }
}

/// Surfaces of the treatment technologies, from the estimates only if every one has an estimate
fn treatment_footprints(
    results: &[TechnologyResult],
    indices: &[usize],
    climate: Climate,
) -> Vec<Option<f64>> {
    let all_estimated = indices.iter().all(|&i| results[i].estimate.is_some());
    indices
        .iter()
        .map(|&i| {
            let result = &results[i];
            if all_estimated {
                result.estimate.map(|estimate| estimate.footprint().value())
            } else {
                result.technology.area_per_pe(climate)
            }
        })
        .collect()
}

/// Volume of water stored per m² of a stormwater technology
fn storage_capacity(technology: &Technology) -> Option<f64> {
    technology
        .storage
        .as_ref()
        .map(|storage| storage.capacity_low * storage.depth.value())
}

/// The surface a technology is costed on.
///
/// This is always estimated for a reference population or volume, whether or not the record
/// carries its own surface estimate, so capex scores don't depend on how the set was built.
fn capex_surface(technology: &Technology, climate: Climate) -> Option<Area> {
    let estimate = match technology.module {
        Module::Treatment => {
            let m2_pe = technology.area_per_pe(climate)?;
            population_ratio(m2_pe, REFERENCE_POPULATION_EQUIVALENTS)
        }
        Module::Swm => {
            let storage = technology.storage.as_ref()?;
            size_storage(storage, REFERENCE_VOLUME, DEFAULT_DURATION, None, None)?.0
        }
    };

    Some(SurfaceEstimate::new(estimate, technology.vertical).footprint())
}

/// Scores where the smallest value gets 1. Missing values score 0.
fn inverse_scores(values: &[Option<f64>]) -> Vec<f64> {
    let min = values.iter().flatten().copied().reduce(f64::min);
    values
        .iter()
        .map(|value| match (value, min) {
            (Some(value), Some(min)) if *value > 0.0 => min / value,
            (Some(_), _) => 1.0,
            (None, _) => 0.0,
        })
        .collect()
}

/// Scores where the largest value gets 1. Missing values score 0.
fn proportional_scores(values: &[Option<f64>]) -> Vec<f64> {
    let max = values.iter().flatten().copied().reduce(f64::max);
    values
        .iter()
        .map(|value| match (value, max) {
            (Some(value), Some(max)) if max > 0.0 => value / max,
            (Some(_), _) => 1.0,
            (None, _) => 0.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, catalog};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use serde_json::json;

    fn assessment(result: &TechnologyResult) -> &Assessment {
        result.assessment.as_ref().unwrap()
    }

    fn score(results: &[TechnologyResult], id: &str, criterion: Criterion) -> f64 {
        let result = results
            .iter()
            .find(|result| result.technology.id.0.as_ref() == id)
            .unwrap();
        assessment(result).scores[&criterion]
    }

    #[test]
    fn test_weight_names() {
        assert_eq!(
            Criterion::from_weight_name("wSpaceRequirements"),
            Some(Criterion::SpaceRequirements)
        );
        assert_eq!(Criterion::from_weight_name("space_requirements"), None);
        assert_eq!(Criterion::RemovalPerformance.to_string(), "removal_performance");
    }

    #[test]
    fn test_inverse_scores() {
        let scores = inverse_scores(&[Some(2.0), Some(4.0), None, Some(0.0)]);
        assert_eq!(scores, [0.0, 0.0, 0.0, 1.0]);

        let scores = inverse_scores(&[Some(2.0), Some(4.0), None]);
        assert_eq!(scores, [1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_proportional_scores() {
        assert_eq!(proportional_scores(&[Some(1.0), Some(4.0)]), [0.25, 1.0]);
        assert_eq!(proportional_scores(&[Some(0.0), Some(0.0)]), [1.0, 1.0]);
        assert_eq!(proportional_scores(&[None]), [0.0]);
    }

    #[rstest]
    fn test_same_length_as_selection(catalog: Catalog) {
        let results = mcda(&json!({"techIds": ["WW", "A_HA", "French_CW"]}), &catalog).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[rstest]
    fn test_space_treatment(catalog: Catalog) {
        let results = mcda(&json!({"techIds": ["WW", "A_HA"]}), &catalog).unwrap();
        assert!(
            score(&results, "WW", Criterion::SpaceRequirements)
                > score(&results, "A_HA", Criterion::SpaceRequirements)
        );
        assert_eq!(score(&results, "WW", Criterion::SpaceRequirements), 1.0);
    }

    #[rstest]
    fn test_space_stormwater(catalog: Catalog) {
        let body = json!({"techIds": ["DB_DB", "GR_IR"], "waterType": "rain_water"});
        let results = mcda(&body, &catalog).unwrap();
        assert!(
            score(&results, "DB_DB", Criterion::SpaceRequirements)
                > score(&results, "GR_IR", Criterion::SpaceRequirements)
        );
    }

    #[rstest]
    fn test_scores_in_range(catalog: Catalog) {
        let ids = catalog.iter().map(|t| t.id.to_string()).collect_vec();
        let mut results = ids
            .iter()
            .map(|id| TechnologyResult::new(catalog.get(id).unwrap().clone()))
            .collect_vec();
        assess(&mut results, &calculate_weights(&WeightInput::new()), Climate::Temperate);
        for result in &results {
            let assessment = assessment(result);
            assert!((0.0..=1.0).contains(&assessment.score));
            assert!(assessment.scores.values().all(|s| (0.0..=1.0).contains(s)));
        }
    }

    #[rstest]
    fn test_weighted_scores(catalog: Catalog) {
        let body = json!({"techIds": ["WW", "A_HA"], "weights": {"wCapex": 5, "wOperation": 0}});
        let results = mcda(&body, &catalog).unwrap();
        let weights = calculate_weights(&WeightInput::from([
            (Criterion::Capex, 5.0),
            (Criterion::Operation, 0.0),
        ]));
        for result in &results {
            let assessment = assessment(result);
            for (criterion, score) in &assessment.scores {
                assert_eq!(assessment.weighted[criterion], score * weights.get(*criterion));
            }
            let total: f64 = assessment.weighted.values().sum();
            assert_approx_eq!(f64, assessment.score, total);
        }
    }

    #[rstest]
    fn test_ranking(catalog: Catalog) {
        let body = json!({"techIds": ["WW", "A_HA", "French_CW", "HF_GW"]});
        let results = mcda(&body, &catalog).unwrap();
        let ranks = results.iter().map(|r| assessment(r).rank).sorted().collect_vec();
        assert_eq!(ranks, [1, 2, 3, 4]);
        for a in &results {
            for b in &results {
                if assessment(a).rank < assessment(b).rank {
                    assert!(assessment(a).score >= assessment(b).score);
                }
            }
        }
    }

    #[rstest]
    fn test_ties_keep_input_order(catalog: Catalog) {
        let record = json!({"id": "WW"});
        let results = mcda(&json!({"techs": [record.clone(), record]}), &catalog).unwrap();
        assert_eq!(assessment(&results[0]).rank, 1);
        assert_eq!(assessment(&results[1]).rank, 2);
    }

    #[rstest]
    fn test_capex_surface_not_attached(catalog: Catalog) {
        let results = mcda(&json!({"techs": [{"id": "WW"}, {"id": "DB_DB"}]}), &catalog).unwrap();
        for result in &results {
            assert!(result.estimate.is_none());
            let value = serde_json::to_value(result).unwrap();
            assert!(value.get("surface_mean").is_none());
            assert!(value["estimated_capex_mean"].as_f64().unwrap() > 0.0);
        }
    }

    #[rstest]
    fn test_capex_without_reference_surface(catalog: Catalog) {
        let body = json!({"techs": [{"id": "PP_PP"}, {"id": "DB_DB"}]});
        let results = mcda(&body, &catalog).unwrap();
        assert_eq!(assessment(&results[0]).estimated_capex_mean, None);
        assert_eq!(score(&results, "PP_PP", Criterion::Capex), 0.0);
        assert_eq!(score(&results, "DB_DB", Criterion::Capex), 1.0);
    }

    #[rstest]
    fn test_serialised_fields(catalog: Catalog) {
        let results = mcda(&json!({"techIds": ["WW"]}), &catalog).unwrap();
        let value = serde_json::to_value(&results[0]).unwrap();
        for criterion in Criterion::iter() {
            assert!(value.get(format!("score_{criterion}")).is_some());
            assert!(value.get(format!("weighted_{criterion}")).is_some());
        }
        assert_eq!(value["rank"], 1);
    }

    #[rstest]
    #[case(json!([]), "body must be an object, not an array")]
    #[case(json!({}), "body must contain techs or techIds")]
    #[case(json!({"techs": [], "techIds": []}), "provide either techs or techIds, not both")]
    #[case(json!({"techs": {"id": "WW"}}), "techs must be an array")]
    #[case(json!({"techs": [{"id": "XX"}]}), "Unknown technology ID XX")]
    #[case(json!({"techIds": ["WW"], "weights": [1]}), "weights must be an object")]
    #[case(json!({"techs": [], "climate": "polar"}), "climate is not in the list of accepted climates")]
    fn test_invalid_request(catalog: Catalog, #[case] body: Value, #[case] msg: &str) {
        assert_error!(mcda(&body, &catalog), msg);
    }
}
