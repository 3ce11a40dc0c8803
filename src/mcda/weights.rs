//! Weights given to each criterion of the multi-criteria analysis.
use super::Criterion;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use strum::IntoEnumIterator;

/// Weight for criteria the user doesn't weight.
///
/// The treatment and stormwater presets use the same value for every criterion.
pub const DEFAULT_WEIGHT: f64 = 2.5;

/// Largest weight a user may give
pub const MAX_WEIGHT: f64 = 5.0;

/// Raw weights as given by the user
pub type WeightInput = IndexMap<Criterion, f64>;

/// Normalised weights for every criterion, summing to one
#[derive(Debug, Clone, PartialEq)]
pub struct Weights(IndexMap<Criterion, f64>);

impl Weights {
    /// The weight of a criterion
    pub fn get(&self, criterion: Criterion) -> f64 {
        self.0.get(&criterion).copied().unwrap_or(0.0)
    }

    /// Iterate over criteria and their weights
    pub fn iter(&self) -> impl Iterator<Item = (Criterion, f64)> + '_ {
        self.0.iter().map(|(criterion, weight)| (*criterion, *weight))
    }

    /// The number of weights
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no weights
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Weights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (criterion, weight) in &self.0 {
            map.serialize_entry(criterion.weight_name(), weight)?;
        }
        map.end()
    }
}

/// Read user weights from the `weights` field of a request
pub fn read_weight_input(value: &Value) -> Result<WeightInput> {
    let weights = value.as_object().context("weights must be an object")?;
    weights
        .iter()
        .map(|(key, value)| {
            let criterion = Criterion::from_weight_name(key)
                .with_context(|| format!("{key} is not an accepted weight"))?;
            let weight = value
                .as_f64()
                .with_context(|| format!("{key} must be a number between 0 and {MAX_WEIGHT}"))?;
            ensure!(
                (0.0..=MAX_WEIGHT).contains(&weight),
                "{} must be a number between 0 and {}",
                key,
                MAX_WEIGHT
            );

            Ok((criterion, weight))
        })
        .collect()
}

/// Fill in missing weights with the default and normalise so they sum to one.
///
/// If every weight is zero, all criteria get the same weight.
#[allow(clippy::cast_precision_loss)]
pub fn calculate_weights(input: &WeightInput) -> Weights {
    let weights: IndexMap<_, _> = Criterion::iter()
        .map(|criterion| {
            let weight = input.get(&criterion).copied().unwrap_or(DEFAULT_WEIGHT);
            (criterion, weight)
        })
        .collect();

    let total: f64 = weights.values().sum();
    let count = weights.len() as f64;
    Weights(
        weights
            .into_iter()
            .map(|(criterion, weight)| {
                let weight = if total > 0.0 {
                    weight / total
                } else {
                    1.0 / count
                };
                (criterion, weight)
            })
            .collect(),
    )
}
