//! Code for reading the technology catalog from a CSV file.
use super::{input_err_msg, read_csv_from_reader};
use crate::technology::{
    Burden, Climate, ConcentrationPollutant, CostRange, EcosystemService, ModelForm, Module,
    RegressionModel, RemovalPollutant, StorageParameters, Technology, TechnologyID, TechnologyMap,
    WaterType,
};
use crate::units::{FlowPerArea, Length, MoneyPerArea};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use strum::IntoEnumIterator;

/// The catalog bundled with the program
const EMBEDDED_CATALOG: &str = include_str!("../../data/technologies.csv");

/// Allowed values for water-type compatibility coefficients
const COMPATIBILITY_CLASSES: [f64; 6] = [0.0, 0.05, 0.33, 0.5, 0.8, 1.0];

/// Tolerance when matching a coefficient to its class
const COMPATIBILITY_TOLERANCE: f64 = 0.01;

/// Highest allowed ecosystem-service or burden rating
const MAX_RATING: u8 = 3;

/// A raw catalog row, keyed by column name
type Row = HashMap<String, String>;

/// Read the technology catalog from a CSV file.
///
/// # Arguments
///
/// * `file_path` - Path to the catalog CSV file
///
/// # Returns
///
/// The technologies in file order, keyed by ID.
pub fn read_technologies(file_path: &Path) -> Result<TechnologyMap> {
    let file = fs::File::open(file_path).with_context(|| input_err_msg(file_path))?;
    read_technologies_from_reader(file).with_context(|| input_err_msg(file_path))
}

/// Read the catalog bundled with the program
pub fn read_embedded_technologies() -> Result<TechnologyMap> {
    read_technologies_from_reader(EMBEDDED_CATALOG.as_bytes())
        .context("Error reading bundled technology catalog")
}

/// Read and validate technologies from any CSV source
pub fn read_technologies_from_reader<R: Read>(reader: R) -> Result<TechnologyMap> {
    let rows: Vec<Row> = read_csv_from_reader(reader)?;
    let mut technologies = TechnologyMap::new();
    for row in &rows {
        let technology = read_technology(row)?;
        let id = technology.id.clone();
        ensure!(
            technologies.insert(id.clone(), Rc::new(technology)).is_none(),
            "Duplicate technology ID {id}"
        );
    }

    Ok(technologies)
}

/// Build one technology from a catalog row
fn read_technology(row: &Row) -> Result<Technology> {
    let id = required_str(row, "id")?;
    ensure!(!id.is_empty(), "Technology ID cannot be empty");
    let id = TechnologyID::new(id);

    read_technology_fields(id.clone(), row).with_context(|| format!("Invalid technology {id}"))
}

fn read_technology_fields(id: TechnologyID, row: &Row) -> Result<Technology> {
    let module = required_str(row, "module")?;
    let module = Module::from_str(module)
        .ok()
        .with_context(|| format!("Unknown module {module}"))?;

    let water_types: IndexMap<_, _> = WaterType::iter()
        .map(|water_type| {
            let column = water_type.to_string();
            let coefficient = required_f64(row, &column)?;
            check_compatibility(coefficient).with_context(|| column_err_msg(&column))?;
            Ok((water_type, coefficient))
        })
        .collect::<Result<_>>()?;

    let removal: IndexMap<_, _> = RemovalPollutant::iter()
        .map(|pollutant| Ok((pollutant, read_flag(row, &pollutant.to_string())?)))
        .collect::<Result<_>>()?;
    let ecosystem_services: IndexMap<_, _> = EcosystemService::iter()
        .map(|service| Ok((service, read_rating(row, &service.to_string())?)))
        .collect::<Result<_>>()?;
    let burdens: IndexMap<_, _> = Burden::iter()
        .map(|burden| Ok((burden, read_rating(row, &burden.to_string())?)))
        .collect::<Result<_>>()?;

    let mut m2_pe = IndexMap::new();
    for climate in Climate::iter() {
        let column = climate.m2_pe_column();
        if let Some(value) = optional_f64(row, &column)? {
            ensure!(value > 0.0, "{} must be positive", column);
            m2_pe.insert(climate, value);
        }
    }

    let hydraulic_loading_rate = optional_f64(row, "hydraulic_loading_rate")?;
    if let Some(rate) = hydraulic_loading_rate {
        ensure!(rate > 0.0, "hydraulic_loading_rate must be positive");
    }

    let mut regressions = IndexMap::new();
    for pollutant in ConcentrationPollutant::iter() {
        if let Some(model) = read_regression(row, pollutant)? {
            regressions.insert(pollutant, model);
        }
    }

    Ok(Technology {
        id,
        name: required_str(row, "name")?.to_string(),
        module,
        water_types,
        vertical: read_flag(row, "vertical")?,
        household: read_flag(row, "household_building_solutions")?,
        energy: read_flag(row, "energy")?,
        removal,
        ecosystem_services,
        burdens,
        m2_pe,
        hydraulic_loading_rate: hydraulic_loading_rate.map(FlowPerArea),
        storage: read_storage(row)?,
        capex: read_cost_range(row, "capex")?,
        opex: read_cost_range(row, "opex")?,
        regressions,
    })
}

fn column_err_msg(column: &str) -> String {
    format!("Invalid value for column {column}")
}

fn required_str<'a>(row: &'a Row, column: &str) -> Result<&'a str> {
    row.get(column)
        .map(String::as_str)
        .with_context(|| format!("Missing column {column}"))
}

fn optional_f64(row: &Row, column: &str) -> Result<Option<f64>> {
    let value = required_str(row, column)?;
    if value.is_empty() {
        return Ok(None);
    }

    let value: f64 = value.parse().with_context(|| column_err_msg(column))?;
    ensure!(value.is_finite(), "{} must be finite", column);
    Ok(Some(value))
}

fn required_f64(row: &Row, column: &str) -> Result<f64> {
    optional_f64(row, column)?.with_context(|| format!("Column {column} cannot be empty"))
}

fn read_flag(row: &Row, column: &str) -> Result<bool> {
    match required_str(row, column)? {
        "0" => Ok(false),
        "1" => Ok(true),
        value => bail!("{} must be 0 or 1, got {}", column, value),
    }
}

fn read_rating(row: &Row, column: &str) -> Result<u8> {
    let value = required_str(row, column)?;
    let rating: u8 = value.parse().with_context(|| column_err_msg(column))?;
    ensure!(
        rating <= MAX_RATING,
        "{} must be between 0 and {}, got {}",
        column,
        MAX_RATING,
        rating
    );

    Ok(rating)
}

/// Check that a compatibility coefficient belongs to one of the allowed classes
fn check_compatibility(coefficient: f64) -> Result<()> {
    ensure!(
        COMPATIBILITY_CLASSES
            .iter()
            .any(|class| (coefficient - class).abs() <= COMPATIBILITY_TOLERANCE),
        "Compatibility coefficient {} is not one of {:?}",
        coefficient,
        COMPATIBILITY_CLASSES
    );

    Ok(())
}

fn read_storage(row: &Row) -> Result<Option<StorageParameters>> {
    let capacity_low = optional_f64(row, "storage_capacity_low")?;
    let capacity_high = optional_f64(row, "storage_capacity_high")?;
    let depth = optional_f64(row, "depth")?;
    let infiltration = required_str(row, "infiltration")?;

    let (Some(capacity_low), Some(capacity_high), Some(depth)) = (capacity_low, capacity_high, depth)
    else {
        ensure!(
            capacity_low.is_none() && capacity_high.is_none() && depth.is_none(),
            "Storage columns must be all filled or all empty"
        );
        return Ok(None);
    };

    ensure!(
        (0.0..=1.0).contains(&capacity_low) && (0.0..=1.0).contains(&capacity_high),
        "Storage capacities must be between 0 and 1"
    );
    ensure!(
        capacity_low <= capacity_high,
        "storage_capacity_low cannot exceed storage_capacity_high"
    );
    ensure!(depth > 0.0, "depth must be positive");
    let infiltration = !infiltration.is_empty() && read_flag(row, "infiltration")?;

    Ok(Some(StorageParameters {
        capacity_low,
        capacity_high,
        depth: Length(depth),
        infiltration,
    }))
}

fn read_cost_range(row: &Row, prefix: &str) -> Result<CostRange> {
    let low = required_f64(row, &format!("{prefix}_low"))?;
    let high = required_f64(row, &format!("{prefix}_high"))?;
    ensure!(low >= 0.0, "{}_low cannot be negative", prefix);
    ensure!(low <= high, "{}_low cannot exceed {}_high", prefix, prefix);

    Ok(CostRange {
        low: MoneyPerArea(low),
        high: MoneyPerArea(high),
    })
}

/// Read the regression model for a pollutant, if the row has one
fn read_regression(row: &Row, pollutant: ConcentrationPollutant) -> Result<Option<RegressionModel>> {
    let column = format!("{pollutant}_model");
    let form = required_str(row, &column)?;
    if form.is_empty() {
        return Ok(None);
    }

    let form = ModelForm::from_str(form)
        .ok()
        .with_context(|| format!("Unknown regression model {form} in column {column}"))?;
    let coefficient = |name: &str| required_f64(row, &format!("{pollutant}_{name}"));
    let a = coefficient("a")?;
    let b = coefficient("b")?;
    let interval = coefficient("pi")?;
    let load_min = coefficient("load_min")?;
    let load_max = coefficient("load_max")?;
    ensure!(interval >= 0.0, "{}_pi cannot be negative", pollutant);
    ensure!(
        load_min < load_max,
        "{}_load_min must be lower than {}_load_max",
        pollutant,
        pollutant
    );
    if form == ModelForm::Power {
        ensure!(load_min > 0.0, "Power models need a positive {}_load_min", pollutant);
    }

    Ok(Some(RegressionModel {
        form,
        a,
        b,
        interval,
        load_range: load_min..=load_max,
    }))
}
