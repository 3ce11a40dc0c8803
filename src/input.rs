//! Common routines for handling input data.
use anyhow::{Context, Result, ensure};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::Path;

pub mod technology;

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read a series of type `T`s from a CSV reader into a `Vec<T>`.
///
/// # Arguments
///
/// * `reader` - The source of CSV data, including a header row
pub fn read_csv_from_reader<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let vec = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
    ensure!(!vec.is_empty(), "CSV file cannot be empty");

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read a JSON request file into an untyped value.
///
/// The value is validated later, so that type errors are reported like any other request error.
pub fn read_json(file_path: &Path) -> Result<Value> {
    let json_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    serde_json::from_str(&json_str).with_context(|| input_err_msg(file_path))
}
