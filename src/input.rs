//! Common routines for handling input data.
use crate::combine::{CombinedRecord, CombinedTable};
use crate::scalar::{ScalarRecord, ScenarioTable};
use crate::sequence::TIMESTAMP_FORMAT;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

pub mod energy_system;
pub use energy_system::read_energy_system;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = read_csv_internal(file_path)?;
    ensure!(
        !vec.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(vec)
}

/// Read a series of type `T`s from a CSV file.
///
/// An empty vector is returned if the file doesn't exist or has no rows.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    if !file_path.exists() {
        return Ok(Vec::new());
    }

    read_csv_internal(file_path)
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let reader = csv::Reader::from_path(file_path)
        .with_context(|| input_err_msg(file_path))?;
    reader
        .into_deserialize()
        .try_collect()
        .with_context(|| input_err_msg(file_path))
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

/// Read a timestamp in the format used throughout input and output files
pub fn deserialise_timestamp<'de, D>(deserialiser: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let value: String = Deserialize::deserialize(deserialiser)?;
    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
}

/// Read the scalars of a single scenario from a CSV file.
///
/// The file must exist but may have no rows. Every `(name, type, carrier, tech, var_name)` key
/// must appear at most once.
pub fn read_scenario_table(file_path: &Path) -> Result<ScenarioTable> {
    let records: Vec<ScalarRecord> = read_csv_internal(file_path)?;
    ScenarioTable::from_records_unique(records.into_iter().map(ScalarRecord::into_key_value))
        .with_context(|| input_err_msg(file_path))
}

/// Read the scalars of several scenarios from a CSV file
pub fn read_combined_table(file_path: &Path) -> Result<CombinedTable> {
    let records: Vec<CombinedRecord> = read_csv_internal(file_path)?;
    CombinedTable::from_records(records).with_context(|| input_err_msg(file_path))
}

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}
