//! Time series tables indexed by timestamp, one column per component.
use anyhow::{Result, ensure};
use chrono::NaiveDateTime;
use indexmap::IndexMap;

/// The format used for timestamps in input and output files
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A set of named time series sharing a common time index
#[derive(PartialEq, Debug, Clone)]
pub struct SequenceTable {
    timeindex: Vec<NaiveDateTime>,
    columns: IndexMap<String, Vec<f64>>,
}

impl SequenceTable {
    /// Create a table with no columns
    pub fn new(timeindex: Vec<NaiveDateTime>) -> Self {
        Self {
            timeindex,
            columns: IndexMap::new(),
        }
    }

    /// Add a column to the table.
    ///
    /// The column must have one value per time step and its name must not already be in use.
    pub fn insert_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        ensure!(
            values.len() == self.timeindex.len(),
            "Column {name} has {} values but the time index has {}",
            values.len(),
            self.timeindex.len()
        );
        ensure!(
            !self.columns.contains_key(name),
            "Column {name} already exists"
        );
        self.columns.insert(name.to_string(), values);

        Ok(())
    }

    /// The time index
    pub fn timeindex(&self) -> &[NaiveDateTime] {
        &self.timeindex
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Iterate over column names and values
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// The column names in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// The sum over the whole time index of each column
    pub fn column_sums(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns()
            .map(|(name, values)| (name, values.iter().sum()))
    }

    /// The number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Iterate over rows as a timestamp followed by one value per column
    pub fn rows(&self) -> impl Iterator<Item = (&NaiveDateTime, Vec<f64>)> {
        self.timeindex
            .iter()
            .enumerate()
            .map(|(i, timestamp)| (timestamp, self.columns.values().map(|c| c[i]).collect()))
    }
}
