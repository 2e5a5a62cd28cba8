//! Scalar results in the common long format shared by every scenario.
//!
//! Every scalar is identified by a [`ScalarKey`] made up of the component name, its categorical
//! attributes and the kind of quantity. A [`ScenarioTable`] holds the scalars for one scenario run.
use crate::energy_system::{ComponentAttributes, Node};
use anyhow::{Result, bail};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniquely identifies a scalar within a scenario
#[derive(PartialEq, Eq, Hash, Clone, Debug, PartialOrd, Ord)]
pub struct ScalarKey {
    /// The component or bus the value belongs to
    pub name: String,
    /// The component type
    pub kind: Option<String>,
    /// The energy carrier
    pub carrier: Option<String>,
    /// The technology
    pub tech: Option<String>,
    /// The kind of quantity (e.g. "capacity")
    pub var_name: String,
}

impl ScalarKey {
    /// Create a key from a name, a set of attributes and the kind of quantity
    pub fn new(name: &str, attributes: &ComponentAttributes, var_name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: attributes.kind.clone(),
            carrier: attributes.carrier.clone(),
            tech: attributes.tech.clone(),
            var_name: var_name.to_string(),
        }
    }

    /// Create a key for a node of the energy system
    pub fn for_node(node: &Node, var_name: &str) -> Self {
        Self::new(&node.label.0, &node.attributes, var_name)
    }

    /// Create a key for something which isn't a component (e.g. net imports)
    pub fn unattributed(name: &str, var_name: &str) -> Self {
        Self::new(name, &ComponentAttributes::default(), var_name)
    }

    /// The same key with a different `var_name`
    pub fn with_var_name(&self, var_name: &str) -> Self {
        Self {
            var_name: var_name.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ScalarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "null".into());
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.name,
            show(&self.kind),
            show(&self.carrier),
            show(&self.tech),
            self.var_name
        )
    }
}

/// A row of a scalars CSV file
#[derive(PartialEq, Debug, Serialize, Deserialize)]
pub struct ScalarRecord {
    /// The component or bus the value belongs to
    pub name: String,
    /// The component type
    #[serde(rename = "type")] // NB: we can't name a field type as it's a reserved keyword
    pub kind: Option<String>,
    /// The energy carrier
    pub carrier: Option<String>,
    /// The technology
    pub tech: Option<String>,
    /// The kind of quantity
    pub var_name: String,
    /// The value itself
    pub var_value: f64,
}

impl ScalarRecord {
    /// Create a record from a key and value
    pub fn new(key: &ScalarKey, var_value: f64) -> Self {
        Self {
            name: key.name.clone(),
            kind: key.kind.clone(),
            carrier: key.carrier.clone(),
            tech: key.tech.clone(),
            var_name: key.var_name.clone(),
            var_value,
        }
    }

    /// Split the record into its key and value
    pub fn into_key_value(self) -> (ScalarKey, f64) {
        let key = ScalarKey {
            name: self.name,
            kind: self.kind,
            carrier: self.carrier,
            tech: self.tech,
            var_name: self.var_name,
        };
        (key, self.var_value)
    }
}

/// The scalar results for a single scenario.
///
/// Keys are unique and kept in the order they were first seen.
#[derive(PartialEq, Debug, Default, Clone)]
pub struct ScenarioTable(IndexMap<ScalarKey, f64>);

impl ScenarioTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from key-value pairs, summing the values of duplicate keys
    pub fn from_records_summed<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (ScalarKey, f64)>,
    {
        let mut map = IndexMap::new();
        for (key, value) in iter {
            *map.entry(key).or_insert(0.0) += value;
        }

        Self(map)
    }

    /// Build a table from key-value pairs, raising an error on duplicate keys
    pub fn from_records_unique<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ScalarKey, f64)>,
    {
        let mut map = IndexMap::new();
        for (key, value) in iter {
            match map.entry(key) {
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
                Entry::Occupied(entry) => {
                    bail!("Duplicate scalar key {}", entry.key());
                }
            }
        }

        Ok(Self(map))
    }

    /// Combine several tables into one, summing the values of keys present in more than one
    pub fn concat<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = ScenarioTable>,
    {
        Self::from_records_summed(tables.into_iter().flat_map(|table| table.0))
    }

    /// Get the value for a key
    pub fn get(&self, key: &ScalarKey) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// Apply `f` to the value stored under `key`, returning `false` if the key isn't present
    pub fn update<F>(&mut self, key: &ScalarKey, f: F) -> bool
    where
        F: FnOnce(f64) -> f64,
    {
        match self.0.get_mut(key) {
            Some(value) => {
                *value = f(*value);
                true
            }
            None => false,
        }
    }

    /// Iterate over keys and values
    pub fn iter(&self) -> impl Iterator<Item = (&ScalarKey, f64)> {
        self.0.iter().map(|(key, value)| (key, *value))
    }

    /// Iterate over the table as CSV records
    pub fn records(&self) -> impl Iterator<Item = ScalarRecord> + '_ {
        self.iter().map(|(key, value)| ScalarRecord::new(key, value))
    }

    /// The number of scalars in the table
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for ScenarioTable {
    type Item = (ScalarKey, f64);
    type IntoIter = indexmap::map::IntoIter<ScalarKey, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, scalar_key};

    #[test]
    fn test_from_records_summed() {
        let capacity = scalar_key("gas-chp", "extraction", "gas", "chp", "capacity");
        let invest = capacity.with_var_name("invest");
        let table = ScenarioTable::from_records_summed([
            (capacity.clone(), 100.0),
            (invest.clone(), 10.0),
            (capacity.clone(), 25.0),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&capacity), Some(125.0));
        assert_eq!(table.get(&invest), Some(10.0));
        assert_eq!(table.iter().next().unwrap().0, &capacity);
    }

    #[test]
    fn test_from_records_unique() {
        let key = scalar_key("gas-chp", "extraction", "gas", "chp", "capacity");
        assert_error!(
            ScenarioTable::from_records_unique([(key.clone(), 1.0), (key, 2.0)]),
            "Duplicate scalar key (gas-chp, extraction, gas, chp, capacity)"
        );
    }

    #[test]
    fn test_concat() {
        let key = ScalarKey::unattributed("import", "yearly_heat");
        let a = ScenarioTable::from_records_summed([(key.clone(), -30.0)]);
        let b = ScenarioTable::from_records_summed([(key.clone(), 27.0)]);
        let table = ScenarioTable::concat([a, b, ScenarioTable::new()]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&key), Some(-3.0));
    }

    #[test]
    fn test_update() {
        let key = ScalarKey::unattributed("import", "yearly_heat");
        let mut table = ScenarioTable::from_records_summed([(key.clone(), 2.0)]);
        assert!(table.update(&key, |value| value * 3.0));
        assert_eq!(table.get(&key), Some(6.0));
        assert!(!table.update(&key.with_var_name("other"), |value| value));
    }

    #[test]
    fn test_display_null_attributes() {
        let key = ScalarKey::unattributed("import", "yearly_heat");
        assert_eq!(key.to_string(), "(import, null, null, null, yearly_heat)");
    }

    #[test]
    fn test_record_round_trip_key() {
        let key = scalar_key("gas-chp", "extraction", "gas", "chp", "capacity");
        let (key_out, value) = ScalarRecord::new(&key, 35.5).into_key_value();
        assert_eq!(key_out, key);
        assert_eq!(value, 35.5);
    }
}
