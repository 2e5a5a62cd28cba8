//! Merging the scalar tables of several scenarios into a single [`CombinedTable`].
use crate::id::define_id_type;
use crate::indicators::TOTAL;
use crate::normalise::{CAPACITY_COST, CARRIER_COST, MARGINAL_COST};
use crate::scalar::{ScalarKey, ScenarioTable};
use anyhow::{Result, bail};
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

define_id_type! {ScenarioID}

/// The pseudo-scenario name under which combined results are stored
pub const ALL_SCENARIOS: &str = "all_scenarios";

/// `var_name` for variable operation and maintenance costs
pub const VAR_OM: &str = "var_om";

/// `var_name` for the sum of all costs of a scenario
pub const TOTAL_COST: &str = "total_cost";

/// Uniquely identifies a scalar across scenarios
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct CombinedKey {
    /// The scenario the scalar comes from
    pub scenario: ScenarioID,
    /// The key within the scenario
    pub key: ScalarKey,
}

impl fmt::Display for CombinedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in scenario {}", self.key, self.scenario)
    }
}

/// A row of a combined scalars CSV file
#[derive(PartialEq, Debug, Serialize, Deserialize)]
pub struct CombinedRecord {
    /// The scenario the scalar comes from
    pub scenario: ScenarioID,
    /// The component or bus the value belongs to
    pub name: String,
    /// The component type
    #[serde(rename = "type")]
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

impl CombinedRecord {
    fn new(key: &CombinedKey, var_value: f64) -> Self {
        Self {
            scenario: key.scenario.clone(),
            name: key.key.name.clone(),
            kind: key.key.kind.clone(),
            carrier: key.key.carrier.clone(),
            tech: key.key.tech.clone(),
            var_name: key.key.var_name.clone(),
            var_value,
        }
    }

    fn into_key_value(self) -> (CombinedKey, f64) {
        let key = ScalarKey {
            name: self.name,
            kind: self.kind,
            carrier: self.carrier,
            tech: self.tech,
            var_name: self.var_name,
        };
        let key = CombinedKey {
            scenario: self.scenario,
            key,
        };
        (key, self.var_value)
    }
}

/// The scalars of several scenarios.
///
/// Keys are unique and kept in insertion order, so scenarios appear in the order they were added.
/// Filtering and rescaling produce new tables.
#[derive(PartialEq, Debug, Default, Clone)]
pub struct CombinedTable(IndexMap<CombinedKey, f64>);

impl CombinedTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from CSV records.
    ///
    /// Repeated keys with the same value are kept once; repeated keys with different values are
    /// an error.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = CombinedRecord>,
    {
        let mut table = Self::new();
        for record in records {
            let (key, value) = record.into_key_value();
            table.insert(key, value)?;
        }

        Ok(table)
    }

    /// Add a single value to the table
    pub fn insert(&mut self, key: CombinedKey, value: f64) -> Result<()> {
        match self.0.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(entry) => {
                let existing = *entry.get();
                if existing.to_bits() != value.to_bits() {
                    bail!(
                        "Conflicting values for {}: {existing} and {value}",
                        entry.key()
                    );
                }
                debug!("Ignoring repeated value for {}", entry.key());
            }
        }

        Ok(())
    }

    /// Add every scalar of `table` under the given scenario
    pub fn extend_scenario(&mut self, scenario: &ScenarioID, table: ScenarioTable) -> Result<()> {
        for (key, value) in table {
            let key = CombinedKey {
                scenario: scenario.clone(),
                key,
            };
            self.insert(key, value)?;
        }

        Ok(())
    }

    /// Get a value
    pub fn get(&self, scenario: &ScenarioID, key: &ScalarKey) -> Option<f64> {
        let key = CombinedKey {
            scenario: scenario.clone(),
            key: key.clone(),
        };
        self.0.get(&key).copied()
    }

    /// Iterate over keys and values
    pub fn iter(&self) -> impl Iterator<Item = (&CombinedKey, f64)> {
        self.0.iter().map(|(key, value)| (key, *value))
    }

    /// Iterate over the table as CSV records
    pub fn records(&self) -> impl Iterator<Item = CombinedRecord> + '_ {
        self.iter().map(|(key, value)| CombinedRecord::new(key, value))
    }

    /// The scenarios in the table, in the order they first appear
    pub fn scenarios(&self) -> IndexSet<ScenarioID> {
        self.0.keys().map(|key| key.scenario.clone()).collect()
    }

    /// The scalars of a single scenario
    pub fn scenario_table(&self, scenario: &ScenarioID) -> ScenarioTable {
        ScenarioTable::from_records_summed(
            self.iter()
                .filter(|(key, _)| key.scenario == *scenario)
                .map(|(key, value)| (key.key.clone(), value)),
        )
    }

    /// The number of scalars in the table
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new table containing only the scalars for which `predicate` holds
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&CombinedKey) -> bool,
    {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| predicate(key))
                .map(|(key, value)| (key.clone(), *value))
                .collect(),
        )
    }

    /// A new table without the named components
    pub fn without_components(&self, names: &[String]) -> Self {
        self.filter(|key| !names.contains(&key.key.name))
    }

    /// A new table with only the given scenarios
    pub fn select_scenarios(&self, scenarios: &[ScenarioID]) -> Self {
        self.filter(|key| scenarios.contains(&key.scenario))
    }

    /// A new table with only the given technologies
    pub fn select_techs(&self, techs: &[String]) -> Self {
        self.filter(|key| key.key.tech.as_ref().is_some_and(|tech| techs.contains(tech)))
    }

    /// A new table with only the given kinds of quantity
    pub fn select_var_names<S: AsRef<str>>(&self, var_names: &[S]) -> Self {
        self.filter(|key| {
            var_names
                .iter()
                .any(|var_name| var_name.as_ref() == key.key.var_name)
        })
    }

    /// A new table with every value multiplied by `factor` (e.g. to convert MWh to GWh)
    pub fn scale(&self, factor: f64) -> Self {
        Self(
            self.0
                .iter()
                .map(|(key, value)| (key.clone(), value * factor))
                .collect(),
        )
    }

    /// The capacity, carrier and marginal costs of every component
    pub fn total_cost(&self) -> Self {
        self.select_var_names(&[CAPACITY_COST, CARRIER_COST, MARGINAL_COST])
    }

    /// Merge carrier and marginal costs into a single `var_om` value per component.
    ///
    /// Other scalars are passed through unchanged.
    pub fn group_var_om(&self) -> Self {
        let mut map = IndexMap::new();
        for (key, value) in self.iter() {
            let key = if [CARRIER_COST, MARGINAL_COST].contains(&key.key.var_name.as_str()) {
                CombinedKey {
                    scenario: key.scenario.clone(),
                    key: key.key.with_var_name(VAR_OM),
                }
            } else {
                key.clone()
            };
            *map.entry(key).or_insert(0.0) += value;
        }

        Self(map)
    }

    /// Sum every `var_name` over the components of each scenario.
    ///
    /// The sums are reported under [`TOTAL`], along with a [`TOTAL_COST`] for each scenario with
    /// any costs.
    pub fn totals(&self) -> Self {
        let mut map = IndexMap::new();
        let cost_table = self.total_cost();
        let costs = cost_table
            .iter()
            .map(|(key, value)| (key.scenario.clone(), TOTAL_COST, value));
        let all = self
            .iter()
            .map(|(key, value)| (key.scenario.clone(), key.key.var_name.as_str(), value));
        for (scenario, var_name, value) in all.chain(costs) {
            let key = CombinedKey {
                scenario,
                key: ScalarKey::unattributed(TOTAL, var_name),
            };
            *map.entry(key).or_insert(0.0) += value;
        }

        Self(map)
    }
}

/// Combine the scalar tables of several scenarios into one table.
///
/// Every scalar is tagged with the name of its scenario. Scalars belonging to one of the
/// `excluded_components` are dropped.
///
/// # Arguments
///
/// * `tables` - Scenario names and their tables, in the order they should appear
/// * `excluded_components` - Names of synthetic components to leave out
///
/// # Returns
///
/// The combined table, or an error if two tables give different values for the same scenario
/// and key.
pub fn combine_scalars<I>(tables: I, excluded_components: &[String]) -> Result<CombinedTable>
where
    I: IntoIterator<Item = (ScenarioID, ScenarioTable)>,
{
    let mut combined = CombinedTable::new();
    for (scenario, table) in tables {
        combined.extend_scenario(&scenario, table)?;
    }

    let kept = combined.without_components(excluded_components);
    debug!(
        "Dropped {} scalars of excluded components",
        combined.len() - kept.len()
    );

    Ok(kept)
}
