//! Scenario-wide indicators derived from the combined scalars.
use crate::combine::CombinedTable;
use crate::normalise::{CAPACITY_COST, CARRIER_COST, MARGINAL_COST};
use crate::scalar::{ScalarKey, ScenarioTable};
use anyhow::Result;
use log::debug;
use serde::Deserialize;

/// The name indicators are reported under
pub const TOTAL: &str = "total";

/// Share of heat supplied by components running on electricity
pub const SHARE_EL_HEAT: &str = "share_el_heat";

/// Total cost divided by total heat supplied
pub const SPEC_COST_OF_HEAT: &str = "spec_cost_of_heat";

/// Which scalars the indicators are computed from
#[derive(PartialEq, Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndicatorConfig {
    /// The yearly sum holding heat supplied by each component
    pub heat_var_name: String,
    /// The carrier of electrically driven components
    pub electric_carrier: String,
    /// The costs making up the total cost
    pub cost_var_names: Vec<String>,
    /// Component types which consume rather than supply heat
    pub excluded_types: Vec<String>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            heat_var_name: "yearly_heat".into(),
            electric_carrier: "electricity".into(),
            cost_var_names: [CAPACITY_COST, CARRIER_COST, MARGINAL_COST]
                .map(String::from)
                .to_vec(),
            excluded_types: ["load", "excess"].map(String::from).to_vec(),
        }
    }
}

impl IndicatorConfig {
    /// Whether the scalar is heat supplied by a technology
    fn is_heat_supply(&self, key: &ScalarKey) -> bool {
        key.var_name == self.heat_var_name
            && key.tech.is_some()
            && !key
                .kind
                .as_ref()
                .is_some_and(|kind| self.excluded_types.contains(kind))
    }
}

/// Compute the indicators for one scenario.
///
/// Indicators which would be undefined (e.g. because no heat was supplied) are left out.
pub fn scenario_indicators(table: &ScenarioTable, config: &IndicatorConfig) -> ScenarioTable {
    let heat = || table.iter().filter(|(key, _)| config.is_heat_supply(key));
    let heat_total: f64 = heat().map(|(_, value)| value).sum();
    let electric_heat: f64 = heat()
        .filter(|(key, _)| key.carrier.as_ref() == Some(&config.electric_carrier))
        .map(|(_, value)| value)
        .sum();
    let total_cost: f64 = table
        .iter()
        .filter(|(key, _)| config.cost_var_names.contains(&key.var_name))
        .map(|(_, value)| value)
        .sum();

    let records = [
        (SHARE_EL_HEAT, electric_heat),
        (SPEC_COST_OF_HEAT, total_cost),
    ]
    .into_iter()
    .filter_map(|(var_name, numerator)| {
        let value = numerator / heat_total;
        if value.is_finite() {
            Some((ScalarKey::unattributed(TOTAL, var_name), value))
        } else {
            debug!("Dropping undefined {var_name}");
            None
        }
    });

    ScenarioTable::from_records_summed(records)
}

/// A copy of `combined` with the indicators of every scenario added
pub fn append_indicators(combined: &CombinedTable, config: &IndicatorConfig) -> Result<CombinedTable> {
    let mut out = combined.clone();
    for scenario in combined.scenarios() {
        let indicators = scenario_indicators(&combined.scenario_table(&scenario), config);
        out.extend_scenario(&scenario, indicators)?;
    }

    Ok(out)
}
