//! Conversion of raw optimisation results into a [`ScenarioTable`].
//!
//! Capacities, costs, yearly energy sums and full-load hours are each re-keyed into the common
//! `(name, type, carrier, tech, var_name)` schema and then concatenated, summing duplicate keys.
use crate::energy_system::{EnergySystem, FLOW, FlowKey, INVEST, NodeID, ResultValue, select};
use crate::extract::{CAPACITY, capacities};
use crate::scalar::{ScalarKey, ScenarioTable};
use crate::sequence::SequenceTable;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;

/// `var_name` for annualised investment costs
pub const CAPACITY_COST: &str = "capacity_cost";

/// `var_name` for the cost of energy bought from a bus
pub const CARRIER_COST: &str = "carrier_cost";

/// `var_name` for the cost (or revenue) of energy sold into a bus
pub const MARGINAL_COST: &str = "marginal_cost";

/// `var_name` for full-load hours
pub const FULL_LOAD_HOURS: &str = "full_load_hours";

/// Parameter holding the annualised investment cost per unit of capacity
const INVESTMENT_EP_COSTS: &str = "investment_ep_costs";

/// Parameter holding the cost per unit of flow
const VARIABLE_COSTS: &str = "variable_costs";

/// Parameter holding the fixed capacity of a flow
const NOMINAL_VALUE: &str = "nominal_value";

/// Electrical to thermal capacity ratio of the CHP plant
const CHP_THERMAL_FACTOR: f64 = 0.355 / 0.47;

/// The product of a parameter and a result
#[derive(PartialEq, Debug, Clone)]
pub enum Product {
    /// Both factors were scalars
    Scalar(f64),
    /// At least one factor was a time series
    Sequence(Vec<f64>),
}

impl Product {
    /// The product summed over time
    pub fn total(&self) -> f64 {
        match self {
            Self::Scalar(value) => *value,
            Self::Sequence(values) => values.iter().sum(),
        }
    }
}

/// Multiply two values, broadcasting a scalar over a time series
fn multiply(param: ResultValue, variable: ResultValue) -> Result<Product> {
    let product = match (param, variable) {
        (ResultValue::Scalar(p), ResultValue::Scalar(v)) => Product::Scalar(p * v),
        (ResultValue::Scalar(s), ResultValue::Sequence(seq))
        | (ResultValue::Sequence(seq), ResultValue::Scalar(s)) => {
            Product::Sequence(seq.iter().map(|value| value * s).collect())
        }
        (ResultValue::Sequence(p), ResultValue::Sequence(v)) => {
            ensure!(
                p.len() == v.len(),
                "Sequences have different lengths ({} and {})",
                p.len(),
                v.len()
            );
            Product::Sequence(p.iter().zip(v).map(|(p, v)| p * v).collect())
        }
    };

    Ok(product)
}

/// Multiply the parameter `param_name` by the result `var_name` for every flow which has both.
///
/// Flows with only one of the two are left out.
pub fn multiply_param_with_variable(
    es: &EnergySystem,
    param_name: &str,
    var_name: &str,
) -> Result<IndexMap<FlowKey, Product>> {
    let mut products = IndexMap::new();
    for (key, variable) in select(&es.results, var_name) {
        let Some(param) = es.params.get(key).and_then(|entry| entry.get(param_name)) else {
            continue;
        };

        let product = multiply(param, variable)
            .with_context(|| format!("Cannot multiply {param_name} by {var_name} for {key}"))?;
        products.insert(key.clone(), product);
    }

    Ok(products)
}

/// Attribute values to the component each flow belongs to and sum them per key
fn to_scenario_table<'a, I>(es: &EnergySystem, values: I, var_name: &str) -> ScenarioTable
where
    I: IntoIterator<Item = (&'a FlowKey, f64)>,
{
    let records = values.into_iter().filter_map(|(key, value)| {
        let Some(component) = es.component_for(key) else {
            debug!("Dropping {var_name} for {key}: flow doesn't touch a bus");
            return None;
        };
        Some((ScalarKey::for_node(component, var_name), value))
    });

    ScenarioTable::from_records_summed(records)
}

/// Annualised investment cost of every invested capacity
pub fn capacity_cost(es: &EnergySystem) -> Result<ScenarioTable> {
    let products = multiply_param_with_variable(es, INVESTMENT_EP_COSTS, INVEST)?;
    let totals = products.iter().map(|(key, product)| (key, product.total()));

    Ok(to_scenario_table(es, totals, CAPACITY_COST))
}

/// Which side of a bus a variable cost is incurred on
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum CostDirection {
    /// The component buys from the bus
    Carrier,
    /// The component sells into the bus
    Marginal,
}

impl CostDirection {
    /// Classify a flow by whether the bus is its origin or its destination
    pub fn of(es: &EnergySystem, key: &FlowKey) -> Option<Self> {
        if es.is_bus(&key.from) {
            Some(Self::Carrier)
        } else if key.to.as_ref().is_some_and(|to| es.is_bus(to)) {
            Some(Self::Marginal)
        } else {
            None
        }
    }

    /// The `var_name` costs in this direction are reported under
    pub fn var_name(self) -> &'static str {
        match self {
            Self::Carrier => CARRIER_COST,
            Self::Marginal => MARGINAL_COST,
        }
    }
}

/// Total variable cost over the year of all flows in the given direction
pub fn variable_cost(es: &EnergySystem, direction: CostDirection) -> Result<ScenarioTable> {
    let products = multiply_param_with_variable(es, VARIABLE_COSTS, FLOW)?;
    let totals = products
        .iter()
        .filter(|(key, _)| CostDirection::of(es, key) == Some(direction))
        .map(|(key, product)| (key, product.total()));

    Ok(to_scenario_table(es, totals, direction.var_name()))
}

/// Total cost of energy bought from buses
pub fn carrier_cost(es: &EnergySystem) -> Result<ScenarioTable> {
    variable_cost(es, CostDirection::Carrier)
}

/// Total cost of energy sold into buses
pub fn marginal_cost(es: &EnergySystem) -> Result<ScenarioTable> {
    variable_cost(es, CostDirection::Marginal)
}

/// A fixed factor applied to a single scalar, e.g. to express an electrical capacity in thermal
/// terms
#[derive(PartialEq, Debug, Deserialize, Clone)]
pub struct ThermalConversion {
    /// Name of the component
    pub name: String,
    /// The component type
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// The energy carrier
    pub carrier: Option<String>,
    /// The technology
    pub tech: Option<String>,
    /// The scalar to convert
    #[serde(default = "default_conversion_var_name")]
    pub var_name: String,
    /// The factor to multiply the value by
    pub factor: f64,
}

fn default_conversion_var_name() -> String {
    CAPACITY.to_string()
}

impl Default for ThermalConversion {
    /// The CHP plant's capacity is reported in electrical terms
    fn default() -> Self {
        Self {
            name: "gas-chp".into(),
            kind: Some("extraction".into()),
            carrier: Some("gas".into()),
            tech: Some("chp".into()),
            var_name: CAPACITY.into(),
            factor: CHP_THERMAL_FACTOR,
        }
    }
}

impl ThermalConversion {
    /// The key of the scalar to convert
    pub fn key(&self) -> ScalarKey {
        ScalarKey {
            name: self.name.clone(),
            kind: self.kind.clone(),
            carrier: self.carrier.clone(),
            tech: self.tech.clone(),
            var_name: self.var_name.clone(),
        }
    }

    /// Apply the conversion to `table`. Tables without the key are returned unchanged.
    pub fn apply(&self, mut table: ScenarioTable) -> ScenarioTable {
        let key = self.key();
        if !table.update(&key, |value| value * self.factor) {
            debug!("No value for {key}; skipping conversion");
        }

        table
    }
}

/// Sum every column of `sequences` over the time index.
///
/// Columns named after a component take that component's attributes; others (e.g. net imports)
/// have none.
pub fn yearly_sum<'a, I>(es: &EnergySystem, sequences: I, var_name: &str) -> ScenarioTable
where
    I: IntoIterator<Item = &'a SequenceTable>,
{
    let records = sequences
        .into_iter()
        .flat_map(SequenceTable::column_sums)
        .map(|(name, total)| {
            let key = match es.nodes.get(name) {
                Some(node) => ScalarKey::for_node(node, var_name),
                None => ScalarKey::unattributed(name, var_name),
            };
            (key, total)
        });

    ScenarioTable::from_records_summed(records)
}

/// Full-load hours of every component with a capacity on one of its flows.
///
/// The capacity of a flow is its fixed nominal value plus any invested capacity. Flows and
/// capacities are summed per component before dividing; components whose result would be
/// infinite or undefined are left out.
pub fn full_load_hours(es: &EnergySystem) -> ScenarioTable {
    let mut totals: IndexMap<ScalarKey, (f64, f64)> = IndexMap::new();
    for (key, entry) in es.results.iter().filter(|(key, _)| key.to.is_some()) {
        let Some(flow) = entry.sequences.get(FLOW) else {
            continue;
        };
        let nominal = es
            .params
            .get(key)
            .and_then(|params| params.scalars.get(NOMINAL_VALUE));
        let invest = entry.scalars.get(INVEST);
        if nominal.is_none() && invest.is_none() {
            continue;
        }
        let Some(component) = es.component_for(key) else {
            continue;
        };

        let (total_flow, total_capacity) = totals
            .entry(ScalarKey::for_node(component, FULL_LOAD_HOURS))
            .or_default();
        *total_flow += flow.iter().sum::<f64>();
        *total_capacity += nominal.unwrap_or(&0.0) + invest.unwrap_or(&0.0);
    }

    let records = totals.into_iter().filter_map(|(key, (flow, capacity))| {
        let hours = flow / capacity;
        if hours.is_finite() {
            Some((key, hours))
        } else {
            debug!("Dropping undefined full-load hours for {key}");
            None
        }
    });

    ScenarioTable::from_records_summed(records)
}

/// A yearly sum over the supply tables of one or more buses
#[derive(PartialEq, Debug, Deserialize, Clone)]
pub struct YearlySum {
    /// The `var_name` to report the sums under
    pub var_name: String,
    /// The buses whose supply tables are summed
    pub buses: Vec<NodeID>,
}

/// Build the complete scalar table for one solved scenario.
///
/// # Arguments
///
/// * `es` - The solved energy system
/// * `bus_supply` - Supply tables of every bus (see [`crate::extract::all_bus_supply`])
/// * `yearly_sums` - Which bus tables to sum over the year, and under which `var_name`
/// * `conversions` - Fixed factors to apply to capacities
pub fn normalise(
    es: &EnergySystem,
    bus_supply: &IndexMap<NodeID, SequenceTable>,
    yearly_sums: &[YearlySum],
    conversions: &[ThermalConversion],
) -> Result<ScenarioTable> {
    let capacities = conversions
        .iter()
        .fold(capacities(es), |table, conversion| conversion.apply(table));

    let mut tables = vec![capacities];
    for yearly in yearly_sums {
        let sequences = yearly.buses.iter().filter_map(|bus| {
            let supply = bus_supply.get(bus);
            if supply.is_none() {
                warn!("Bus {bus} not found; leaving it out of {}", yearly.var_name);
            }
            supply
        });
        tables.push(yearly_sum(es, sequences, &yearly.var_name));
    }

    tables.push(capacity_cost(es)?);
    tables.push(carrier_cost(es)?);
    tables.push(marginal_cost(es)?);
    tables.push(full_load_hours(es));

    Ok(ScenarioTable::concat(tables))
}
