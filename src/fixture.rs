//! Fixtures for tests

use crate::energy_system::{
    ComponentAttributes, EnergySystem, FlowKey, Node, NodeClass,
};
use crate::scalar::{ScalarKey, ScenarioTable};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Create a [`ScalarKey`] with all attributes present
pub fn scalar_key(name: &str, kind: &str, carrier: &str, tech: &str, var_name: &str) -> ScalarKey {
    let attributes = attributes(kind, carrier, tech);
    ScalarKey::new(name, &attributes, var_name)
}

fn attributes(kind: &str, carrier: &str, tech: &str) -> ComponentAttributes {
    ComponentAttributes {
        kind: Some(kind.into()),
        carrier: Some(carrier.into()),
        tech: Some(tech.into()),
    }
}

fn bus(label: &str) -> Node {
    Node {
        label: label.into(),
        class: NodeClass::Bus,
        attributes: ComponentAttributes::default(),
        capacity: None,
    }
}

fn component(
    label: &str,
    class: NodeClass,
    (kind, carrier, tech): (&str, &str, &str),
    capacity: Option<f64>,
) -> Node {
    Node {
        label: label.into(),
        class,
        attributes: attributes(kind, carrier, tech),
        capacity,
    }
}

#[fixture]
pub fn timeindex() -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2017, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..3).map(|hour| start + TimeDelta::hours(hour)).collect()
}

/// A small district heating system with a central and a decentral heat bus.
///
/// The central bus is supplied by a CHP plant, a heat pump and a storage and exports to the
/// decentral bus through a link. The decentral bus has a gas boiler and a shortage slack.
#[fixture]
pub fn energy_system(timeindex: Vec<NaiveDateTime>) -> EnergySystem {
    let mut es = EnergySystem::new(timeindex);

    let nodes = [
        bus("gas"),
        bus("electricity"),
        bus("heat_central"),
        bus("heat_decentral"),
        component(
            "gas-chp",
            NodeClass::Conversion,
            ("extraction", "gas", "chp"),
            Some(47.0),
        ),
        component(
            "electricity-hp",
            NodeClass::Conversion,
            ("conversion", "electricity", "hp"),
            None,
        ),
        component(
            "gas-hob",
            NodeClass::Conversion,
            ("conversion", "gas", "hob"),
            Some(100.0),
        ),
        component(
            "heat-storage",
            NodeClass::Storage,
            ("storage", "heat", "storage"),
            None,
        ),
        component(
            "heat-distribution",
            NodeClass::Link,
            ("link", "heat", "distribution"),
            Some(500.0),
        ),
        component(
            "heat-demand",
            NodeClass::Load,
            ("load", "heat", "demand"),
            None,
        ),
        component(
            "heat-excess",
            NodeClass::Excess,
            ("excess", "heat", "excess"),
            None,
        ),
        component(
            "heat_decentral-shortage",
            NodeClass::Shortage,
            ("shortage", "heat", "shortage"),
            Some(1000.0),
        ),
    ];
    for node in nodes {
        es.add_node(node).unwrap();
    }

    // Scalar results
    for (key, name, value) in [
        (FlowKey::flow("gas-chp", "heat_central"), "invest", 10.0),
        (FlowKey::flow("electricity-hp", "heat_central"), "invest", 25.0),
        (FlowKey::node("heat-storage"), "invest", 40.0),
        (FlowKey::node("heat-storage"), "init_cap", 10.0),
    ] {
        es.add_result_scalar(key, name, value).unwrap();
    }

    // Flows
    for (from, to, values) in [
        ("gas", "gas-chp", [20.0, 20.0, 20.0]),
        ("gas-chp", "electricity", [8.0, 8.0, 8.0]),
        ("gas-chp", "heat_central", [10.0, 10.0, 10.0]),
        ("gas", "gas-hob", [35.0, 25.0, 15.0]),
        ("gas-hob", "heat_decentral", [30.0, 20.0, 10.0]),
        ("electricity", "electricity-hp", [5.0, 5.0, 5.0]),
        ("electricity-hp", "heat_central", [15.0, 15.0, 15.0]),
        ("heat_central", "heat-storage", [5.0, 0.0, 0.0]),
        ("heat-storage", "heat_central", [0.0, 3.0, 2.0]),
        ("heat_central", "heat-distribution", [10.0, 10.0, 10.0]),
        ("heat-distribution", "heat_decentral", [9.0, 9.0, 9.0]),
        ("heat_decentral-shortage", "heat_decentral", [0.0, 1.0, 0.0]),
        ("heat_central", "heat-demand", [10.0, 18.0, 16.0]),
        ("heat_central", "heat-excess", [0.0, 0.0, 1.0]),
    ] {
        es.add_result_sequence(FlowKey::flow(from, to), "flow", values.to_vec())
            .unwrap();
    }
    es.add_result_sequence(
        FlowKey::node("heat-storage"),
        "storage_content",
        vec![5.0, 2.0, 0.0],
    )
    .unwrap();

    // Parameters
    for (key, name, value) in [
        (
            FlowKey::flow("gas-chp", "heat_central"),
            "investment_ep_costs",
            100.0,
        ),
        (
            FlowKey::flow("electricity-hp", "heat_central"),
            "investment_ep_costs",
            200.0,
        ),
        (FlowKey::node("heat-storage"), "investment_ep_costs", 5.0),
        (
            FlowKey::flow("gas-hob", "heat_decentral"),
            "investment_ep_costs",
            50.0,
        ),
        (FlowKey::flow("gas", "gas-chp"), "variable_costs", 30.0),
        (FlowKey::flow("gas-chp", "electricity"), "variable_costs", -40.0),
        (
            FlowKey::flow("electricity", "electricity-hp"),
            "variable_costs",
            50.0,
        ),
        (
            FlowKey::flow("heat_decentral-shortage", "heat_decentral"),
            "variable_costs",
            1000.0,
        ),
        (
            FlowKey::flow("gas-hob", "heat_decentral"),
            "nominal_value",
            100.0,
        ),
        (
            FlowKey::flow("heat_decentral-shortage", "heat_decentral"),
            "nominal_value",
            0.0,
        ),
    ] {
        es.add_param_scalar(key, name, value).unwrap();
    }
    es.add_param_sequence(
        FlowKey::flow("gas", "gas-hob"),
        "variable_costs",
        vec![30.0, 30.0, 40.0],
    )
    .unwrap();

    es
}

#[fixture]
pub fn scenario_table() -> ScenarioTable {
    ScenarioTable::from_records_summed([
        (
            scalar_key("gas-chp", "extraction", "gas", "chp", "capacity"),
            100.0,
        ),
        (
            scalar_key("gas-chp", "extraction", "gas", "chp", "yearly_heat"),
            30.0,
        ),
        (
            scalar_key("electricity-hp", "conversion", "electricity", "hp", "yearly_heat"),
            45.0,
        ),
        (
            scalar_key("heat-demand", "load", "heat", "demand", "yearly_heat"),
            44.0,
        ),
        (ScalarKey::unattributed("import", "yearly_heat"), -3.0),
        (
            scalar_key("gas-chp", "extraction", "gas", "chp", "carrier_cost"),
            1800.0,
        ),
        (
            scalar_key("gas-chp", "extraction", "gas", "chp", "marginal_cost"),
            -960.0,
        ),
        (
            scalar_key("electricity-hp", "conversion", "electricity", "hp", "capacity_cost"),
            5000.0,
        ),
    ])
}
