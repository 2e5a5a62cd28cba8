//! Extraction of per-bus time series and capacities from a solved [`EnergySystem`].
use crate::energy_system::{
    EnergySystem, FLOW, FlowKey, INVEST, Node, NodeClass, NodeID, select_sequences,
};
use crate::scalar::{ScalarKey, ScenarioTable};
use crate::sequence::SequenceTable;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use std::rc::Rc;

/// The column holding the net import of a bus through links
pub const IMPORT_COLUMN: &str = "import";

/// The node-level result holding the filling level of a storage
const STORAGE_CONTENT: &str = "storage_content";

/// `var_name` for exogenous capacities
pub const CAPACITY: &str = "capacity";

/// Look up both ends of a flow
fn flow_ends<'a>(es: &'a EnergySystem, key: &FlowKey) -> Option<(&'a Rc<Node>, &'a Rc<Node>)> {
    let from = es.node(&key.from)?;
    let to = es.node(key.to.as_ref()?)?;
    Some((from, to))
}

/// Net flow into `bus` from links, or `None` if no link touches the bus.
///
/// Computed as the flow from links into the bus minus the flow from the bus into links.
fn net_import(es: &EnergySystem, bus: &NodeID) -> Option<Vec<f64>> {
    let mut net = vec![0.0; es.timeindex.len()];
    let mut touches_link = false;
    for (key, values) in select_sequences(&es.results, FLOW) {
        let Some((from, to)) = flow_ends(es, key) else {
            continue;
        };

        let sign = if to.label == *bus && from.class == NodeClass::Link {
            1.0
        } else if from.label == *bus && to.class == NodeClass::Link {
            -1.0
        } else {
            continue;
        };

        touches_link = true;
        for (acc, value) in net.iter_mut().zip(values) {
            *acc += sign * value;
        }
    }

    touches_link.then_some(net)
}

/// Build the supply table for a bus.
///
/// The table has one column for each component feeding into the bus, followed by the net import
/// through links (if any link touches the bus) and then the flows into demands and excess sinks.
pub fn bus_supply(es: &EnergySystem, bus: &NodeID) -> Result<SequenceTable> {
    let mut supply = SequenceTable::new(es.timeindex.clone());
    let flows = move || {
        select_sequences(&es.results, FLOW).filter_map(move |(key, values)| {
            flow_ends(es, key).map(|(from, to)| (from, to, values))
        })
    };

    for (from, _, values) in flows().filter(|(from, to, _)| {
        to.label == *bus && !from.is_bus() && from.class != NodeClass::Link
    }) {
        supply.insert_column(from.label.as_str(), values.to_vec())?;
    }

    if let Some(net_import) = net_import(es, bus) {
        supply.insert_column(IMPORT_COLUMN, net_import)?;
    }

    for class in [NodeClass::Load, NodeClass::Excess] {
        for (_, to, values) in
            flows().filter(|(from, to, _)| from.label == *bus && to.class == class)
        {
            supply.insert_column(to.label.as_str(), values.to_vec())?;
        }
    }

    Ok(supply)
}

/// Build the supply table for every bus in the model
pub fn all_bus_supply(es: &EnergySystem) -> Result<IndexMap<NodeID, SequenceTable>> {
    es.iter_buses()
        .map(|bus| {
            let supply = bus_supply(es, &bus.label)
                .with_context(|| format!("Failed to extract supply for bus {}", bus.label))?;
            Ok((bus.label.clone(), supply))
        })
        .collect()
}

/// All flows into or out of links, one column per flow, or `None` if the model has no links
pub fn link_flows(es: &EnergySystem) -> Result<Option<SequenceTable>> {
    if !es.has_class(NodeClass::Link) {
        return Ok(None);
    }

    let mut table = SequenceTable::new(es.timeindex.clone());
    for (key, values) in select_sequences(&es.results, FLOW) {
        let Some((from, to)) = flow_ends(es, key) else {
            continue;
        };
        if from.class == NodeClass::Link || to.class == NodeClass::Link {
            table.insert_column(&format!("{}->{}", from.label, to.label), values.to_vec())?;
        }
    }

    Ok(Some(table))
}

/// The filling level of every storage, or `None` if the model has no storages
pub fn filling_levels(es: &EnergySystem) -> Result<Option<SequenceTable>> {
    if !es.has_class(NodeClass::Storage) {
        return Ok(None);
    }

    let mut table = SequenceTable::new(es.timeindex.clone());
    for node in es.nodes.values().filter(|n| n.class == NodeClass::Storage) {
        let content = es
            .results
            .get(&FlowKey::node(node.label.as_str()))
            .and_then(|entry| entry.sequences.get(STORAGE_CONTENT));
        match content {
            Some(values) => table.insert_column(node.label.as_str(), values.clone())?,
            None => debug!("No {STORAGE_CONTENT} result for storage {}", node.label),
        }
    }

    Ok(Some(table))
}

/// Capacities invested in by the optimiser, attributed to the component end of each flow
pub fn endogenous_capacities(es: &EnergySystem) -> ScenarioTable {
    let records = es.results.iter().filter_map(|(key, entry)| {
        key.to.as_ref()?;
        let invest = *entry.scalars.get(INVEST)?;
        let component = es.component_for(key)?;
        Some((ScalarKey::for_node(component, INVEST), invest))
    });

    ScenarioTable::from_records_summed(records)
}

/// Fixed nameplate capacities of components.
///
/// Buses, sinks, shortages and links are never included.
pub fn exogenous_capacities(es: &EnergySystem) -> ScenarioTable {
    let records = es
        .nodes
        .values()
        .filter(|node| {
            !(node.is_bus()
                || node.class.is_sink()
                || matches!(node.class, NodeClass::Shortage | NodeClass::Link))
        })
        .filter_map(|node| Some((ScalarKey::for_node(node, CAPACITY), node.capacity?)));

    ScenarioTable::from_records_summed(records)
}

/// Node-level scalar results of storages.
///
/// `init_cap` and `invest` are reported as `storage_capacity` and `storage_capacity_invest`.
/// Results attached to flows into or out of a storage are not included.
pub fn storage_capacities(es: &EnergySystem) -> ScenarioTable {
    let mut records = Vec::new();
    for (key, entry) in es.results.iter().filter(|(key, _)| key.to.is_none()) {
        let Some(node) = es.node(&key.from) else {
            continue;
        };
        if node.class != NodeClass::Storage {
            continue;
        }

        for (name, value) in &entry.scalars {
            let var_name = match name.as_str() {
                "init_cap" => "storage_capacity",
                "invest" => "storage_capacity_invest",
                other => other,
            };
            records.push((ScalarKey::for_node(node, var_name), *value));
        }
    }

    ScenarioTable::from_records_summed(records)
}

/// All capacities in the model, summing values reported under the same key
pub fn capacities(es: &EnergySystem) -> ScenarioTable {
    ScenarioTable::concat([
        endogenous_capacities(es),
        exogenous_capacities(es),
        storage_capacities(es),
    ])
}
