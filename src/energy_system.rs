//! The solved energy system handed over by the optimiser.
//!
//! An [`EnergySystem`] is a set of labelled nodes together with the results and parameters the
//! optimiser reported for each directed pair of nodes. Node-level results (e.g. the installed
//! capacity of a storage) are keyed by a [`FlowKey`] without a destination.
use crate::id::define_id_type;
use anyhow::{Result, ensure};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::fmt;
use std::rc::Rc;

define_id_type! {NodeID}

/// The name of the result holding flow time series
pub const FLOW: &str = "flow";

/// The name of the result holding invested capacity
pub const INVEST: &str = "invest";

/// A map of [`Node`]s, keyed by label
pub type NodeMap = IndexMap<NodeID, Rc<Node>>;

/// Results or parameters for every [`FlowKey`] in the model
pub type ResultMap = IndexMap<FlowKey, ResultEntry>;

/// The role a node plays in the energy system topology
#[derive(PartialEq, Eq, Clone, Copy, Debug, DeserializeLabeledStringEnum)]
pub enum NodeClass {
    /// A balancing node connecting components of the same carrier
    #[string = "bus"]
    Bus,
    /// A component which only feeds into buses (e.g. a volatile or dispatchable source)
    #[string = "source"]
    Source,
    /// A generic sink
    #[string = "sink"]
    Sink,
    /// A demand
    #[string = "load"]
    Load,
    /// A sink taking up surplus energy
    #[string = "excess"]
    Excess,
    /// A slack source covering unmet demand
    #[string = "shortage"]
    Shortage,
    /// A component converting between carriers (heat pump, CHP, boiler...)
    #[string = "conversion"]
    Conversion,
    /// A component transporting energy between buses
    #[string = "link"]
    Link,
    /// A storage
    #[string = "storage"]
    Storage,
}

impl NodeClass {
    /// Whether nodes of this class are sinks
    pub fn is_sink(self) -> bool {
        matches!(self, Self::Sink | Self::Load | Self::Excess)
    }
}

/// Categorical attributes of a component.
///
/// Buses and some synthetic components carry none of these, so every field is optional.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Default)]
pub struct ComponentAttributes {
    /// The component type (e.g. "extraction")
    pub kind: Option<String>,
    /// The energy carrier (e.g. "gas")
    pub carrier: Option<String>,
    /// The technology (e.g. "chp")
    pub tech: Option<String>,
}

/// A node in the energy system
#[derive(PartialEq, Debug)]
pub struct Node {
    /// Unique label of the node
    pub label: NodeID,
    /// What sort of node this is
    pub class: NodeClass,
    /// Categorical attributes, resolved once when the model is loaded
    pub attributes: ComponentAttributes,
    /// Fixed nameplate capacity, if the component has one
    pub capacity: Option<f64>,
}

impl Node {
    /// Whether the node is a bus
    pub fn is_bus(&self) -> bool {
        self.class == NodeClass::Bus
    }
}

/// Identifies a directed flow between two nodes, or a single node if `to` is `None`
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct FlowKey {
    /// The origin of the flow
    pub from: NodeID,
    /// The destination of the flow (`None` for node-level values)
    pub to: Option<NodeID>,
}

impl FlowKey {
    /// Create a key for a flow between two nodes
    pub fn flow(from: &str, to: &str) -> Self {
        Self {
            from: from.into(),
            to: Some(to.into()),
        }
    }

    /// Create a key for a value belonging to a single node
    pub fn node(label: &str) -> Self {
        Self {
            from: label.into(),
            to: None,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.to {
            Some(to) => write!(f, "({}, {})", self.from, to),
            None => write!(f, "({}, None)", self.from),
        }
    }
}

/// A value selected from a [`ResultEntry`]
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ResultValue<'a> {
    /// A single number
    Scalar(f64),
    /// A time series
    Sequence(&'a [f64]),
}

/// Scalar and time-series values reported for a single [`FlowKey`]
#[derive(PartialEq, Debug, Default, Clone)]
pub struct ResultEntry {
    /// Scalar values by name (e.g. "invest")
    pub scalars: IndexMap<String, f64>,
    /// Time series by name (e.g. "flow")
    pub sequences: IndexMap<String, Vec<f64>>,
}

impl ResultEntry {
    /// Look up a value by name. Scalars take precedence over sequences of the same name.
    pub fn get(&self, name: &str) -> Option<ResultValue<'_>> {
        if let Some(value) = self.scalars.get(name) {
            return Some(ResultValue::Scalar(*value));
        }

        self.sequences
            .get(name)
            .map(|values| ResultValue::Sequence(values.as_slice()))
    }
}

/// Get every value called `name` from `map`, keyed by flow.
///
/// Keys without a value of that name are skipped.
pub fn select<'a>(
    map: &'a ResultMap,
    name: &str,
) -> impl Iterator<Item = (&'a FlowKey, ResultValue<'a>)> {
    map.iter()
        .filter_map(move |(key, entry)| Some((key, entry.get(name)?)))
}

/// Get the time series called `name` from `map`, keyed by flow
pub fn select_sequences<'a>(
    map: &'a ResultMap,
    name: &str,
) -> impl Iterator<Item = (&'a FlowKey, &'a [f64])> {
    map.iter().filter_map(move |(key, entry)| {
        entry
            .sequences
            .get(name)
            .map(|values| (key, values.as_slice()))
    })
}

/// A solved energy system
#[derive(PartialEq, Debug, Default)]
pub struct EnergySystem {
    /// All nodes in the model
    pub nodes: NodeMap,
    /// The time steps which all sequences are indexed by
    pub timeindex: Vec<NaiveDateTime>,
    /// Optimisation results
    pub results: ResultMap,
    /// Parameters the model was built with
    pub params: ResultMap,
}

impl EnergySystem {
    /// Create an empty energy system over the given time steps
    pub fn new(timeindex: Vec<NaiveDateTime>) -> Self {
        Self {
            timeindex,
            ..Default::default()
        }
    }

    /// Add a node to the model
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        ensure!(
            !self.nodes.contains_key(&node.label),
            "Duplicate node label: {}",
            node.label
        );
        self.nodes.insert(node.label.clone(), node.into());

        Ok(())
    }

    /// Get a node by label
    pub fn node(&self, label: &NodeID) -> Option<&Rc<Node>> {
        self.nodes.get(label)
    }

    /// Whether the node with the given label exists and is a bus
    pub fn is_bus(&self, label: &NodeID) -> bool {
        self.node(label).is_some_and(|node| node.is_bus())
    }

    /// Iterate over the buses in the model
    pub fn iter_buses(&self) -> impl Iterator<Item = &Rc<Node>> {
        self.nodes.values().filter(|node| node.is_bus())
    }

    /// The component a result belongs to.
    ///
    /// For a flow this is whichever end isn't a bus, preferring the origin if both are buses. For
    /// node-level keys it is the node itself. Flows between two components have no single owner
    /// and give `None`.
    pub fn component_for(&self, key: &FlowKey) -> Option<&Rc<Node>> {
        let from = self.node(&key.from)?;
        let Some(to) = &key.to else {
            return Some(from);
        };
        let to = self.node(to)?;

        if to.is_bus() {
            Some(from)
        } else if from.is_bus() {
            Some(to)
        } else {
            None
        }
    }

    /// Whether the model contains a node of the given class
    pub fn has_class(&self, class: NodeClass) -> bool {
        self.nodes.values().any(|node| node.class == class)
    }

    /// Check that both ends of `key` refer to known nodes
    fn check_key(&self, key: &FlowKey) -> Result<()> {
        let labels = std::iter::once(&key.from).chain(key.to.as_ref());
        for label in labels {
            ensure!(
                self.nodes.contains_key(label),
                "Unknown node {label} in {key}"
            );
        }

        Ok(())
    }

    /// Check that a time series spans the whole time index
    fn check_sequence(&self, key: &FlowKey, name: &str, values: &[f64]) -> Result<()> {
        ensure!(
            values.len() == self.timeindex.len(),
            "Sequence {name} for {key} has {} values but the time index has {}",
            values.len(),
            self.timeindex.len()
        );

        Ok(())
    }

    /// Record a scalar result
    pub fn add_result_scalar(&mut self, key: FlowKey, name: &str, value: f64) -> Result<()> {
        self.check_key(&key)?;
        insert_scalar(&mut self.results, key, name, value)
    }

    /// Record a time-series result
    pub fn add_result_sequence(
        &mut self,
        key: FlowKey,
        name: &str,
        values: Vec<f64>,
    ) -> Result<()> {
        self.check_key(&key)?;
        self.check_sequence(&key, name, &values)?;
        insert_sequence(&mut self.results, key, name, values)
    }

    /// Record a scalar parameter
    pub fn add_param_scalar(&mut self, key: FlowKey, name: &str, value: f64) -> Result<()> {
        self.check_key(&key)?;
        insert_scalar(&mut self.params, key, name, value)
    }

    /// Record a time-series parameter
    pub fn add_param_sequence(&mut self, key: FlowKey, name: &str, values: Vec<f64>) -> Result<()> {
        self.check_key(&key)?;
        self.check_sequence(&key, name, &values)?;
        insert_sequence(&mut self.params, key, name, values)
    }
}

fn insert_scalar(map: &mut ResultMap, key: FlowKey, name: &str, value: f64) -> Result<()> {
    let entry = map.entry(key).or_default();
    ensure!(
        !entry.sequences.contains_key(name),
        "{name} is already present as a sequence"
    );
    let old = entry.scalars.insert(name.to_string(), value);
    ensure!(old.is_none(), "Duplicate scalar value for {name}");

    Ok(())
}

fn insert_sequence(map: &mut ResultMap, key: FlowKey, name: &str, values: Vec<f64>) -> Result<()> {
    let entry = map.entry(key).or_default();
    ensure!(
        !entry.scalars.contains_key(name),
        "{name} is already present as a scalar"
    );
    let old = entry.sequences.insert(name.to_string(), values);
    ensure!(old.is_none(), "Duplicate sequence for {name}");

    Ok(())
}
