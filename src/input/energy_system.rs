//! Code for loading a solved energy system from the directory the optimiser dumped it to.
use super::*;
use crate::energy_system::{ComponentAttributes, EnergySystem, FlowKey, Node, NodeClass};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const NODES_FILE_NAME: &str = "nodes.csv";
const TIMEINDEX_FILE_NAME: &str = "timeindex.csv";
const RESULTS_SCALARS_FILE_NAME: &str = "results_scalars.csv";
const RESULTS_SEQUENCES_FILE_NAME: &str = "results_sequences.csv";
const PARAMS_SCALARS_FILE_NAME: &str = "params_scalars.csv";
const PARAMS_SEQUENCES_FILE_NAME: &str = "params_sequences.csv";

/// A node as it appears in `nodes.csv`
#[derive(PartialEq, Debug, Deserialize)]
struct NodeRaw {
    label: String,
    kind: NodeClass,
    #[serde(rename = "type")]
    component_type: Option<String>,
    carrier: Option<String>,
    tech: Option<String>,
    capacity: Option<f64>,
}

impl From<NodeRaw> for Node {
    fn from(raw: NodeRaw) -> Self {
        Self {
            label: raw.label.into(),
            class: raw.kind,
            attributes: ComponentAttributes {
                kind: raw.component_type,
                carrier: raw.carrier,
                tech: raw.tech,
            },
            capacity: raw.capacity,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimeStepRaw {
    #[serde(deserialize_with = "deserialise_timestamp")]
    timestamp: NaiveDateTime,
}

/// A scalar result or parameter
#[derive(PartialEq, Debug, Deserialize)]
struct ScalarRaw {
    from: String,
    to: Option<String>,
    var_name: String,
    var_value: f64,
}

/// One time step of a result or parameter series
#[derive(PartialEq, Debug, Deserialize)]
struct SequenceRaw {
    from: String,
    to: Option<String>,
    var_name: String,
    step: usize,
    var_value: f64,
}

fn flow_key(from: String, to: Option<String>) -> FlowKey {
    FlowKey {
        from: from.into(),
        to: to.map(Into::into),
    }
}

type AddScalar = fn(&mut EnergySystem, FlowKey, &str, f64) -> Result<()>;
type AddSequence = fn(&mut EnergySystem, FlowKey, &str, Vec<f64>) -> Result<()>;

/// Read the solved energy system from `dump_dir`.
///
/// `nodes.csv` and `timeindex.csv` are required. Result and parameter files may be missing, in
/// which case the model simply has no values of that sort.
pub fn read_energy_system(dump_dir: &Path) -> Result<EnergySystem> {
    let timeindex = read_timeindex(&dump_dir.join(TIMEINDEX_FILE_NAME))?;
    let mut es = EnergySystem::new(timeindex);

    let nodes_path = dump_dir.join(NODES_FILE_NAME);
    let nodes: Vec<NodeRaw> = read_csv(&nodes_path)?;
    for node in nodes {
        es.add_node(node.into())
            .with_context(|| input_err_msg(&nodes_path))?;
    }

    read_scalars_into(
        &mut es,
        &dump_dir.join(RESULTS_SCALARS_FILE_NAME),
        EnergySystem::add_result_scalar,
    )?;
    read_sequences_into(
        &mut es,
        &dump_dir.join(RESULTS_SEQUENCES_FILE_NAME),
        EnergySystem::add_result_sequence,
    )?;
    read_scalars_into(
        &mut es,
        &dump_dir.join(PARAMS_SCALARS_FILE_NAME),
        EnergySystem::add_param_scalar,
    )?;
    read_sequences_into(
        &mut es,
        &dump_dir.join(PARAMS_SEQUENCES_FILE_NAME),
        EnergySystem::add_param_sequence,
    )?;

    Ok(es)
}

fn read_timeindex(file_path: &Path) -> Result<Vec<NaiveDateTime>> {
    let steps: Vec<TimeStepRaw> = read_csv(file_path)?;
    let timeindex: Vec<_> = steps.into_iter().map(|step| step.timestamp).collect();
    ensure!(
        timeindex.windows(2).all(|pair| pair[0] < pair[1]),
        "Time steps in {} must be strictly increasing",
        file_path.display()
    );

    Ok(timeindex)
}

fn read_scalars_into(es: &mut EnergySystem, file_path: &Path, add: AddScalar) -> Result<()> {
    let scalars: Vec<ScalarRaw> = read_csv_optional(file_path)?;
    for scalar in scalars {
        add(
            es,
            flow_key(scalar.from, scalar.to),
            &scalar.var_name,
            scalar.var_value,
        )
        .with_context(|| input_err_msg(file_path))?;
    }

    Ok(())
}

fn read_sequences_into(es: &mut EnergySystem, file_path: &Path, add: AddSequence) -> Result<()> {
    let steps: Vec<SequenceRaw> = read_csv_optional(file_path)?;
    let sequences = collect_sequences(steps, es.timeindex.len())
        .with_context(|| input_err_msg(file_path))?;
    for ((key, var_name), values) in sequences {
        add(es, key, &var_name, values).with_context(|| input_err_msg(file_path))?;
    }

    Ok(())
}

/// Gather long-format time steps into one series per key and variable.
///
/// Every series must have exactly one value for every step of the time index.
fn collect_sequences(
    steps: Vec<SequenceRaw>,
    len: usize,
) -> Result<IndexMap<(FlowKey, String), Vec<f64>>> {
    let mut partial: IndexMap<(FlowKey, String), Vec<Option<f64>>> = IndexMap::new();
    for step in steps {
        let key = flow_key(step.from, step.to);
        ensure!(
            step.step < len,
            "Step {} of {} for {key} is outside the time index",
            step.step,
            step.var_name
        );

        let id = (key, step.var_name);
        let values = partial
            .entry(id.clone())
            .or_insert_with(|| vec![None; len]);
        ensure!(
            values[step.step].is_none(),
            "Duplicate step for {} of {}",
            id.1,
            id.0
        );
        values[step.step] = Some(step.var_value);
    }

    partial
        .into_iter()
        .map(|((key, var_name), values)| {
            let values: Option<Vec<f64>> = values.into_iter().collect();
            let values =
                values.with_context(|| format!("Missing steps for {var_name} of {key}"))?;
            Ok(((key, var_name), values))
        })
        .collect()
}
