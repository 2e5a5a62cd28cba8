//! The stages of a study: postprocessing each scenario, combining them and writing the tables.
//!
//! Each stage reads what the previous one wrote to disk, so the stages can be run on their own.
use crate::combine::{ALL_SCENARIOS, CombinedTable, ScenarioID, combine_scalars};
use crate::extract::{all_bus_supply, filling_levels, link_flows};
use crate::indicators::append_indicators;
use crate::input::{read_combined_table, read_energy_system, read_scenario_table};
use crate::normalise::normalise;
use crate::output::{
    SCALARS_FILE_NAME, ScenarioWriter, create_output_directory, write_combined_table, write_report,
};
use crate::report::build_report;
use crate::scalar::ScenarioTable;
use crate::study::StudyConfig;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::{error, info, warn};
use std::path::Path;

/// Options for stages which write output
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputOptions {
    /// Whether to replace existing output
    pub overwrite: bool,
    /// Whether to also write flows into and out of links
    pub raw: bool,
}

/// Create an output folder, warning if its old contents were removed
fn prepare_output_dir(output_dir: &Path, overwrite: bool) -> Result<()> {
    let overwritten = create_output_directory(output_dir, overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_dir.display()
        )
    })?;
    if overwritten {
        warn!("Output folder {} was overwritten", output_dir.display());
    }

    Ok(())
}

/// Extract and normalise the results of a single solved scenario.
///
/// Bus supply tables, storage filling levels and (optionally) link flows are written to the
/// scenario's postprocessed folder along with the normalised scalars.
pub fn postprocess_scenario(
    study_dir: &Path,
    config: &StudyConfig,
    scenario: &ScenarioID,
    opts: OutputOptions,
) -> Result<ScenarioTable> {
    let dirs = config.experiment_dirs(study_dir, scenario.as_str());
    let es = read_energy_system(&dirs.optimised).with_context(|| {
        format!(
            "Failed to load solved energy system from {}",
            dirs.optimised.display()
        )
    })?;
    info!(
        "Loaded {} nodes over {} time steps for scenario {scenario}",
        es.nodes.len(),
        es.timeindex.len()
    );

    prepare_output_dir(&dirs.postprocessed, opts.overwrite)?;
    let writer = ScenarioWriter::create(&dirs.postprocessed)?;

    let supply = all_bus_supply(&es)?;
    writer.write_bus_supply(&supply)?;
    if let Some(levels) = filling_levels(&es)? {
        writer.write_filling_levels(&levels)?;
    }
    if opts.raw {
        match link_flows(&es)? {
            Some(links) => writer.write_links(&links)?,
            None => info!("Scenario {scenario} has no links"),
        }
    }

    let scalars = normalise(
        &es,
        &supply,
        &config.yearly_sums,
        &config.thermal_conversion,
    )?;
    writer.write_scalars(&scalars)?;
    info!(
        "Wrote {} scalars for scenario {scenario} to {}",
        scalars.len(),
        dirs.postprocessed.display()
    );

    Ok(scalars)
}

/// Combine the postprocessed scalars of every scenario of the study.
///
/// Every scenario must have been postprocessed already. Indicators are added to the combined
/// table before it is written.
pub fn combine_scenarios(
    study_dir: &Path,
    config: &StudyConfig,
    overwrite: bool,
) -> Result<CombinedTable> {
    let tables: Vec<_> = config
        .scenarios
        .iter()
        .map(|scenario| {
            let file_path = config
                .experiment_dirs(study_dir, scenario.as_str())
                .postprocessed
                .join(SCALARS_FILE_NAME);
            let table = read_scenario_table(&file_path)
                .with_context(|| format!("No postprocessed results for scenario {scenario}"))?;
            Ok((scenario.clone(), table))
        })
        .try_collect::<_, _, anyhow::Error>()?;

    let combined = combine_scalars(tables, &config.excluded_components)?;
    let combined = append_indicators(&combined, &config.indicators)?;

    let dirs = config.experiment_dirs(study_dir, ALL_SCENARIOS);
    prepare_output_dir(&dirs.postprocessed, overwrite)?;
    let file_path = dirs.postprocessed.join(SCALARS_FILE_NAME);
    write_combined_table(&file_path, &combined)?;
    info!(
        "Saved results of {} scenarios to {}",
        config.scenarios.len(),
        file_path.display()
    );

    Ok(combined)
}

/// Write every report table of the study from the combined scalars
pub fn write_tables(study_dir: &Path, config: &StudyConfig, overwrite: bool) -> Result<()> {
    let dirs = config.experiment_dirs(study_dir, ALL_SCENARIOS);
    let combined = read_combined_table(&dirs.postprocessed.join(SCALARS_FILE_NAME))
        .context("Combined results not found. Have the scenarios been combined?")?;

    prepare_output_dir(&dirs.tables, overwrite)?;
    for spec in &config.reports {
        let report = build_report(&combined, spec)
            .with_context(|| format!("Failed to build report {}", spec.file_name))?;
        let file_path = dirs.tables.join(&spec.file_name);
        write_report(&file_path, &report)?;
        info!("Wrote table {}", file_path.display());
    }

    Ok(())
}

/// Postprocess every scenario of the study.
///
/// All scenarios are attempted, even if some fail. If any failed, an error listing them is
/// returned.
pub fn postprocess_scenarios(
    study_dir: &Path,
    config: &StudyConfig,
    opts: OutputOptions,
) -> Result<()> {
    let mut failed = Vec::new();
    for scenario in &config.scenarios {
        info!("Postprocessing scenario {scenario}");
        if let Err(err) = postprocess_scenario(study_dir, config, scenario, opts) {
            error!("Failed to postprocess scenario {scenario}: {err:?}");
            failed.push(scenario.as_str());
        }
    }
    ensure!(
        failed.is_empty(),
        "Postprocessing failed for scenarios: {}",
        failed.join(", ")
    );

    Ok(())
}

/// Run every stage of the study, stopping before combining if any scenario failed
pub fn run_study(study_dir: &Path, config: &StudyConfig, opts: OutputOptions) -> Result<()> {
    postprocess_scenarios(study_dir, config, opts)?;
    combine_scenarios(study_dir, config, opts.overwrite)?;
    write_tables(study_dir, config, opts.overwrite)?;
    info!("Study complete!");

    Ok(())
}
