//! The configuration of a study: which scenarios it has, where their files live and how their
//! results are aggregated.
use crate::combine::{ALL_SCENARIOS, ScenarioID};
use crate::indicators::IndicatorConfig;
use crate::input::read_toml;
use crate::normalise::{ThermalConversion, YearlySum};
use crate::report::ReportSpec;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const STUDY_FILE_NAME: &str = "study.toml";

/// Where the files of each stage live, relative to the study directory
#[derive(PartialEq, Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Dumps of the solved energy systems
    pub optimised: PathBuf,
    /// Normalised scalars and extracted sequences
    pub postprocessed: PathBuf,
    /// Report tables
    pub tables: PathBuf,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            optimised: "optimised".into(),
            postprocessed: "postprocessed".into(),
            tables: "tables".into(),
        }
    }
}

/// The directories belonging to a single scenario
#[derive(PartialEq, Debug, Clone)]
pub struct ExperimentDirs {
    /// Dump of the solved energy system
    pub optimised: PathBuf,
    /// Normalised scalars and extracted sequences
    pub postprocessed: PathBuf,
    /// Report tables
    pub tables: PathBuf,
}

fn default_yearly_sums() -> Vec<YearlySum> {
    vec![
        YearlySum {
            var_name: "yearly_electricity".into(),
            buses: vec!["electricity".into()],
        },
        YearlySum {
            var_name: "yearly_heat".into(),
            buses: vec!["heat_central".into(), "heat_decentral".into()],
        },
    ]
}

fn default_excluded_components() -> Vec<String> {
    ["heat-distribution", "heat-demand", "heat_decentral-shortage"]
        .map(String::from)
        .to_vec()
}

fn default_thermal_conversion() -> Vec<ThermalConversion> {
    vec![ThermalConversion::default()]
}

/// Study configuration, as read from `study.toml`
#[derive(PartialEq, Debug, Deserialize, Clone)]
pub struct StudyConfig {
    /// Where files live
    #[serde(default)]
    pub directories: DirectoryConfig,
    /// The scenarios of the study, in display order
    pub scenarios: Vec<ScenarioID>,
    /// Which bus supply tables are summed over the year
    #[serde(default = "default_yearly_sums")]
    pub yearly_sums: Vec<YearlySum>,
    /// Synthetic components left out of the combined results
    #[serde(default = "default_excluded_components")]
    pub excluded_components: Vec<String>,
    /// Fixed factors applied to capacities
    #[serde(default = "default_thermal_conversion")]
    pub thermal_conversion: Vec<ThermalConversion>,
    /// Report tables to generate
    #[serde(default)]
    pub reports: Vec<ReportSpec>,
    /// How scenario indicators are computed
    #[serde(default)]
    pub indicators: IndicatorConfig,
}

impl StudyConfig {
    /// Read the study configuration from `study_dir`
    pub fn from_path(study_dir: &Path) -> Result<Self> {
        let file_path = study_dir.join(STUDY_FILE_NAME);
        let config: Self = read_toml(&file_path)?;
        config
            .validate()
            .with_context(|| format!("Invalid study configuration in {}", file_path.display()))?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.scenarios.is_empty(), "No scenarios given");

        let mut scenarios = IndexSet::new();
        for scenario in &self.scenarios {
            ensure!(
                scenario.as_str() != ALL_SCENARIOS,
                "{ALL_SCENARIOS} is reserved for combined results"
            );
            ensure!(
                scenarios.insert(scenario),
                "Scenario {scenario} is listed more than once"
            );
        }

        let mut file_names = IndexSet::new();
        for report in &self.reports {
            ensure!(
                file_names.insert(&report.file_name),
                "More than one report is written to {}",
                report.file_name
            );
            for scenario in &report.scenarios {
                ensure!(
                    scenarios.contains(scenario),
                    "Report {} refers to unknown scenario {scenario}",
                    report.file_name
                );
            }
        }

        for yearly in &self.yearly_sums {
            ensure!(
                !yearly.buses.is_empty(),
                "Yearly sum {} has no buses",
                yearly.var_name
            );
        }

        Ok(())
    }

    /// The directories of a scenario (or of the combined results, see [`ALL_SCENARIOS`])
    pub fn experiment_dirs(&self, study_dir: &Path, scenario: &str) -> ExperimentDirs {
        let dir = |sub: &Path| study_dir.join(sub).join(scenario);
        ExperimentDirs {
            optimised: dir(&self.directories.optimised),
            postprocessed: dir(&self.directories.postprocessed),
            tables: dir(&self.directories.tables),
        }
    }
}
