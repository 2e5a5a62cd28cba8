//! The command line interface for the postprocessing of a study.
use crate::combine::ScenarioID;
use crate::compare::{FLOAT_CMP_TOLERANCE, compare_csv_dirs};
use crate::log;
use crate::pipeline::{
    OutputOptions, combine_scenarios, postprocess_scenario, postprocess_scenarios, run_study,
    write_tables,
};
use crate::settings::Settings;
use crate::study::StudyConfig;
use ::log::info;
use anyhow::{Context, Result, bail, ensure};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the postprocessing of a study.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for commands which write results
#[derive(Args)]
pub struct OutputArgs {
    /// Whether to overwrite existing results
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to also write flows into and out of links
    #[arg(long)]
    pub raw: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Extract and normalise the results of solved scenarios.
    Postprocess {
        /// Path to the study directory.
        study_dir: PathBuf,
        /// Only postprocess this scenario.
        #[arg(short, long)]
        scenario: Option<String>,
        /// Output options
        #[command(flatten)]
        opts: OutputArgs,
    },
    /// Combine the postprocessed scalars of all scenarios.
    Combine {
        /// Path to the study directory.
        study_dir: PathBuf,
        /// Whether to overwrite existing results
        #[arg(long)]
        overwrite: bool,
    },
    /// Write report tables from the combined scalars.
    Tables {
        /// Path to the study directory.
        study_dir: PathBuf,
        /// Whether to overwrite existing tables
        #[arg(long)]
        overwrite: bool,
    },
    /// Postprocess and combine all scenarios, then write the report tables.
    Run {
        /// Path to the study directory.
        study_dir: PathBuf,
        /// Output options
        #[command(flatten)]
        opts: OutputArgs,
    },
    /// Compare two folders of CSV files.
    Compare {
        /// The first folder.
        dir1: PathBuf,
        /// The second folder.
        dir2: PathBuf,
        /// Tolerance for comparing numbers
        #[arg(long, default_value_t = FLOAT_CMP_TOLERANCE)]
        tolerance: f64,
    },
    /// Manage program settings.
    Settings {
        /// The available subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Postprocess {
                study_dir,
                scenario,
                opts,
            } => handle_postprocess_command(&study_dir, scenario.as_deref(), &opts, None),
            Self::Combine {
                study_dir,
                overwrite,
            } => handle_combine_command(&study_dir, overwrite, None),
            Self::Tables {
                study_dir,
                overwrite,
            } => handle_tables_command(&study_dir, overwrite, None),
            Self::Run { study_dir, opts } => handle_run_command(&study_dir, &opts, None),
            Self::Compare {
                dir1,
                dir2,
                tolerance,
            } => handle_compare_command(&dir1, &dir2, tolerance),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start heatflex
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ heatflex --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help in markdown format
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load the study and initialise the program logger.
///
/// Log files are written to the root of the study's postprocessed folder.
fn start_study(study_dir: &Path, settings: Option<Settings>) -> Result<(Settings, StudyConfig)> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    let config = StudyConfig::from_path(study_dir).context("Failed to load study.")?;

    let log_dir = study_dir.join(&config.directories.postprocessed);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create directory: {}", log_dir.display()))?;
    log::init(&settings.log_level, Some(log_dir.as_path()))
        .context("Failed to initialise logging.")?;
    info!("Loaded study from {}", study_dir.display());

    Ok((settings, config))
}

impl OutputArgs {
    /// Options for the pipeline, taking the program settings into account
    fn options(&self, settings: &Settings) -> OutputOptions {
        OutputOptions {
            overwrite: self.overwrite || settings.overwrite,
            raw: self.raw,
        }
    }
}

/// Handle the `postprocess` command.
pub fn handle_postprocess_command(
    study_dir: &Path,
    scenario: Option<&str>,
    opts: &OutputArgs,
    settings: Option<Settings>,
) -> Result<()> {
    let (settings, config) = start_study(study_dir, settings)?;
    let opts = opts.options(&settings);

    if let Some(scenario) = scenario {
        let scenario = ScenarioID::new(scenario);
        ensure!(
            config.scenarios.contains(&scenario),
            "Scenario {scenario} is not part of the study"
        );
        postprocess_scenario(study_dir, &config, &scenario, opts)?;
    } else {
        postprocess_scenarios(study_dir, &config, opts)?;
    }
    info!("Postprocessing complete!");

    Ok(())
}

/// Handle the `combine` command.
pub fn handle_combine_command(
    study_dir: &Path,
    overwrite: bool,
    settings: Option<Settings>,
) -> Result<()> {
    let (settings, config) = start_study(study_dir, settings)?;
    combine_scenarios(study_dir, &config, overwrite || settings.overwrite)?;

    Ok(())
}

/// Handle the `tables` command.
pub fn handle_tables_command(
    study_dir: &Path,
    overwrite: bool,
    settings: Option<Settings>,
) -> Result<()> {
    let (settings, config) = start_study(study_dir, settings)?;
    write_tables(study_dir, &config, overwrite || settings.overwrite)?;

    Ok(())
}

/// Handle the `run` command.
pub fn handle_run_command(
    study_dir: &Path,
    opts: &OutputArgs,
    settings: Option<Settings>,
) -> Result<()> {
    let (settings, config) = start_study(study_dir, settings)?;
    run_study(study_dir, &config, opts.options(&settings))
}

/// Handle the `compare` command.
pub fn handle_compare_command(dir1: &Path, dir2: &Path, tolerance: f64) -> Result<()> {
    let errors = compare_csv_dirs(dir1, dir2, tolerance)?;
    if !errors.is_empty() {
        bail!(
            "{} and {} differ:\n  * {}",
            dir1.display(),
            dir2.display(),
            errors.join("\n  * ")
        );
    }

    println!("No differences found");
    Ok(())
}
