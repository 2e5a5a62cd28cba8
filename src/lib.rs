//! Postprocessing of solved energy system models for a district heating flexibility study.
//!
//! Results of each scenario are extracted and normalised to a common set of scalars, which are
//! then combined across scenarios and summarised in report tables.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod combine;
pub mod compare;
pub mod energy_system;
pub mod extract;
pub mod id;
pub mod indicators;
pub mod input;
pub mod log;
pub mod normalise;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod scalar;
pub mod sequence;
pub mod settings;
pub mod study;

#[cfg(test)]
mod fixture;

/// Get the directory where program configuration files live
pub fn get_heatflex_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir on this platform, so fall back to the current directory
        return PathBuf::default();
    };
    config_dir.push("heatflex");

    config_dir
}
