//! The module responsible for writing output data to disk.
use crate::combine::CombinedTable;
use crate::energy_system::NodeID;
use crate::report::ReportTable;
use crate::scalar::ScenarioTable;
use crate::sequence::{SequenceTable, TIMESTAMP_FORMAT};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// The output file name for scalars
pub const SCALARS_FILE_NAME: &str = "scalars.csv";

/// The sub-folder for time series
pub const SEQUENCES_DIR_NAME: &str = "sequences";

/// The output file name for storage filling levels, within [`SEQUENCES_DIR_NAME`]
pub const FILLING_LEVELS_FILE_NAME: &str = "filling_levels.csv";

/// The output file name for flows into and out of links
pub const LINKS_FILE_NAME: &str = "links.csv";

/// The name of the first column of sequence files
const TIMESTAMP_COLUMN: &str = "timestamp";

/// The name of the first column of report files
const SCENARIO_COLUMN: &str = "scenario";

/// The columns of a scalars file
const SCALAR_COLUMNS: [&str; 6] = ["name", "type", "carrier", "tech", "var_name", "var_value"];

/// Create a new output directory.
///
/// If the directory already exists and isn't empty, it is only replaced if `allow_overwrite` is
/// set.
///
/// # Returns
///
/// Whether an existing directory was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder {} already exists and is not empty. Please delete the folder or pass \
             the --overwrite command-line option.",
            output_dir.display()
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Write the scalars of a single scenario
pub fn write_scenario_table(file_path: &Path, table: &ScenarioTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;

    // The header is only written along with the first record
    if table.is_empty() {
        writer.write_record(SCALAR_COLUMNS)?;
    }
    for record in table.records() {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the scalars of several scenarios
pub fn write_combined_table(file_path: &Path, table: &CombinedTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    if table.is_empty() {
        writer.write_record(std::iter::once(SCENARIO_COLUMN).chain(SCALAR_COLUMNS))?;
    }
    for record in table.records() {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write a time series table with a leading timestamp column
pub fn write_sequence_table(file_path: &Path, table: &SequenceTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    writer.write_record(std::iter::once(TIMESTAMP_COLUMN).chain(table.column_names()))?;
    for (timestamp, values) in table.rows() {
        let timestamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        writer.write_record(
            std::iter::once(timestamp).chain(values.iter().map(ToString::to_string)),
        )?;
    }
    writer.flush()?;

    Ok(())
}

/// Write a report with a leading scenario column
pub fn write_report(file_path: &Path, report: &ReportTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    writer.write_record(std::iter::once(SCENARIO_COLUMN).chain(report.headers()))?;
    for (scenario, values) in report.rows() {
        writer.write_record(
            std::iter::once(scenario.to_string()).chain(values.iter().map(ToString::to_string)),
        )?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes the outputs of postprocessing a single scenario
pub struct ScenarioWriter<'a> {
    output_dir: &'a Path,
}

impl<'a> ScenarioWriter<'a> {
    /// Create the sequences sub-folder of `output_dir`, which must already exist
    pub fn create(output_dir: &'a Path) -> Result<Self> {
        let sequences_dir = output_dir.join(SEQUENCES_DIR_NAME);
        fs::create_dir_all(&sequences_dir).with_context(|| {
            format!("Failed to create directory {}", sequences_dir.display())
        })?;

        Ok(Self { output_dir })
    }

    /// Write one supply table per bus, named after the bus
    pub fn write_bus_supply(&self, supply: &IndexMap<NodeID, SequenceTable>) -> Result<()> {
        for (bus, table) in supply {
            let file_path = self
                .output_dir
                .join(SEQUENCES_DIR_NAME)
                .join(format!("{bus}.csv"));
            write_sequence_table(&file_path, table)
                .with_context(|| format!("Failed to write {}", file_path.display()))?;
        }

        Ok(())
    }

    /// Write storage filling levels
    pub fn write_filling_levels(&self, levels: &SequenceTable) -> Result<()> {
        let file_path = self
            .output_dir
            .join(SEQUENCES_DIR_NAME)
            .join(FILLING_LEVELS_FILE_NAME);
        write_sequence_table(&file_path, levels)
            .with_context(|| format!("Failed to write {}", file_path.display()))
    }

    /// Write flows into and out of links
    pub fn write_links(&self, links: &SequenceTable) -> Result<()> {
        let file_path = self.output_dir.join(LINKS_FILE_NAME);
        write_sequence_table(&file_path, links)
            .with_context(|| format!("Failed to write {}", file_path.display()))
    }

    /// Write the normalised scalars
    pub fn write_scalars(&self, table: &ScenarioTable) -> Result<()> {
        let file_path = self.output_dir.join(SCALARS_FILE_NAME);
        write_scenario_table(&file_path, table)
            .with_context(|| format!("Failed to write {}", file_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::{CombinedRecord, ScenarioID, combine_scalars};
    use crate::fixture::{scalar_key, scenario_table, timeindex};
    use crate::input::{read_combined_table, read_scenario_table};
    use crate::report::{ReportColumn, ReportSpec, build_report};
    use crate::scalar::{ScalarKey, ScalarRecord};
    use chrono::NaiveDateTime;
    use itertools::{Itertools, assert_equal};
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn read_lines(file_path: &Path) -> Vec<String> {
        fs::read_to_string(file_path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_create_output_directory_new_directory() {
        let temp_dir = tempdir().unwrap();
        let output_dir = temp_dir.path().join("postprocessed").join("SQ");

        // Create a new directory should succeed and return false (no overwrite)
        let result = create_output_directory(&output_dir, false).unwrap();
        assert!(!result);
        assert!(output_dir.is_dir());
    }

    #[test]
    fn test_create_output_directory_existing_empty_directory() {
        let temp_dir = tempdir().unwrap();
        let output_dir: PathBuf = temp_dir.path().join("output");

        fs::create_dir(&output_dir).unwrap();
        let result = create_output_directory(&output_dir, false).unwrap();
        assert!(!result);
        assert!(output_dir.is_dir());
    }

    #[test]
    fn test_create_output_directory_existing_with_files() {
        let temp_dir = tempdir().unwrap();
        let output_dir = temp_dir.path().join("output");

        fs::create_dir(&output_dir).unwrap();
        File::create(output_dir.join(SCALARS_FILE_NAME)).unwrap();

        // Without overwrite this is an error
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(output_dir.join(SCALARS_FILE_NAME).exists());

        // With overwrite the old contents are removed
        let result = create_output_directory(&output_dir, true).unwrap();
        assert!(result);
        assert!(output_dir.is_dir());
        assert!(!output_dir.join(SCALARS_FILE_NAME).exists());
    }

    #[rstest]
    fn test_write_scenario_table(scenario_table: ScenarioTable) {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SCALARS_FILE_NAME);
        write_scenario_table(&file_path, &scenario_table).unwrap();

        // Read back and compare
        let records: Vec<ScalarRecord> = csv::Reader::from_path(&file_path)
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap();
        assert_equal(records, scenario_table.records());

        // Missing attributes are written as empty fields
        let lines = read_lines(&file_path);
        assert_eq!(lines[0], "name,type,carrier,tech,var_name,var_value");
        assert!(lines.contains(&"import,,,,yearly_heat,-3.0".to_string()));
    }

    #[rstest]
    fn test_write_combined_table(scenario_table: ScenarioTable) {
        let combined = combine_scalars([("SQ".into(), scenario_table)], &[]).unwrap();
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SCALARS_FILE_NAME);
        write_combined_table(&file_path, &combined).unwrap();

        let records: Vec<CombinedRecord> = csv::Reader::from_path(&file_path)
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap();
        assert_equal(records, combined.records());
        assert_eq!(
            read_lines(&file_path)[0],
            "scenario,name,type,carrier,tech,var_name,var_value"
        );
    }

    #[test]
    fn test_write_empty_tables() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("scenario.csv");
        write_scenario_table(&file_path, &ScenarioTable::new()).unwrap();
        assert!(read_scenario_table(&file_path).unwrap().is_empty());

        let combined = combine_scalars(Vec::<(ScenarioID, ScenarioTable)>::new(), &[]).unwrap();
        let file_path = dir.path().join("combined.csv");
        write_combined_table(&file_path, &combined).unwrap();
        assert_eq!(
            read_lines(&file_path),
            ["scenario,name,type,carrier,tech,var_name,var_value"]
        );
        assert!(read_combined_table(&file_path).unwrap().is_empty());
    }

    #[rstest]
    fn test_write_sequence_table(timeindex: Vec<NaiveDateTime>) {
        let mut table = SequenceTable::new(timeindex);
        table.insert_column("gas-chp", vec![1.0, 2.5, 3.0]).unwrap();
        table.insert_column("import", vec![-1.0, 0.0, 0.0]).unwrap();

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("heat_central.csv");
        write_sequence_table(&file_path, &table).unwrap();

        assert_eq!(
            read_lines(&file_path),
            [
                "timestamp,gas-chp,import",
                "2017-01-01 00:00:00,1,-1",
                "2017-01-01 01:00:00,2.5,0",
                "2017-01-01 02:00:00,3,0",
            ]
        );
    }

    #[test]
    fn test_write_report() {
        let table = ScenarioTable::from_records_summed([(
            ScalarKey::unattributed("total", "share_el_heat"),
            0.4567,
        )]);
        let combined = combine_scalars([("SQ".into(), table)], &[]).unwrap();
        let spec = ReportSpec {
            file_name: "share_el_heat.csv".into(),
            scenarios: vec![ScenarioID::new("SQ")],
            columns: vec![
                ReportColumn::new("share_el_heat", 2),
                ReportColumn {
                    scale: Some(100.0),
                    integer: true,
                    header: Some("percent".into()),
                    ..ReportColumn::new("share_el_heat", 2)
                },
            ],
            ..Default::default()
        };
        let report = build_report(&combined, &spec).unwrap();

        let dir = tempdir().unwrap();
        let file_path = dir.path().join(&spec.file_name);
        write_report(&file_path, &report).unwrap();
        assert_eq!(
            read_lines(&file_path),
            ["scenario,share_el_heat,percent", "SQ,0.46,46"]
        );
    }

    #[rstest]
    fn test_scenario_writer(timeindex: Vec<NaiveDateTime>) {
        let dir = tempdir().unwrap();
        let writer = ScenarioWriter::create(dir.path()).unwrap();

        let mut supply = IndexMap::new();
        supply.insert(NodeID::new("heat_central"), SequenceTable::new(timeindex.clone()));
        writer.write_bus_supply(&supply).unwrap();
        writer
            .write_filling_levels(&SequenceTable::new(timeindex))
            .unwrap();
        writer
            .write_scalars(&ScenarioTable::from_records_summed([(
                scalar_key("gas-chp", "extraction", "gas", "chp", "capacity"),
                1.0,
            )]))
            .unwrap();

        let sequences = dir.path().join(SEQUENCES_DIR_NAME);
        assert!(sequences.join("heat_central.csv").is_file());
        assert!(sequences.join(FILLING_LEVELS_FILE_NAME).is_file());
        assert!(dir.path().join(SCALARS_FILE_NAME).is_file());
        assert!(!dir.path().join(LINKS_FILE_NAME).exists());

        // Writing again replaces the files
        {
            let mut file = File::create(dir.path().join(SCALARS_FILE_NAME)).unwrap();
            writeln!(file, "junk").unwrap();
        }
        writer.write_scalars(&ScenarioTable::new()).unwrap();
        assert_eq!(
            read_lines(&dir.path().join(SCALARS_FILE_NAME)),
            ["name,type,carrier,tech,var_name,var_value"]
        );
    }
}
