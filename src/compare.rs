//! Comparison of folders of CSV output, e.g. against a set of reference results.
use anyhow::{Context, Result};
use float_cmp::approx_eq;
use itertools::{EitherOrBoth, Itertools};
use std::fs;
use std::path::{Path, PathBuf};

/// Default tolerance used when comparing numeric fields
pub const FLOAT_CMP_TOLERANCE: f64 = 1e-10;

/// Compare the CSV files found under two folders.
///
/// Files are matched up by their path relative to each folder. Numeric fields are compared with
/// an absolute tolerance, all other fields must match exactly.
///
/// # Returns
///
/// A description of each difference found. An empty vector means the folders are equivalent.
pub fn compare_csv_dirs(dir1: &Path, dir2: &Path, tolerance: f64) -> Result<Vec<String>> {
    let files1 = get_csv_file_paths(dir1)?;
    let files2 = get_csv_file_paths(dir2)?;

    let mut errors = Vec::new();
    for pair in files1.iter().merge_join_by(&files2, |a, b| a.cmp(b)) {
        match pair {
            EitherOrBoth::Both(file_path, _) => {
                compare_files(dir1, dir2, file_path, tolerance, &mut errors)?;
            }
            EitherOrBoth::Left(file_path) => {
                errors.push(format!("{}: Only in {}", file_path.display(), dir1.display()));
            }
            EitherOrBoth::Right(file_path) => {
                errors.push(format!("{}: Only in {}", file_path.display(), dir2.display()));
            }
        }
    }

    Ok(errors)
}

fn compare_files(
    dir1: &Path,
    dir2: &Path,
    file_path: &Path,
    tolerance: f64,
    errors: &mut Vec<String>,
) -> Result<()> {
    let rows1 = read_rows(&dir1.join(file_path))?;
    let rows2 = read_rows(&dir2.join(file_path))?;
    let name = file_path.display();

    if rows1.len() != rows2.len() {
        errors.push(format!(
            "{name}: Different number of lines: {} vs {}",
            rows1.len(),
            rows2.len()
        ));
    }

    for (num, (row1, row2)) in rows1.iter().zip(&rows2).enumerate() {
        if row1.len() != row2.len() {
            errors.push(format!(
                "{name}: line {num}: Different number of fields: {} vs {}",
                row1.len(),
                row2.len()
            ));
            continue;
        }

        let equal = row1.iter().zip(row2).all(|(f1, f2)| {
            // Numbers are compared as numbers, everything else as strings
            try_compare_floats(f1, f2, tolerance).unwrap_or_else(|| f1 == f2)
        });
        if !equal {
            errors.push(format!(
                "{name}: line {num}:\n    + \"{}\"\n    - \"{}\"",
                row1.join(","),
                row2.join(",")
            ));
        }
    }

    Ok(())
}

/// Parse a string into an `f64`, returning `None` if parsing fails or value is infinite/NaN
fn parse_finite(s: &str) -> Option<f64> {
    s.parse().ok().filter(|f: &f64| f.is_finite())
}

fn try_compare_floats(s1: &str, s2: &str, tolerance: f64) -> Option<bool> {
    let float1 = parse_finite(s1)?;
    let float2 = parse_finite(s2)?;

    Some(approx_eq!(f64, float1, float2, epsilon = tolerance))
}

/// Read every line of a CSV file, including the header
fn read_rows(file_path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(file_path)
        .with_context(|| format!("Could not open {}", file_path.display()))?;

    reader
        .records()
        .map_ok(|record| record.iter().map(String::from).collect())
        .try_collect()
        .with_context(|| format!("Could not read {}", file_path.display()))
}

/// Get the paths of all CSV files under `dir_path`, relative to it and sorted
fn get_csv_file_paths(dir_path: &Path) -> Result<Vec<PathBuf>> {
    let mut file_paths = Vec::new();
    collect_csv_file_paths(dir_path, Path::new(""), &mut file_paths)?;
    file_paths.sort();

    Ok(file_paths)
}

fn collect_csv_file_paths(root: &Path, relative: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let dir_path = root.join(relative);
    let entries = fs::read_dir(&dir_path)
        .with_context(|| format!("Could not read directory {}", dir_path.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = relative.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            collect_csv_file_paths(root, &path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "csv") {
            out.push(path);
        }
    }

    Ok(())
}
