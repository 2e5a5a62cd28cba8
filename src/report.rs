//! Small presentation tables built from the combined scalars.
//!
//! A report has one row per scenario, in the order requested, and one column per quantity. Values
//! are rounded to the requested number of decimals before any rescaling, so e.g. a share of
//! 0.4567 shown as a whole percentage is rounded to 0.46 and then shown as 46.
use crate::combine::{CombinedTable, ScenarioID};
use anyhow::{Result, bail, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;

/// Decimals kept for rescaled values, to drop float noise from the multiplication
const SCALED_DECIMALS: i32 = 10;

fn default_decimals() -> i32 {
    2
}

/// A single column of a report
#[derive(PartialEq, Debug, Deserialize, Clone)]
pub struct ReportColumn {
    /// The quantity to show
    pub var_name: String,
    /// Number of decimals to round to
    #[serde(default = "default_decimals")]
    pub decimals: i32,
    /// Factor applied after rounding (e.g. 100 to show a share as a percentage)
    pub scale: Option<f64>,
    /// Whether to show values as integers
    #[serde(default)]
    pub integer: bool,
    /// Column header, defaulting to `var_name`
    pub header: Option<String>,
}

impl ReportColumn {
    /// A column showing `var_name` rounded to `decimals` and nothing else
    pub fn new(var_name: &str, decimals: i32) -> Self {
        Self {
            var_name: var_name.to_string(),
            decimals,
            scale: None,
            integer: false,
            header: None,
        }
    }

    /// The column header
    pub fn header(&self) -> &str {
        self.header.as_deref().unwrap_or(&self.var_name)
    }

    /// Turn an already rounded value into what is shown in the report
    #[allow(clippy::cast_possible_truncation)]
    fn present(&self, rounded: f64) -> ReportValue {
        let scaled = rounded * self.scale.unwrap_or(1.0);
        if self.integer {
            ReportValue::Integer(scaled.round() as i64)
        } else {
            ReportValue::Float(round_to(scaled, SCALED_DECIMALS))
        }
    }
}

/// A report to generate
#[derive(PartialEq, Debug, Deserialize, Clone, Default)]
pub struct ReportSpec {
    /// Name of the file to write
    pub file_name: String,
    /// The scenarios to include, in the order they should appear
    pub scenarios: Vec<ScenarioID>,
    /// The columns of the report
    pub columns: Vec<ReportColumn>,
    /// Only include components with these technologies
    #[serde(default)]
    pub techs: Vec<String>,
    /// Factor applied to every value before rounding (e.g. 0.001 to convert MWh to GWh)
    pub unit_factor: Option<f64>,
    /// Sum each quantity over components and add the total cost of each scenario
    #[serde(default)]
    pub totals: bool,
    /// Merge carrier and marginal costs into `var_om`
    #[serde(default)]
    pub group_var_om: bool,
}

impl ReportSpec {
    /// The scalars the columns of the report are taken from
    pub fn view(&self, combined: &CombinedTable) -> CombinedTable {
        let mut view = combined.select_scenarios(&self.scenarios);
        if !self.techs.is_empty() {
            view = view.select_techs(&self.techs);
        }
        if let Some(factor) = self.unit_factor {
            view = view.scale(factor);
        }
        if self.totals {
            view = view.totals();
        }
        if self.group_var_om {
            view = view.group_var_om();
        }

        view
    }
}

/// A value shown in a report
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ReportValue {
    /// A rounded decimal number
    Float(f64),
    /// A whole number
    Integer(i64),
}

impl fmt::Display for ReportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
        }
    }
}

/// A table with one row per scenario
#[derive(PartialEq, Debug)]
pub struct ReportTable {
    scenarios: Vec<ScenarioID>,
    columns: IndexMap<String, Vec<ReportValue>>,
}

impl ReportTable {
    /// The scenarios, in row order
    pub fn scenarios(&self) -> &[ScenarioID] {
        &self.scenarios
    }

    /// The column headers
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Get a column by header
    pub fn column(&self, header: &str) -> Option<&[ReportValue]> {
        self.columns.get(header).map(Vec::as_slice)
    }

    /// Iterate over rows as a scenario followed by one value per column
    pub fn rows(&self) -> impl Iterator<Item = (&ScenarioID, Vec<ReportValue>)> {
        self.scenarios
            .iter()
            .enumerate()
            .map(|(i, scenario)| (scenario, self.columns.values().map(|c| c[i]).collect()))
    }
}

/// Round half away from zero to the given number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Get the value of `var_name` for every scenario in `scenarios`, rounded to `decimals`.
///
/// Every scenario must be present in `combined` and have exactly one value for `var_name`.
pub fn filter_and_round(
    combined: &CombinedTable,
    var_name: &str,
    scenarios: &[ScenarioID],
    decimals: i32,
) -> Result<Vec<f64>> {
    let present = combined.scenarios();
    let mut by_scenario: IndexMap<&ScenarioID, Vec<f64>> = IndexMap::new();
    for (key, value) in combined.iter() {
        if key.key.var_name == var_name {
            by_scenario.entry(&key.scenario).or_default().push(value);
        }
    }

    scenarios
        .iter()
        .map(|scenario| {
            ensure!(
                present.contains(scenario),
                "Scenario {scenario} not found in combined results"
            );
            match by_scenario.get(scenario).map(Vec::as_slice) {
                Some([value]) => Ok(round_to(*value, decimals)),
                Some(values) if values.len() > 1 => {
                    bail!("Multiple values for {var_name} in scenario {scenario}")
                }
                _ => bail!("No value for {var_name} in scenario {scenario}"),
            }
        })
        .collect()
}

/// Build a report from the combined scalars.
///
/// The combined scalars are first narrowed down as set out in [`ReportSpec::view`]. Each column
/// is then filtered and rounded on its own, then rescaled and, for integer columns, rounded to a
/// whole number.
pub fn build_report(combined: &CombinedTable, spec: &ReportSpec) -> Result<ReportTable> {
    ensure!(
        !spec.scenarios.is_empty(),
        "Report {} has no scenarios",
        spec.file_name
    );
    ensure!(
        !spec.columns.is_empty(),
        "Report {} has no columns",
        spec.file_name
    );

    let view = spec.view(combined);
    let mut columns = IndexMap::new();
    for column in &spec.columns {
        let values = filter_and_round(&view, &column.var_name, &spec.scenarios, column.decimals)?;
        let values = values.into_iter().map(|value| column.present(value)).collect();
        ensure!(
            columns.insert(column.header().to_string(), values).is_none(),
            "Duplicate column {} in report {}",
            column.header(),
            spec.file_name
        );
    }

    Ok(ReportTable {
        scenarios: spec.scenarios.clone(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::combine_scalars;
    use crate::combine::{TOTAL_COST, VAR_OM};
    use crate::fixture::{assert_error, scenario_table};
    use crate::scalar::{ScalarKey, ScenarioTable};
    use rstest::{fixture, rstest};

    fn share_table(values: &[(&str, f64)]) -> CombinedTable {
        let tables = values.iter().map(|(scenario, value)| {
            let table = ScenarioTable::from_records_summed([(
                ScalarKey::unattributed("total", "share_el_heat"),
                *value,
            )]);
            (ScenarioID::new(scenario), table)
        });
        combine_scalars(tables, &[]).unwrap()
    }

    #[fixture]
    fn combined() -> CombinedTable {
        share_table(&[("SQ", 0.4567), ("FF", 0.005), ("FF-80", 0.123)])
    }

    fn scenarios(names: &[&str]) -> Vec<ScenarioID> {
        names.iter().map(|name| ScenarioID::new(name)).collect()
    }

    fn percent_column(decimals: i32) -> ReportColumn {
        ReportColumn {
            scale: Some(100.0),
            integer: true,
            header: Some("share_el_heat_percent".into()),
            ..ReportColumn::new("share_el_heat", decimals)
        }
    }

    #[rstest]
    #[case(0.4567, 2, 0.46)]
    #[case(0.005, 2, 0.01)]
    #[case(-0.125, 2, -0.13)]
    #[case(1234.5, 0, 1235.0)]
    fn test_round_to(#[case] value: f64, #[case] decimals: i32, #[case] expected: f64) {
        assert_eq!(round_to(value, decimals), expected);
    }

    #[rstest]
    fn test_filter_and_round(combined: CombinedTable) {
        let values =
            filter_and_round(&combined, "share_el_heat", &scenarios(&["FF-80", "SQ"]), 2).unwrap();
        assert_eq!(values, [0.12, 0.46]);
    }

    #[rstest]
    fn test_filter_and_round_missing_scenario(combined: CombinedTable) {
        assert_error!(
            filter_and_round(&combined, "share_el_heat", &scenarios(&["SQ", "FF-20"]), 2),
            "Scenario FF-20 not found in combined results"
        );
    }

    #[rstest]
    fn test_filter_and_round_missing_value(combined: CombinedTable) {
        assert_error!(
            filter_and_round(&combined, "spec_cost_of_heat", &scenarios(&["SQ"]), 2),
            "No value for spec_cost_of_heat in scenario SQ"
        );
    }

    #[test]
    fn test_filter_and_round_multiple_values() {
        let table = ScenarioTable::from_records_summed([
            (ScalarKey::unattributed("total", "share_el_heat"), 0.1),
            (ScalarKey::unattributed("other", "share_el_heat"), 0.2),
        ]);
        let combined = combine_scalars([("SQ".into(), table)], &[]).unwrap();
        assert_error!(
            filter_and_round(&combined, "share_el_heat", &scenarios(&["SQ"]), 2),
            "Multiple values for share_el_heat in scenario SQ"
        );
    }

    #[rstest]
    fn test_build_report_rounds_before_scaling(combined: CombinedTable) {
        use ReportValue::{Float, Integer};

        let spec = ReportSpec {
            file_name: "share_el_heat.csv".into(),
            scenarios: scenarios(&["SQ", "FF"]),
            columns: vec![
                ReportColumn::new("share_el_heat", 2),
                percent_column(2),
                ReportColumn {
                    header: Some("coarse".into()),
                    ..percent_column(1)
                },
            ],
            ..Default::default()
        };
        let report = build_report(&combined, &spec).unwrap();
        assert_eq!(
            report.column("share_el_heat").unwrap(),
            [Float(0.46), Float(0.01)]
        );
        assert_eq!(
            report.column("share_el_heat_percent").unwrap(),
            [Integer(46), Integer(1)]
        );
        // Rounding to one decimal first gives 0.5, not 0.46
        assert_eq!(report.column("coarse").unwrap(), [Integer(50), Integer(0)]);
        assert_eq!(report.rows().count(), 2);
    }

    #[rstest]
    fn test_build_report_float_scaled(combined: CombinedTable) {
        let spec = ReportSpec {
            file_name: "share.csv".into(),
            scenarios: scenarios(&["FF-80"]),
            columns: vec![ReportColumn {
                scale: Some(100.0),
                ..ReportColumn::new("share_el_heat", 2)
            }],
            ..Default::default()
        };
        let report = build_report(&combined, &spec).unwrap();
        assert_eq!(
            report.column("share_el_heat").unwrap(),
            [ReportValue::Float(12.0)]
        );
    }

    #[test]
    fn test_build_report_scale_below_one() {
        let tables = [(
            ScenarioID::new("SQ"),
            ScenarioTable::from_records_summed([(
                ScalarKey::unattributed("total", "yearly_heat"),
                1234.4,
            )]),
        )];
        let combined = combine_scalars(tables, &[]).unwrap();
        let spec = ReportSpec {
            file_name: "heat.csv".into(),
            scenarios: scenarios(&["SQ"]),
            columns: vec![ReportColumn {
                scale: Some(0.001),
                ..ReportColumn::new("yearly_heat", 0)
            }],
            ..Default::default()
        };

        // MWh rounded to whole numbers, then shown as GWh
        let report = build_report(&combined, &spec).unwrap();
        assert_eq!(
            report.column("yearly_heat").unwrap(),
            [ReportValue::Float(1.234)]
        );
    }

    #[rstest]
    fn test_build_report_totals(scenario_table: ScenarioTable) {
        use ReportValue::Float;

        let combined = combine_scalars([("SQ".into(), scenario_table)], &[]).unwrap();
        let spec = ReportSpec {
            file_name: "costs.csv".into(),
            scenarios: scenarios(&["SQ"]),
            columns: vec![
                ReportColumn::new("capacity_cost", 2),
                ReportColumn::new(VAR_OM, 2),
                ReportColumn::new(TOTAL_COST, 2),
            ],
            totals: true,
            group_var_om: true,
            ..Default::default()
        };
        let report = build_report(&combined, &spec).unwrap();
        assert_eq!(report.column("capacity_cost").unwrap(), [Float(5000.0)]);
        assert_eq!(report.column(VAR_OM).unwrap(), [Float(840.0)]);
        assert_eq!(report.column(TOTAL_COST).unwrap(), [Float(5840.0)]);
    }

    #[rstest]
    fn test_build_report_single_tech(scenario_table: ScenarioTable) {
        let combined = combine_scalars([("SQ".into(), scenario_table)], &[]).unwrap();
        let spec = ReportSpec {
            file_name: "heat_pump.csv".into(),
            scenarios: scenarios(&["SQ"]),
            columns: vec![ReportColumn::new("yearly_heat", 3)],
            techs: vec!["hp".into()],
            unit_factor: Some(0.001),
            ..Default::default()
        };
        let report = build_report(&combined, &spec).unwrap();
        assert_eq!(
            report.column("yearly_heat").unwrap(),
            [ReportValue::Float(0.045)]
        );

        // Without the selection there is more than one value
        let spec = ReportSpec {
            techs: Vec::new(),
            ..spec
        };
        assert_error!(
            build_report(&combined, &spec),
            "Multiple values for yearly_heat in scenario SQ"
        );
    }

    #[rstest]
    fn test_build_report_invalid(combined: CombinedTable) {
        let mut spec = ReportSpec {
            file_name: "share.csv".into(),
            scenarios: Vec::new(),
            columns: vec![ReportColumn::new("share_el_heat", 2)],
            ..Default::default()
        };
        assert_error!(
            build_report(&combined, &spec),
            "Report share.csv has no scenarios"
        );

        spec.scenarios = scenarios(&["SQ"]);
        spec.columns.push(ReportColumn::new("share_el_heat", 1));
        assert_error!(
            build_report(&combined, &spec),
            "Duplicate column share_el_heat in report share.csv"
        );
    }

    #[test]
    fn test_report_value_display() {
        assert_eq!(ReportValue::Float(0.46).to_string(), "0.46");
        assert_eq!(ReportValue::Integer(46).to_string(), "46");
    }
}
