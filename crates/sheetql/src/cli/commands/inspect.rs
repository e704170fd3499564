use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::config::{AppConfig, resolve_input_path};
use crate::identifier::{IdentifierScope, IdentifierSet, normalize_identifier};
use crate::materialize::{ColumnPlan, infer_column_type, plan_sheet};
use crate::workbook::{Sheet, Workbook, open_workbook};

#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    #[arg(value_name = "WORKBOOK")]
    pub workbook: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub workbook_path: String,
    pub sheets: Vec<InspectSheet>,
    pub issues: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectSheet {
    pub raw_name: String,
    pub table_name: Option<String>,
    pub columns: Vec<ColumnPlan>,
    pub row_count: usize,
    pub issues: Vec<String>,
}

/// Plans every sheet without touching the store; problems become issues
/// instead of stopping the inspection.
#[must_use]
pub fn inspect_workbook(workbook: &Workbook) -> InspectReport {
    let mut tables = IdentifierSet::new(IdentifierScope::Table);
    let sheets = workbook
        .sheets
        .iter()
        .map(|sheet| match plan_sheet(sheet, &mut tables) {
            Ok(Some(plan)) => InspectSheet {
                raw_name: sheet.name.clone(),
                table_name: Some(plan.table_name),
                columns: plan.columns,
                row_count: plan.row_count,
                issues: Vec::new(),
            },
            Ok(None) => InspectSheet {
                raw_name: sheet.name.clone(),
                table_name: None,
                columns: Vec::new(),
                row_count: 0,
                issues: vec!["no header row; sheet would be skipped".to_string()],
            },
            Err(error) => InspectSheet {
                raw_name: sheet.name.clone(),
                table_name: None,
                columns: unchecked_columns(sheet),
                row_count: sheet.row_count(),
                issues: vec![error.to_string()],
            },
        })
        .collect::<Vec<_>>();

    InspectReport {
        workbook_path: workbook.path.display().to_string(),
        issues: sheets.iter().map(|sheet| sheet.issues.len()).sum(),
        sheets,
    }
}

#[must_use]
pub fn render_text_report(report: &InspectReport) -> String {
    let mut lines = vec![
        format!("workbook_path: {}", report.workbook_path),
        format!("sheets: {}", report.sheets.len()),
    ];

    for sheet in &report.sheets {
        lines.push(format!(
            "sheet {:?} -> {} (rows={})",
            sheet.raw_name,
            sheet.table_name.as_deref().unwrap_or("<none>"),
            sheet.row_count
        ));
        lines.extend(sheet.columns.iter().map(|column| {
            format!(
                "  {:?} -> {} {}",
                column.raw_name,
                column.name,
                column.column_type.sql_type()
            )
        }));
        lines.extend(sheet.issues.iter().map(|issue| format!("  issue: {issue}")));
    }

    lines.push(format!("issues: {}", report.issues));
    lines.join("\n")
}

pub fn render_json_report(report: &InspectReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to encode inspect report as JSON")
}

pub fn run(args: &InspectArgs, config: &AppConfig) -> Result<()> {
    let path = resolve_input_path(&args.workbook, &config.paths)?;
    let report = inspect_path(&path)?;
    if args.json {
        println!("{}", render_json_report(&report)?);
    } else {
        println!("{}", render_text_report(&report));
    }
    Ok(())
}

fn inspect_path(path: &Path) -> Result<InspectReport> {
    let workbook = open_workbook(path)
        .with_context(|| format!("failed to read workbook for inspection: {}", path.display()))?;
    Ok(inspect_workbook(&workbook))
}

/// Column plan without collision checks, shown next to a sheet's issue.
fn unchecked_columns(sheet: &Sheet) -> Vec<ColumnPlan> {
    sheet
        .columns
        .iter()
        .enumerate()
        .map(|(index, raw_name)| ColumnPlan {
            raw_name: raw_name.clone(),
            name: normalize_identifier(raw_name),
            column_type: infer_column_type(sheet.column_values(index)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{inspect_workbook, render_text_report};
    use crate::workbook::{CellValue, Sheet, Workbook};
    use std::path::PathBuf;

    fn workbook() -> Workbook {
        Workbook {
            path: PathBuf::from("/data/hardware.xlsx"),
            sheets: vec![
                Sheet::new(
                    "Camp East",
                    vec!["Name".to_string(), "Address".to_string()],
                    vec![vec![
                        CellValue::Text("Door 109".to_string()),
                        CellValue::Text("http://10.101.112.109/".to_string()),
                    ]],
                ),
                Sheet::new(
                    "Cameras",
                    vec!["IP Address".to_string(), "ip-address".to_string()],
                    vec![vec![CellValue::Number(1.0), CellValue::Number(2.0)]],
                ),
            ],
        }
    }

    #[test]
    fn collisions_are_reported_per_sheet() {
        let report = inspect_workbook(&workbook());

        assert_eq!(report.issues, 1);
        assert_eq!(report.sheets[0].table_name.as_deref(), Some("camp_east"));
        assert!(report.sheets[0].issues.is_empty());
        assert_eq!(report.sheets[1].table_name, None);
        assert_eq!(report.sheets[1].columns[1].name, "ip_address");
        assert!(report.sheets[1].issues[0].contains("ip_address"));
    }

    #[test]
    fn text_report_lists_column_plans() {
        insta::assert_snapshot!(render_text_report(&inspect_workbook(&workbook())), @r#"
        workbook_path: /data/hardware.xlsx
        sheets: 2
        sheet "Camp East" -> camp_east (rows=1)
          "Name" -> name TEXT
          "Address" -> address TEXT
        sheet "Cameras" -> <none> (rows=1)
          "IP Address" -> ip_address INTEGER
          "ip-address" -> ip_address INTEGER
          issue: column names `IP Address` and `ip-address` both normalize to `ip_address`
        issues: 1
        "#);
    }
}
