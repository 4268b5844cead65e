//! Report rendering

use chrono::Utc;
use clap::ValueEnum;
use naas_core::ReconcileReport;
use serde_json::{json, Value};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render `report` for the command line
///
/// JSON output wraps the report in an envelope carrying the command, whether
/// it ran in check mode and a UTC timestamp.
pub fn render(
    report: &ReconcileReport,
    format: OutputFormat,
    command: &str,
    check: bool,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => {
            let mode = if check { " (check mode)" } else { "" };
            Ok(format!("{}{}\n{}", command, mode, report.render_text()))
        }
        OutputFormat::Json => {
            let envelope = json!({
                "command": command,
                "check": check,
                "timestamp": Utc::now().to_rfc3339(),
                "result": report,
            });
            serde_json::to_string_pretty(&envelope)
        }
    }
}

/// Read-only query result: rows for text output, `data` for JSON
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTable {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
    pub data: Value,
}

impl QueryTable {
    /// Columns padded to their widest cell
    pub fn render_text(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let line = |cells: Vec<&str>| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}:", self.title);
        if self.rows.is_empty() {
            out.push_str("No entries found.\n");
            return out;
        }
        let _ = writeln!(out, "{}", line(self.headers.clone()));
        let total = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        let _ = writeln!(out, "{}", "-".repeat(total));
        for row in &self.rows {
            let _ = writeln!(out, "{}", line(row.iter().map(String::as_str).collect()));
        }
        out
    }
}

/// Render a query result; JSON uses the same envelope as reports
pub fn render_table(table: &QueryTable, format: OutputFormat, command: &str) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("{}\n{}", command, table.render_text())),
        OutputFormat::Json => {
            let envelope = json!({
                "command": command,
                "check": false,
                "timestamp": Utc::now().to_rfc3339(),
                "result": table.data,
            });
            serde_json::to_string_pretty(&envelope)
        }
    }
}
