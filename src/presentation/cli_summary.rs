//! Coloured summary tables for the command line.
//!
//! Everything here goes to stderr: stdout is reserved for the rendered diff
//! so it can be piped.

use crate::application::monitoring::PerfReport;
use crate::domain::diff_entry::{ChangeKind, ReportEntry};
use colored::*;
use std::collections::BTreeMap;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct TableRow {
    table: String,
    edits: String,
    adds: String,
    deletes: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeCounts {
    pub edits: usize,
    pub adds: usize,
    pub deletes: usize,
}

/// Count report entries per table (the first path segment).
pub fn count_by_table(entries: &[ReportEntry]) -> BTreeMap<String, ChangeCounts> {
    let mut counts: BTreeMap<String, ChangeCounts> = BTreeMap::new();
    for entry in entries {
        let table = entry.path().split('.').next().unwrap_or_default();
        let c = counts.entry(table.to_string()).or_default();
        match entry.change_kind() {
            ChangeKind::Edit => c.edits += 1,
            ChangeKind::Add => c.adds += 1,
            ChangeKind::Delete => c.deletes += 1,
        }
    }
    counts
}

pub fn print_change_summary(entries: &[ReportEntry]) {
    if entries.is_empty() {
        return;
    }

    eprintln!();
    eprintln!("{}", "CHANGES BY TABLE".bold().cyan());

    let rows: Vec<TableRow> = count_by_table(entries)
        .into_iter()
        .map(|(table, c)| TableRow {
            table: table.bold().to_string(),
            edits: c.edits.to_string().yellow().to_string(),
            adds: c.adds.to_string().green().to_string(),
            deletes: c.deletes.to_string().red().to_string(),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=3)).with(Alignment::right()))
        .to_string();
    eprintln!("{table}");
    eprintln!();
}

// ─── Performance summary ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct PerfRow {
    operation: String,
    table: String,
    #[tabled(rename = "rows")]
    rows: String,
    #[tabled(rename = "time (ms)")]
    duration_ms: String,
}

/// Print a performance timing table to stderr.
pub fn print_perf_summary(report: &PerfReport) {
    if report.timings.is_empty() {
        return;
    }

    eprintln!("{}", "PERFORMANCE".bold().cyan());

    let rows: Vec<PerfRow> = report
        .timings
        .iter()
        .map(|t| PerfRow {
            operation: t.operation.dimmed().to_string(),
            table: t.table.bold().to_string(),
            rows: t.rows.to_string(),
            duration_ms: format_duration(t.duration_ms),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..=3)).with(Alignment::right()))
        .to_string();

    eprintln!("{table}");

    eprintln!(
        "  Total: {} row(s) fetched  ·  {} ms elapsed",
        report.total_rows_fetched().to_string().bold(),
        format_duration(report.total_ms()),
    );
    eprintln!();
}

fn format_duration(ms: u128) -> String {
    if ms >= 1_000 {
        format!("{:.1}s", ms as f64 / 1_000.0).yellow().to_string()
    } else if ms >= 100 {
        ms.to_string().yellow().to_string()
    } else {
        ms.to_string().green().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::diff_entry::NormalizedDiffEntry;

    fn entry(kind: ChangeKind, path: &str) -> ReportEntry {
        ReportEntry::Summary(NormalizedDiffEntry {
            kind,
            path: path.into(),
            old: None,
            new: None,
        })
    }

    #[test]
    fn counts_group_by_first_segment() {
        let entries = vec![
            entry(ChangeKind::Edit, "Users.0.name"),
            entry(ChangeKind::Edit, "Users.1.name"),
            entry(ChangeKind::Add, "Users.2"),
            entry(ChangeKind::Delete, "Orders.0"),
        ];
        let counts = count_by_table(&entries);
        assert_eq!(
            counts["Users"],
            ChangeCounts {
                edits: 2,
                adds: 1,
                deletes: 0
            }
        );
        assert_eq!(counts["Orders"].deletes, 1);
        assert_eq!(counts.len(), 2);
    }
}
