use anyhow::Result;

use crate::domain::{diff_entry::ReportEntry, ports::OutputWriter};

/// Pretty-printed JSON array of report entries.
pub struct JsonWriter;

impl OutputWriter for JsonWriter {
    fn format(&self, entries: &[ReportEntry]) -> Result<String> {
        Ok(serde_json::to_string_pretty(entries)?)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
