use anyhow::Result;
use serde_json::Value;
use std::fmt::Write as FmtWrite;

use crate::domain::{
    diff_entry::{ChangeKind, ReportEntry},
    ports::OutputWriter,
};

/// One line per entry, e.g. `~ Users.0.name: "x" -> "y"`.
pub struct TextWriter;

fn marker(kind: ChangeKind) -> char {
    match kind {
        ChangeKind::Edit => '~',
        ChangeKind::Add => '+',
        ChangeKind::Delete => '-',
    }
}

fn show(v: Option<&Value>) -> String {
    v.map_or_else(|| "<none>".to_string(), Value::to_string)
}

impl OutputWriter for TextWriter {
    fn format(&self, entries: &[ReportEntry]) -> Result<String> {
        let mut s = String::new();
        for entry in entries {
            let kind = entry.change_kind();
            let (old, new) = entry.values();
            match kind {
                ChangeKind::Edit => writeln!(
                    s,
                    "{} {}: {} -> {}",
                    marker(kind),
                    entry.path(),
                    show(old),
                    show(new)
                )?,
                ChangeKind::Add => writeln!(s, "{} {}: {}", marker(kind), entry.path(), show(new))?,
                ChangeKind::Delete => {
                    writeln!(s, "{} {}: {}", marker(kind), entry.path(), show(old))?
                }
            }
        }
        Ok(s.trim_end().to_string())
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::diff_entry::NormalizedDiffEntry;
    use serde_json::json;

    fn entry(kind: ChangeKind, path: &str, old: Option<Value>, new: Option<Value>) -> ReportEntry {
        ReportEntry::Summary(NormalizedDiffEntry {
            kind,
            path: path.into(),
            old,
            new,
        })
    }

    #[test]
    fn one_line_per_entry() {
        let entries = vec![
            entry(ChangeKind::Edit, "T.0.name", Some(json!("x")), Some(json!("y"))),
            entry(ChangeKind::Add, "T.1", None, Some(json!({"id": 2}))),
            entry(ChangeKind::Delete, "U.0", Some(json!(null)), None),
        ];
        let out = TextWriter.format(&entries).unwrap();
        assert_eq!(
            out,
            "~ T.0.name: \"x\" -> \"y\"\n+ T.1: {\"id\":2}\n- U.0: null"
        );
    }

    #[test]
    fn empty_report_is_empty_text() {
        assert_eq!(TextWriter.format(&[]).unwrap(), "");
    }
}
