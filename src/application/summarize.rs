use anyhow::Result;

use crate::domain::{
    diff_entry::{ChangeKind, DiffKind, NormalizedDiffEntry, PassthroughEntry, RawDiffEntry, ReportEntry},
    errors::SnapdiffError,
    path::normalize,
};

/// Maps raw differ output into report entries.
///
/// When disabled, entries keep every original field and only get their path
/// normalised. When enabled, they are flattened into `{kind, path, old, new}`.
#[derive(Debug, Clone, Copy)]
pub struct Summarizer {
    enabled: bool,
}

impl Summarizer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn summarize(&self, entry: RawDiffEntry) -> Result<ReportEntry> {
        let path = normalize(&entry.path);

        if !self.enabled {
            return Ok(ReportEntry::Raw(PassthroughEntry {
                kind: entry.kind,
                path,
                lhs: entry.lhs,
                rhs: entry.rhs,
            }));
        }

        let summary = match (entry.kind, entry.lhs, entry.rhs) {
            (DiffKind::Edit, Some(old), Some(new)) => NormalizedDiffEntry {
                kind: ChangeKind::Edit,
                path,
                old: Some(old),
                new: Some(new),
            },
            (DiffKind::Add, None, Some(new)) => NormalizedDiffEntry {
                kind: ChangeKind::Add,
                path,
                old: None,
                new: Some(new),
            },
            (DiffKind::Delete, Some(old), None) => NormalizedDiffEntry {
                kind: ChangeKind::Delete,
                path,
                old: Some(old),
                new: None,
            },
            (kind, lhs, rhs) => {
                return Err(SnapdiffError::InvalidDiffKind {
                    kind: format!(
                        "{} (lhs: {}, rhs: {})",
                        kind.code(),
                        if lhs.is_some() { "set" } else { "unset" },
                        if rhs.is_some() { "set" } else { "unset" },
                    ),
                    path,
                }
                .into())
            }
        };

        Ok(ReportEntry::Summary(summary))
    }
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new(true)
    }
}
