use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::domain::errors::SnapdiffError;
use crate::domain::path::{join, PathSegment};

/// Kind of a raw structural difference, serialised with its one-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DiffKind {
    Edit,
    Add,
    Delete,
}

impl DiffKind {
    pub fn code(self) -> &'static str {
        match self {
            DiffKind::Edit => "E",
            DiffKind::Add => "A",
            DiffKind::Delete => "D",
        }
    }
}

impl FromStr for DiffKind {
    type Err = SnapdiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "E" => Ok(DiffKind::Edit),
            "A" => Ok(DiffKind::Add),
            "D" => Ok(DiffKind::Delete),
            other => Err(SnapdiffError::InvalidDiffKind {
                kind: other.to_string(),
                path: String::new(),
            }),
        }
    }
}

impl TryFrom<String> for DiffKind {
    type Error = SnapdiffError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DiffKind> for String {
    fn from(kind: DiffKind) -> Self {
        kind.code().to_string()
    }
}

/// One difference between two snapshots, as found by the structural differ.
///
/// `lhs` is the value on the `before` side, `rhs` on the `after` side. An
/// edit carries both, an add only `rhs` and a delete only `lhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDiffEntry {
    pub kind: DiffKind,
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lhs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhs: Option<Value>,
}

impl RawDiffEntry {
    pub fn edit(path: Vec<PathSegment>, old: Value, new: Value) -> Self {
        Self {
            kind: DiffKind::Edit,
            path,
            lhs: Some(old),
            rhs: Some(new),
        }
    }

    pub fn add(path: Vec<PathSegment>, new: Value) -> Self {
        Self {
            kind: DiffKind::Add,
            path,
            lhs: None,
            rhs: Some(new),
        }
    }

    pub fn delete(path: Vec<PathSegment>, old: Value) -> Self {
        Self {
            kind: DiffKind::Delete,
            path,
            lhs: Some(old),
            rhs: None,
        }
    }

    /// The path joined with `.`, before any normalisation.
    pub fn raw_path(&self) -> String {
        join(&self.path)
    }
}

/// Presentation kind of a summarised entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Edit,
    Add,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::Edit => "Edit",
            ChangeKind::Add => "Add",
            ChangeKind::Delete => "Delete",
        };
        f.write_str(s)
    }
}

/// A summarised entry: normalised path plus the old/new values that matter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedDiffEntry {
    pub kind: ChangeKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

/// A raw entry whose path has been normalised but whose fields are otherwise
/// left exactly as the differ produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassthroughEntry {
    pub kind: DiffKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lhs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rhs: Option<Value>,
}

/// What ends up in the rendered report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Summary(NormalizedDiffEntry),
    Raw(PassthroughEntry),
}

impl ReportEntry {
    pub fn path(&self) -> &str {
        match self {
            ReportEntry::Summary(e) => &e.path,
            ReportEntry::Raw(e) => &e.path,
        }
    }

    pub fn change_kind(&self) -> ChangeKind {
        match self {
            ReportEntry::Summary(e) => e.kind,
            ReportEntry::Raw(e) => match e.kind {
                DiffKind::Edit => ChangeKind::Edit,
                DiffKind::Add => ChangeKind::Add,
                DiffKind::Delete => ChangeKind::Delete,
            },
        }
    }

    /// `(old, new)` regardless of the entry flavour.
    pub fn values(&self) -> (Option<&Value>, Option<&Value>) {
        match self {
            ReportEntry::Summary(e) => (e.old.as_ref(), e.new.as_ref()),
            ReportEntry::Raw(e) => (e.lhs.as_ref(), e.rhs.as_ref()),
        }
    }
}
