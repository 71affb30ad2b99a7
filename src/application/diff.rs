use serde_json::Value;
use std::collections::BTreeSet;

use crate::domain::{
    diff_entry::RawDiffEntry,
    path::PathSegment,
    ports::Differ,
    snapshot::Snapshot,
};

// ─── Structural Differ (implementation of the port) ───

/// Deep structural diff over the JSON tree of two snapshots.
///
/// Objects are walked over the union of their keys in sorted order, arrays
/// over the union of their indices in ascending order. Containers present on
/// both sides with the same shape are recursed into; everything else that
/// differs becomes one entry.
#[derive(Default)]
pub struct StructuralDiffer;

impl StructuralDiffer {
    pub fn new() -> Self {
        Self
    }
}

impl Differ for StructuralDiffer {
    fn diff(&self, before: &Snapshot, after: &Snapshot) -> Option<Vec<RawDiffEntry>> {
        diff_values(&before.to_value(), &after.to_value())
    }
}

/// Diff two arbitrary JSON trees. `None` when they are structurally equal.
pub fn diff_values(before: &Value, after: &Value) -> Option<Vec<RawDiffEntry>> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(&mut path, before, after, &mut out);
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn walk(path: &mut Vec<PathSegment>, lhs: &Value, rhs: &Value, out: &mut Vec<RawDiffEntry>) {
    match (lhs, rhs) {
        (Value::Object(l), Value::Object(r)) => {
            let keys: BTreeSet<&String> = l.keys().chain(r.keys()).collect();
            for key in keys {
                path.push(PathSegment::Key(key.clone()));
                visit(path, l.get(key), r.get(key), out);
                path.pop();
            }
        }
        (Value::Array(l), Value::Array(r)) => {
            for idx in 0..l.len().max(r.len()) {
                path.push(PathSegment::Index(idx));
                visit(path, l.get(idx), r.get(idx), out);
                path.pop();
            }
        }
        _ => {
            if lhs != rhs {
                out.push(RawDiffEntry::edit(path.clone(), lhs.clone(), rhs.clone()));
            }
        }
    }
}

// Presence decides add/delete; a `null` value is still a present value.
fn visit(
    path: &mut Vec<PathSegment>,
    lhs: Option<&Value>,
    rhs: Option<&Value>,
    out: &mut Vec<RawDiffEntry>,
) {
    match (lhs, rhs) {
        (Some(l), Some(r)) => walk(path, l, r, out),
        (None, Some(r)) => out.push(RawDiffEntry::add(path.clone(), r.clone())),
        (Some(l), None) => out.push(RawDiffEntry::delete(path.clone(), l.clone())),
        (None, None) => {}
    }
}
