use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// Wrapper key of the primary row list inside a table result.
pub const RECORDSET: &str = "recordset";

/// Wrapper key of the duplicate, list-of-one copy of the rows.
pub const RECORDSETS: &str = "recordsets";

/// One step from the snapshot root down to a differing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    fn as_text(&self) -> Cow<'_, str> {
        match self {
            PathSegment::Key(k) => Cow::Borrowed(k.as_str()),
            PathSegment::Index(i) => Cow::Owned(i.to_string()),
        }
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(k) => k.fmt(f),
            PathSegment::Index(i) => i.fmt(f),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Key(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

/// Join a raw path with `.` without any rewriting.
pub fn join(path: &[PathSegment]) -> String {
    path.iter()
        .map(|s| s.as_text())
        .collect::<Vec<_>>()
        .join(".")
}

/// Collapse the result-object wrapping out of a raw path.
///
/// `recordset` segments are dropped and every adjacent `recordsets`, `0` pair
/// is removed, so both `[T, recordset, 3, name]` and
/// `[T, recordsets, 0, 3, name]` become `T.3.name`. Anything else passes
/// through untouched.
pub fn normalize(path: &[PathSegment]) -> String {
    collapse(path.iter().map(|s| s.as_text()))
}

/// [`normalize`] for a path that is already a dotted string.
pub fn normalize_str(path: &str) -> String {
    collapse(path.split('.').map(Cow::Borrowed))
}

fn collapse<'a>(segments: impl Iterator<Item = Cow<'a, str>>) -> String {
    let mut kept: Vec<Cow<'a, str>> = Vec::new();
    for seg in segments {
        if seg == RECORDSET {
            continue;
        }
        // Stack-based so a pair exposed by an earlier removal is caught too.
        if seg == "0" && kept.last().is_some_and(|top| top == RECORDSETS) {
            kept.pop();
            continue;
        }
        kept.push(seg);
    }
    kept.join(".")
}

/// Follow `path` from `root`, returning the node it points at.
pub fn resolve<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, seg| match (node, seg) {
        (Value::Object(map), PathSegment::Key(k)) => map.get(k),
        (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(segs: &[PathSegment]) -> Vec<PathSegment> {
        segs.to_vec()
    }

    fn k(s: &str) -> PathSegment {
        PathSegment::from(s)
    }

    fn i(n: usize) -> PathSegment {
        PathSegment::from(n)
    }

    #[test]
    fn drops_recordset_segment() {
        let p = path(&[k("Users"), k("recordset"), i(0), k("name")]);
        assert_eq!(normalize(&p), "Users.0.name");
    }

    #[test]
    fn collapses_recordsets_zero() {
        let p = path(&[k("Users"), k("recordsets"), i(0), i(2), k("name")]);
        assert_eq!(normalize(&p), "Users.2.name");
    }

    #[test]
    fn collapses_whole_duplicate_list() {
        let p = path(&[k("Users"), k("recordsets"), i(0)]);
        assert_eq!(normalize(&p), "Users");
    }

    #[test]
    fn leaves_other_recordsets_indices_alone() {
        let p = path(&[k("Users"), k("recordsets"), i(1), i(0)]);
        assert_eq!(normalize(&p), "Users.recordsets.1.0");
    }

    #[test]
    fn unknown_segments_pass_through() {
        let p = path(&[k("Users"), k("rowsAffected"), i(0)]);
        assert_eq!(normalize(&p), "Users.rowsAffected.0");
        assert_eq!(normalize(&[]), "");
    }

    #[test]
    fn normalize_reaches_fixpoint_in_one_pass() {
        let cases = vec![
            path(&[k("T"), k("recordset"), i(0), k("c")]),
            path(&[k("T"), k("recordsets"), i(0), i(0), k("c")]),
            path(&[k("T"), k("recordsets"), k("recordsets"), i(0), i(0)]),
            path(&[k("T"), k("recordsets"), k("recordset"), i(0), k("x")]),
            path(&[k("recordsets"), i(0), k("recordsets"), i(0), i(0)]),
            path(&[k("T"), k("rowsAffected"), i(0)]),
        ];
        for p in cases {
            let once = normalize(&p);
            assert_eq!(normalize_str(&once), once, "path {:?}", p);
        }
    }

    #[test]
    fn join_keeps_everything() {
        let p = path(&[k("T"), k("recordsets"), i(0), i(1)]);
        assert_eq!(join(&p), "T.recordsets.0.1");
    }

    #[test]
    fn resolve_walks_objects_and_arrays() {
        let v = json!({"T": {"recordset": [{"id": 1}, {"id": 2}]}});
        let p = path(&[k("T"), k("recordset"), i(1), k("id")]);
        assert_eq!(resolve(&v, &p), Some(&json!(2)));
        assert_eq!(resolve(&v, &[]), Some(&v));
    }

    #[test]
    fn resolve_rejects_mismatched_segments() {
        let v = json!({"T": [1, 2]});
        assert_eq!(resolve(&v, &path(&[k("T"), k("0")])), None);
        assert_eq!(resolve(&v, &path(&[k("T"), i(5)])), None);
        assert_eq!(resolve(&v, &path(&[i(0)])), None);
    }
}
