use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::domain::value_objects::TableName;

/// Type alias for a database row represented as a sorted map of column name → JSON value.
pub type RowMap = BTreeMap<String, Value>;

/// The full result of querying one table.
///
/// Shaped like the result object of the query engines operators are used to
/// reading: the primary row list, a duplicate copy wrapped as a list of one
/// result set, and the affected-row counts. The duplicate and the counts show
/// up in raw diff paths and are what the normaliser and the noise filter
/// strip again.
#[derive(Debug, Clone, PartialEq)]
pub struct TableResult {
    pub recordset: Vec<RowMap>,
    pub recordsets: Vec<Vec<RowMap>>,
    pub rows_affected: Vec<u64>,
}

impl TableResult {
    pub fn from_rows(rows: Vec<RowMap>) -> Self {
        let count = rows.len() as u64;
        Self {
            recordsets: vec![rows.clone()],
            recordset: rows,
            rows_affected: vec![count],
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("recordset".into(), rows_to_value(&self.recordset));
        obj.insert(
            "recordsets".into(),
            Value::Array(self.recordsets.iter().map(|rs| rows_to_value(rs)).collect()),
        );
        obj.insert(
            "rowsAffected".into(),
            Value::Array(self.rows_affected.iter().map(|n| Value::from(*n)).collect()),
        );
        Value::Object(obj)
    }
}

fn rows_to_value(rows: &[RowMap]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| Value::Object(row.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
            .collect(),
    )
}

/// All rows of a set of tables at one point in time.
///
/// `None` marks a table that was selected but could not be queried.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    tables: BTreeMap<TableName, Option<TableResult>>,
}

impl Snapshot {
    pub fn new(tables: BTreeMap<TableName, Option<TableResult>>) -> Self {
        Self {
            taken_at: Utc::now(),
            tables,
        }
    }

    pub fn get(&self, table: &TableName) -> Option<&TableResult> {
        self.tables.get(table).and_then(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of selected tables that could not be queried.
    pub fn absent_count(&self) -> usize {
        self.tables.values().filter(|r| r.is_none()).count()
    }

    /// The nested tree the structural differ walks: table → result object,
    /// with absent tables as `null`.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.tables
                .iter()
                .map(|(name, result)| {
                    let v = result.as_ref().map_or(Value::Null, TableResult::to_value);
                    (name.0.clone(), v)
                })
                .collect(),
        )
    }
}
