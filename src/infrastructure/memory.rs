use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::domain::ports::RowRepository;
use crate::domain::snapshot::{RowMap, TableResult};
use crate::domain::value_objects::{ColumnName, Schema, TableName};
use crate::infrastructure::db::BOOKKEEPING_TABLE;

/// In-memory implementation of [`RowRepository`].
///
/// Tables live in a map keyed by `table` or `tenant.table`. Only unqualified
/// tables are listed as base tables, mirroring a database whose tenant
/// schemas do not necessarily expose every table. Contents can be changed at
/// any time through a shared reference, which makes it handy for simulating
/// "the operator did something" between two snapshots.
#[derive(Default)]
pub struct InMemoryRowRepository {
    tables: Mutex<BTreeMap<String, Vec<RowMap>>>,
    failing: Mutex<BTreeSet<String>>,
}

impl InMemoryRowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows of `table`. Non-object values are ignored.
    pub fn set_rows(&self, table: &str, rows: Vec<Value>) {
        let rows = rows
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map.into_iter().collect::<RowMap>()),
                _ => None,
            })
            .collect();
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(table.to_string(), rows);
        }
    }

    /// Make every fetch of `table` fail while still listing it.
    pub fn fail_table(&self, table: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(table.to_string());
        }
    }
}

#[async_trait]
impl RowRepository for InMemoryRowRepository {
    async fn list_base_tables(&self) -> Result<Vec<TableName>> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| anyhow!("table store poisoned"))?;
        let failing = self
            .failing
            .lock()
            .map_err(|_| anyhow!("table store poisoned"))?;

        let names: BTreeSet<&String> = tables.keys().chain(failing.iter()).collect();
        Ok(names
            .into_iter()
            .filter(|n| !n.contains('.') && n.as_str() != BOOKKEEPING_TABLE)
            .map(|n| TableName(n.clone()))
            .collect())
    }

    async fn fetch_table(
        &self,
        table: &TableName,
        tenant: Option<&Schema>,
        order_by: Option<&ColumnName>,
    ) -> Result<TableResult> {
        let key = match tenant {
            Some(schema) => format!("{}.{}", schema.0, table.0),
            None => table.0.clone(),
        };

        let is_failing = self
            .failing
            .lock()
            .map_err(|_| anyhow!("table store poisoned"))?
            .contains(&key);
        if is_failing {
            bail!("permission denied for table {}", key);
        }

        let mut rows = self
            .tables
            .lock()
            .map_err(|_| anyhow!("table store poisoned"))?
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("relation {} does not exist", key))?;

        if let Some(col) = order_by {
            if rows.iter().any(|r| !r.contains_key(&col.0)) {
                bail!("column {} does not exist in {}", col.0, key);
            }
            rows.sort_by(|a, b| cmp_values(&a[&col.0], &b[&col.0]));
        }

        Ok(TableResult::from_rows(rows))
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
