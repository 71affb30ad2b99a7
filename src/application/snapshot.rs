use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::SnapdiffError;
use crate::domain::ports::RowRepository;
use crate::domain::snapshot::{Snapshot, TableResult};
use crate::domain::value_objects::{ColumnName, Schema, TableName};

// ─────────────────────────────────────────────────────────────────────────────
// SnapshotService
// ─────────────────────────────────────────────────────────────────────────────

/// Captures the rows of a set of tables at one point in time.
///
/// All fetches of one capture are issued at once and polled together on the
/// calling task, so they overlap their database round trips without running
/// in parallel. The capture waits for the slowest table; there is no timeout
/// and no early cancellation.
///
/// A table that fails to load is logged and recorded as absent. It never
/// aborts the other fetches or the capture itself.
pub struct SnapshotService {
    repo: Arc<dyn RowRepository>,
}

impl SnapshotService {
    pub fn new(repo: Arc<dyn RowRepository>) -> Self {
        Self { repo }
    }

    pub async fn capture(
        &self,
        tables: &[TableName],
        tenant: Option<&Schema>,
        order_by: Option<&ColumnName>,
    ) -> Snapshot {
        let fetches = tables.iter().map(|table| async move {
            match self.repo.fetch_table(table, tenant, order_by).await {
                Ok(result) => (table.clone(), Some(result)),
                Err(e) => {
                    let err = SnapdiffError::TableFetch {
                        table: table.0.clone(),
                        reason: format!("{:#}", e),
                    };
                    warn!(table = %table, "{}", err);
                    (table.clone(), None)
                }
            }
        });

        let tables: BTreeMap<TableName, Option<TableResult>> =
            join_all(fetches).await.into_iter().collect();

        let snapshot = Snapshot::new(tables);
        info!(
            tables = snapshot.len(),
            absent = snapshot.absent_count(),
            taken_at = %snapshot.taken_at.to_rfc3339(),
            "snapshot captured"
        );
        snapshot
    }
}
