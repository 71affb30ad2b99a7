use crate::domain::ports::{Differ, RowRepository};
use crate::domain::{
    diff_entry::RawDiffEntry,
    snapshot::{Snapshot, TableResult},
    value_objects::{ColumnName, Schema, TableName},
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};

// ─── PerfReport ──────────────────────────────────────────────────────────────

/// A single timed operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpTiming {
    /// Operation name: "fetch_table" or "diff".
    pub operation: &'static str,
    /// Table this operation was performed on ("*" for whole-snapshot ops).
    pub table: String,
    /// Elapsed wall time in milliseconds.
    pub duration_ms: u128,
    /// Number of rows involved (fetched, or diff entries produced).
    pub rows: usize,
}

/// Accumulated performance timings for a single snapdiff run.
///
/// Shared across all decorator instances for one run via `Arc<Mutex<_>>`.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PerfReport {
    pub timings: Vec<OpTiming>,
    pub total_rows_fetched: usize,
    pub total_ms: u128,
}

impl PerfReport {
    pub fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn total_rows_fetched(&self) -> usize {
        self.total_rows_fetched
    }

    pub fn total_ms(&self) -> u128 {
        self.total_ms
    }

    fn record(report: &Arc<Mutex<Self>>, timing: OpTiming) {
        if let Ok(mut r) = report.lock() {
            r.total_ms += timing.duration_ms;
            if timing.operation == "fetch_table" {
                r.total_rows_fetched += timing.rows;
            }
            r.timings.push(timing);
        }
    }
}

// ─── MonitoringRowRepository ─────────────────────────────────────────────────

/// Decorator: wraps any `RowRepository`, measures wall time per successful
/// `fetch_table` call, and appends the result to the shared `PerfReport`.
pub struct MonitoringRowRepository {
    inner: Arc<dyn RowRepository>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringRowRepository {
    pub fn new(inner: Arc<dyn RowRepository>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }
}

#[async_trait]
impl RowRepository for MonitoringRowRepository {
    async fn list_base_tables(&self) -> Result<Vec<TableName>> {
        self.inner.list_base_tables().await
    }

    #[instrument(
        name = "fetch_table",
        skip(self, table, tenant, order_by),
        fields(db.table = %table.0, db.tenant = tenant.map(|s| s.0.as_str()).unwrap_or("")),
        level = "info"
    )]
    async fn fetch_table(
        &self,
        table: &TableName,
        tenant: Option<&Schema>,
        order_by: Option<&ColumnName>,
    ) -> Result<TableResult> {
        let start = Instant::now();
        let result = self.inner.fetch_table(table, tenant, order_by).await?;
        let duration_ms = start.elapsed().as_millis();
        let rows = result.recordset.len();

        info!(table = %table.0, rows, duration_ms, "fetch_table completed");

        PerfReport::record(
            &self.report,
            OpTiming {
                operation: "fetch_table",
                table: table.0.clone(),
                duration_ms,
                rows,
            },
        );

        Ok(result)
    }
}

// ─── MonitoringDiffer ────────────────────────────────────────────────────────

/// Decorator: wraps any `Differ`, measures wall time per `diff` call,
/// and appends the result to the shared `PerfReport`.
pub struct MonitoringDiffer {
    inner: Arc<dyn Differ>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringDiffer {
    pub fn new(inner: Arc<dyn Differ>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }
}

impl Differ for MonitoringDiffer {
    #[instrument(
        name = "diff",
        skip(self, before, after),
        fields(before.tables = before.len(), after.tables = after.len()),
        level = "info"
    )]
    fn diff(&self, before: &Snapshot, after: &Snapshot) -> Option<Vec<RawDiffEntry>> {
        let start = Instant::now();
        let result = self.inner.diff(before, after);
        let duration_ms = start.elapsed().as_millis();

        let entries = result.as_ref().map_or(0, Vec::len);
        info!(entries, duration_ms, "diff completed");

        PerfReport::record(
            &self.report,
            OpTiming {
                operation: "diff",
                table: "*".to_string(),
                duration_ms,
                rows: entries,
            },
        );

        result
    }
}
