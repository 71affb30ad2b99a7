use crate::domain::{
    diff_entry::{RawDiffEntry, ReportEntry},
    snapshot::{Snapshot, TableResult},
    value_objects::{ColumnName, Schema, TableName},
};
use anyhow::Result;
use async_trait::async_trait;

/// Port: access to the tables of one database (implemented by SqlxRowRepository)
#[async_trait]
pub trait RowRepository: Send + Sync {
    /// Base tables of the connection's default schema, sorted by name,
    /// without internal bookkeeping tables.
    async fn list_base_tables(&self) -> Result<Vec<TableName>>;

    /// `SELECT *` from one table, optionally qualified by `tenant` and
    /// ordered by `order_by`.
    async fn fetch_table(
        &self,
        table: &TableName,
        tenant: Option<&Schema>,
        order_by: Option<&ColumnName>,
    ) -> Result<TableResult>;
}

/// Port: snapshot diff algorithm (implemented by StructuralDiffer)
pub trait Differ: Send + Sync {
    /// `None` when the two snapshots are structurally identical.
    fn diff(&self, before: &Snapshot, after: &Snapshot) -> Option<Vec<RawDiffEntry>>;
}

/// Port: the operator's "go ahead" between the two snapshots.
#[async_trait]
pub trait OperatorSignal: Send + Sync {
    async fn wait(&self) -> Result<()>;
}

/// Port: output formatting (implemented by JsonWriter, TextWriter)
pub trait OutputWriter: Send + Sync {
    /// Serializes the report entries to a string
    fn format(&self, entries: &[ReportEntry]) -> Result<String>;
    /// Short format name as accepted on the command line
    fn name(&self) -> &'static str;
}
