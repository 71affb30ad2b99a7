use thiserror::Error;

/// Failure taxonomy of a snapdiff run.
///
/// Only [`SnapdiffError::Connection`] and [`SnapdiffError::InvalidDiffKind`]
/// are fatal. The others are recovered where they occur and only surface as
/// log lines or an informational message.
#[derive(Debug, Error)]
pub enum SnapdiffError {
    #[error("failed to connect to {database} (driver: {driver})")]
    Connection {
        database: String,
        driver: String,
        #[source]
        source: sqlx::Error,
    },

    /// One table could not be queried. Recorded as an absent table result.
    #[error("failed to fetch table {table}: {reason}")]
    TableFetch { table: String, reason: String },

    /// The resolved working set of tables is empty.
    #[error("no usable tables to snapshot")]
    NoUsableTables,

    /// A diff entry whose kind is not one of Edit, Add or Delete.
    #[error("invalid diff kind {kind:?} at path {path:?}")]
    InvalidDiffKind { kind: String, path: String },

    /// A table explicitly requested by the operator does not exist.
    #[error("requested table {0} does not exist, skipping it")]
    UnknownRequestedTable(String),
}
