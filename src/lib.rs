use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of snapdiff's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                              |
/// |---------|-----------------|------------------------------------------|
/// | `Error` | `error`         | `--quiet` / scripting                    |
/// | `Info`  | `info`          | Default, shows snapshot and table counts |
/// | `Debug` | `debug`         | `--verbose`, shows stages and SQL        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for snapdiff.
///
/// Respects `RUST_LOG` when set, falling back to `level` otherwise. Output
/// goes to stderr; stdout is reserved for the diff itself.
///
/// Only available when the `cli` feature is enabled (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "snapdiff=error",
        LogLevel::Info  => "snapdiff=info",
        LogLevel::Debug => "snapdiff=debug",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::monitoring::PerfReport;
pub use application::pipeline::{Outcome, Pipeline, PipelineOptions, Report, Stage};
pub use domain::diff_entry::{ChangeKind, DiffKind, NormalizedDiffEntry, RawDiffEntry, ReportEntry};
pub use domain::errors::SnapdiffError;
pub use domain::path::PathSegment;
pub use domain::ports::{Differ, OperatorSignal, OutputWriter, RowRepository};
pub use domain::snapshot::{RowMap, Snapshot, TableResult};
pub use domain::value_objects::{ColumnName, Schema, TableName};
pub use infrastructure::config::{AppConfig, ConfigOverrides, DbConfig, DiffConfig, OutputConfig};
pub use infrastructure::signal::StdinSignal;

use crate::application::diff::StructuralDiffer;
use crate::application::monitoring::{MonitoringDiffer, MonitoringRowRepository};
use crate::application::pipeline::{enter, failed_in};
use crate::infrastructure::db::client::connect;
use crate::presentation::writers::{writer_for, FORMATS};

// ─── Public entry points ───

/// One full run against the configured database: snapshot, wait for
/// `signal`, snapshot again, diff.
///
/// Returns the [`Report`] and a [`PerfReport`] with per-table fetch and
/// diff timings.
pub async fn run(cfg: &AppConfig, signal: &dyn OperatorSignal) -> Result<(Report, PerfReport)> {
    let writer = writer_for(&cfg.output.format).ok_or_else(|| {
        anyhow!(
            "Unknown format: {} (expected one of {})",
            cfg.output.format,
            FORMATS.join(", ")
        )
    })?;

    let perf = PerfReport::new();

    enter(Stage::Connecting);
    let repo = build_repo(cfg, Arc::clone(&perf))
        .await
        .with_context(|| failed_in(Stage::Connecting))?;
    let differ = Arc::new(MonitoringDiffer::new(
        Arc::new(StructuralDiffer::new()),
        Arc::clone(&perf),
    ));

    let pipeline = Pipeline::new(repo, differ, writer, PipelineOptions::from_config(cfg));
    let report = pipeline.run(signal).await?;

    let perf = perf.lock().map(|r| r.clone()).unwrap_or_default();
    Ok((report, perf))
}

// ─── Private helpers ───────────────────────────────────────────────────────────

/// Connect and wrap the repository in the monitoring decorator.
async fn build_repo(
    cfg: &AppConfig,
    report: Arc<std::sync::Mutex<PerfReport>>,
) -> Result<Arc<dyn RowRepository>> {
    let repo = Arc::new(connect(&cfg.db).await?);
    Ok(Arc::new(MonitoringRowRepository::new(repo, report)))
}
