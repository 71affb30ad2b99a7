use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::filter::{FilterOrder, NoiseFilter};
use crate::application::snapshot::SnapshotService;
use crate::application::summarize::Summarizer;
use crate::domain::{
    diff_entry::{RawDiffEntry, ReportEntry},
    errors::SnapdiffError,
    ports::{Differ, OperatorSignal, OutputWriter, RowRepository},
    value_objects::{ColumnName, Schema, TableName},
};
use crate::infrastructure::config::AppConfig;

/// Printed when the two snapshots are structurally identical.
pub const NO_DIFF: &str = "No diff!";

/// Printed when no table is left to snapshot.
pub const NOTHING_TO_DIFF: &str = "Nothing to diff: no usable tables.";

// ─── Stages ──────────────────────────────────────────────────────────────────

/// States of one run, in order. `Failed` is reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connecting,
    ResolvingTables,
    SnapshotA,
    AwaitingTrigger,
    SnapshotB,
    Diffing,
    Rendering,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Connecting => "connecting",
            Stage::ResolvingTables => "resolving tables",
            Stage::SnapshotA => "first snapshot",
            Stage::AwaitingTrigger => "awaiting trigger",
            Stage::SnapshotB => "second snapshot",
            Stage::Diffing => "diffing",
            Stage::Rendering => "rendering",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub(crate) fn enter(stage: Stage) {
    debug!(stage = %stage, "entering stage");
}

pub(crate) fn failed_in(stage: Stage) -> String {
    format!("{} failed", stage)
}

// ─── Options & outcome ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Requested subset; empty means every base table.
    pub tables: Vec<TableName>,
    pub tenant: Option<Schema>,
    pub order_by: Option<ColumnName>,
    pub filter: NoiseFilter,
    pub summarizer: Summarizer,
    pub filter_order: FilterOrder,
}

impl PipelineOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            tables: cfg.diff.tables.iter().map(|t| TableName(t.clone())).collect(),
            tenant: cfg.db.tenant.clone().map(Schema),
            order_by: cfg.diff.order_by.clone().map(ColumnName),
            filter: NoiseFilter::new(cfg.diff.filter),
            summarizer: Summarizer::new(cfg.diff.summarize),
            filter_order: cfg.diff.filter_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The working set of tables was empty.
    NothingToDiff,
    /// Both snapshots were identical.
    NoDiff,
    /// Entries that survived filtering (possibly none).
    Changes(Vec<ReportEntry>),
}

/// The outcome of a run together with its rendered form.
#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: Outcome,
    pub rendered: String,
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Drives one snapshot → trigger → snapshot → diff run.
pub struct Pipeline {
    repo: Arc<dyn RowRepository>,
    differ: Arc<dyn Differ>,
    writer: Box<dyn OutputWriter>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        repo: Arc<dyn RowRepository>,
        differ: Arc<dyn Differ>,
        writer: Box<dyn OutputWriter>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            repo,
            differ,
            writer,
            options,
        }
    }

    pub async fn run(&self, signal: &dyn OperatorSignal) -> Result<Report> {
        let mut stage = Stage::Connecting;
        match self.drive(signal, &mut stage).await {
            Ok(outcome) => {
                advance(&mut stage, Stage::Rendering);
                let rendered = render(&outcome, self.writer.as_ref());
                advance(&mut stage, Stage::Done);
                Ok(Report { outcome, rendered })
            }
            Err(e) => {
                let failed = stage;
                enter(Stage::Failed);
                debug!(stage = %failed, error = %format!("{:#}", e), "run aborted");
                Err(e.context(failed_in(failed)))
            }
        }
    }

    async fn drive(&self, signal: &dyn OperatorSignal, stage: &mut Stage) -> Result<Outcome> {
        let opts = &self.options;

        advance(stage, Stage::ResolvingTables);
        let all = self.repo.list_base_tables().await?;
        let tables = resolve_tables(&all, &opts.tables);
        if tables.is_empty() {
            info!("{}", SnapdiffError::NoUsableTables);
            return Ok(Outcome::NothingToDiff);
        }
        info!(tables = tables.len(), "working set resolved");

        let snapshots = SnapshotService::new(Arc::clone(&self.repo));

        advance(stage, Stage::SnapshotA);
        let before = snapshots
            .capture(&tables, opts.tenant.as_ref(), opts.order_by.as_ref())
            .await;

        advance(stage, Stage::AwaitingTrigger);
        signal.wait().await?;

        advance(stage, Stage::SnapshotB);
        let after = snapshots
            .capture(&tables, opts.tenant.as_ref(), opts.order_by.as_ref())
            .await;

        advance(stage, Stage::Diffing);
        let Some(raw) = self.differ.diff(&before, &after) else {
            return Ok(Outcome::NoDiff);
        };
        let entries = shape_report(raw, opts)?;
        Ok(Outcome::Changes(entries))
    }
}

fn advance(current: &mut Stage, next: Stage) {
    *current = next;
    enter(next);
}

/// Keep the requested tables that exist, in request order, without
/// duplicates. Unknown names are warned about and skipped. An empty request
/// selects everything.
pub fn resolve_tables(all: &[TableName], requested: &[TableName]) -> Vec<TableName> {
    if requested.is_empty() {
        return all.to_vec();
    }

    let known: BTreeSet<&TableName> = all.iter().collect();
    let mut seen = BTreeSet::new();
    let mut selected = Vec::with_capacity(requested.len());
    for name in requested {
        if !known.contains(name) {
            warn!("{}", SnapdiffError::UnknownRequestedTable(name.0.clone()));
            continue;
        }
        if seen.insert(name) {
            selected.push(name.clone());
        }
    }
    selected
}

/// Apply the noise filter and the summarizer in the configured order.
pub fn shape_report(raw: Vec<RawDiffEntry>, opts: &PipelineOptions) -> Result<Vec<ReportEntry>> {
    match opts.filter_order {
        FilterOrder::BeforeSummarize => raw
            .into_iter()
            .filter(|e| opts.filter.should_keep(&e.raw_path()))
            .map(|e| opts.summarizer.summarize(e))
            .collect(),
        FilterOrder::AfterSummarize => {
            let mut out = Vec::with_capacity(raw.len());
            for e in raw {
                let entry = opts.summarizer.summarize(e)?;
                if opts.filter.should_keep(entry.path()) {
                    out.push(entry);
                }
            }
            Ok(out)
        }
    }
}

/// Turn an outcome into the text printed on stdout.
pub fn render(outcome: &Outcome, writer: &dyn OutputWriter) -> String {
    match outcome {
        Outcome::NothingToDiff => NOTHING_TO_DIFF.to_string(),
        Outcome::NoDiff => NO_DIFF.to_string(),
        Outcome::Changes(entries) => writer.format(entries).unwrap_or_else(|e| {
            warn!(writer = writer.name(), error = %e, "writer failed, falling back to debug output");
            format!("{:#?}", entries)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::diff::StructuralDiffer;
    use crate::domain::diff_entry::{ChangeKind, NormalizedDiffEntry};
    use crate::infrastructure::memory::InMemoryRowRepository;
    use crate::presentation::writers::json::JsonWriter;
    use anyhow::bail;
    use async_trait::async_trait;
    use serde_json::json;

    /// Runs `action` when the operator would press enter.
    struct Scripted<F: Fn() + Send + Sync>(F);

    #[async_trait]
    impl<F: Fn() + Send + Sync> OperatorSignal for Scripted<F> {
        async fn wait(&self) -> Result<()> {
            (self.0)();
            Ok(())
        }
    }

    struct Hangup;

    #[async_trait]
    impl OperatorSignal for Hangup {
        async fn wait(&self) -> Result<()> {
            bail!("stdin closed")
        }
    }

    fn pipeline(repo: Arc<InMemoryRowRepository>, options: PipelineOptions) -> Pipeline {
        Pipeline::new(
            repo,
            Arc::new(StructuralDiffer::new()),
            Box::new(JsonWriter),
            options,
        )
    }

    fn names(list: &[&str]) -> Vec<TableName> {
        list.iter().map(|s| TableName::from(*s)).collect()
    }

    fn edit(path: &str, old: serde_json::Value, new: serde_json::Value) -> ReportEntry {
        ReportEntry::Summary(NormalizedDiffEntry {
            kind: ChangeKind::Edit,
            path: path.into(),
            old: Some(old),
            new: Some(new),
        })
    }

    #[tokio::test]
    async fn reports_a_single_column_edit() {
        let repo = Arc::new(InMemoryRowRepository::new());
        repo.set_rows("T", vec![json!({"id": 1, "name": "x"})]);

        let r = Arc::clone(&repo);
        let signal = Scripted(move || r.set_rows("T", vec![json!({"id": 1, "name": "y"})]));

        let report = pipeline(repo, PipelineOptions::default())
            .run(&signal)
            .await
            .unwrap();
        assert_eq!(
            report.outcome,
            Outcome::Changes(vec![edit("T.0.name", json!("x"), json!("y"))])
        );

        let rendered: serde_json::Value = serde_json::from_str(&report.rendered).unwrap();
        assert_eq!(
            rendered,
            json!([{"kind": "Edit", "path": "T.0.name", "old": "x", "new": "y"}])
        );
    }

    #[tokio::test]
    async fn reports_inserted_row_without_count_noise() {
        let repo = Arc::new(InMemoryRowRepository::new());
        repo.set_rows("T", vec![]);

        let r = Arc::clone(&repo);
        let signal = Scripted(move || r.set_rows("T", vec![json!({"id": 1})]));

        let report = pipeline(repo, PipelineOptions::default())
            .run(&signal)
            .await
            .unwrap();
        assert_eq!(
            report.outcome,
            Outcome::Changes(vec![ReportEntry::Summary(NormalizedDiffEntry {
                kind: ChangeKind::Add,
                path: "T.0".into(),
                old: None,
                new: Some(json!({"id": 1})),
            })])
        );
    }

    #[tokio::test]
    async fn reports_deleted_row() {
        let repo = Arc::new(InMemoryRowRepository::new());
        repo.set_rows("T", vec![json!({"id": 1})]);

        let r = Arc::clone(&repo);
        let signal = Scripted(move || r.set_rows("T", vec![]));

        let report = pipeline(repo, PipelineOptions::default())
            .run(&signal)
            .await
            .unwrap();
        let Outcome::Changes(entries) = report.outcome else {
            panic!("expected changes");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].change_kind(), ChangeKind::Delete);
        assert_eq!(entries[0].path(), "T.0");
        assert_eq!(entries[0].values(), (Some(&json!({"id": 1})), None));
    }

    #[tokio::test]
    async fn unchanged_database_prints_no_diff() {
        let repo = Arc::new(InMemoryRowRepository::new());
        repo.set_rows("T", vec![json!({"id": 1})]);
        repo.fail_table("Locked");

        let report = pipeline(repo, PipelineOptions::default())
            .run(&Scripted(|| {}))
            .await
            .unwrap();
        assert_eq!(report.outcome, Outcome::NoDiff);
        assert_eq!(report.rendered, NO_DIFF);
    }

    #[tokio::test]
    async fn billing_change_events_follow_the_filter_flag() {
        let repo = Arc::new(InMemoryRowRepository::new());
        repo.set_rows("BillingChangeEvent", vec![json!({"id": 1, "amount": 5})]);

        let r = Arc::clone(&repo);
        let change = move || {
            r.set_rows(
                "BillingChangeEvent",
                vec![json!({"id": 1, "amount": 7})],
            )
        };

        let filtered = pipeline(Arc::clone(&repo), PipelineOptions::default())
            .run(&Scripted(change.clone()))
            .await
            .unwrap();
        assert_eq!(filtered.outcome, Outcome::Changes(vec![]));

        repo.set_rows("BillingChangeEvent", vec![json!({"id": 1, "amount": 5})]);
        let options = PipelineOptions {
            filter: NoiseFilter::new(false),
            ..Default::default()
        };
        let unfiltered = pipeline(repo, options)
            .run(&Scripted(change))
            .await
            .unwrap();
        let Outcome::Changes(entries) = unfiltered.outcome else {
            panic!("expected changes");
        };
        assert!(entries
            .iter()
            .any(|e| e.path() == "BillingChangeEvent.0.amount"));
    }

    #[tokio::test]
    async fn unknown_requested_table_is_skipped() {
        let repo = Arc::new(InMemoryRowRepository::new());
        repo.set_rows("T", vec![json!({"id": 1, "name": "x"})]);
        repo.set_rows("Other", vec![json!({"id": 1})]);

        let r = Arc::clone(&repo);
        let signal = Scripted(move || {
            r.set_rows("T", vec![json!({"id": 1, "name": "y"})]);
            r.set_rows("Other", vec![json!({"id": 2})]);
        });

        let options = PipelineOptions {
            tables: names(&["Ghost", "T"]),
            ..Default::default()
        };
        let report = pipeline(repo, options).run(&signal).await.unwrap();
        assert_eq!(
            report.outcome,
            Outcome::Changes(vec![edit("T.0.name", json!("x"), json!("y"))])
        );
    }

    #[tokio::test]
    async fn only_unknown_tables_means_nothing_to_diff() {
        let repo = Arc::new(InMemoryRowRepository::new());
        repo.set_rows("T", vec![]);

        let options = PipelineOptions {
            tables: names(&["Ghost", "Phantom"]),
            ..Default::default()
        };
        let report = pipeline(repo, options).run(&Hangup).await.unwrap();
        assert_eq!(report.outcome, Outcome::NothingToDiff);
        assert_eq!(report.rendered, NOTHING_TO_DIFF);
    }

    #[tokio::test]
    async fn empty_database_means_nothing_to_diff() {
        let repo = Arc::new(InMemoryRowRepository::new());
        let report = pipeline(repo, PipelineOptions::default())
            .run(&Hangup)
            .await
            .unwrap();
        assert_eq!(report.outcome, Outcome::NothingToDiff);
    }

    #[tokio::test]
    async fn signal_failure_fails_the_run() {
        let repo = Arc::new(InMemoryRowRepository::new());
        repo.set_rows("T", vec![]);

        let err = pipeline(repo, PipelineOptions::default())
            .run(&Hangup)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "awaiting trigger failed");
        assert!(format!("{:#}", err).contains("stdin closed"));
    }

    struct Unlistable;

    #[async_trait]
    impl RowRepository for Unlistable {
        async fn list_base_tables(&self) -> Result<Vec<TableName>> {
            bail!("permission denied for information_schema")
        }

        async fn fetch_table(
            &self,
            _table: &TableName,
            _tenant: Option<&Schema>,
            _order_by: Option<&ColumnName>,
        ) -> Result<crate::domain::snapshot::TableResult> {
            unreachable!("nothing is listed")
        }
    }

    #[tokio::test]
    async fn listing_failure_names_its_stage() {
        let p = Pipeline::new(
            Arc::new(Unlistable),
            Arc::new(StructuralDiffer::new()),
            Box::new(JsonWriter),
            PipelineOptions::default(),
        );
        let err = p.run(&Scripted(|| {})).await.unwrap_err();
        assert_eq!(err.to_string(), "resolving tables failed");
        assert!(format!("{:#}", err).contains("information_schema"));
    }

    #[tokio::test]
    async fn filtering_after_summarize_keeps_duplicate_copy() {
        let repo = Arc::new(InMemoryRowRepository::new());
        repo.set_rows("T", vec![json!({"id": 1, "name": "x"})]);

        let r = Arc::clone(&repo);
        let signal = Scripted(move || r.set_rows("T", vec![json!({"id": 1, "name": "y"})]));

        let options = PipelineOptions {
            filter_order: FilterOrder::AfterSummarize,
            ..Default::default()
        };
        let report = pipeline(repo, options).run(&signal).await.unwrap();
        let expected = edit("T.0.name", json!("x"), json!("y"));
        assert_eq!(
            report.outcome,
            Outcome::Changes(vec![expected.clone(), expected])
        );
    }

    // ── resolve_tables ──

    #[test]
    fn resolve_tables_keeps_request_order_and_dedupes() {
        let all = names(&["A", "B", "C"]);
        assert_eq!(resolve_tables(&all, &[]), all);
        assert_eq!(
            resolve_tables(&all, &names(&["C", "X", "A", "C"])),
            names(&["C", "A"])
        );
        assert!(resolve_tables(&all, &names(&["X"])).is_empty());
    }

    // ── shape_report ──

    #[test]
    fn filter_disabled_keeps_every_entry() {
        let raw = vec![
            RawDiffEntry::edit(vec!["T".into(), "recordset".into(), 0.into(), "c".into()], json!(1), json!(2)),
            RawDiffEntry::edit(vec!["T".into(), "recordsets".into(), 0.into(), 0.into(), "c".into()], json!(1), json!(2)),
            RawDiffEntry::edit(vec!["T".into(), "rowsAffected".into(), 0.into()], json!(1), json!(2)),
        ];
        let opts = PipelineOptions {
            filter: NoiseFilter::new(false),
            ..Default::default()
        };
        assert_eq!(shape_report(raw.clone(), &opts).unwrap().len(), raw.len());

        let opts = PipelineOptions::default();
        assert_eq!(shape_report(raw, &opts).unwrap().len(), 1);
    }

    #[test]
    fn stage_names_read_well_in_errors() {
        assert_eq!(failed_in(Stage::SnapshotB), "second snapshot failed");
        assert_eq!(Stage::ResolvingTables.to_string(), "resolving tables");
    }
}
