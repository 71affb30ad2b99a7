use serde::Deserialize;

use crate::domain::path::RECORDSETS;

/// Segment holding the affected-row counts; inferable from adds/deletes.
const ROWS_AFFECTED: &str = "rowsAffected";

/// Audit-trail tables nobody wants to read through.
const BILLING_CHANGE_EVENT: &str = "BillingChangeEvent";

/// Where the noise filter runs relative to summarisation.
///
/// The two orders are not equivalent: on raw paths the duplicate
/// `recordsets.0` copies are caught by the `recordsets` rule, while on
/// normalised paths that segment is already gone and the copies survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOrder {
    /// Filter raw entries on their raw path, then summarise the survivors.
    #[default]
    #[serde(alias = "before")]
    BeforeSummarize,
    /// Summarise first, then filter on the normalised path.
    #[serde(alias = "after")]
    AfterSummarize,
}

impl FilterOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOrder::BeforeSummarize => "before_summarize",
            FilterOrder::AfterSummarize => "after_summarize",
        }
    }
}

impl std::str::FromStr for FilterOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" | "before_summarize" => Ok(FilterOrder::BeforeSummarize),
            "after" | "after_summarize" => Ok(FilterOrder::AfterSummarize),
            other => Err(format!("unknown filter order: {other} (expected before|after)")),
        }
    }
}

/// Suppresses known-boilerplate diff entries by path.
#[derive(Debug, Clone, Copy)]
pub struct NoiseFilter {
    enabled: bool,
}

impl NoiseFilter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// `path` is a dotted path, raw or normalised depending on where the
    /// filter runs.
    pub fn should_keep(&self, path: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let noisy_segment = path
            .split('.')
            .any(|seg| seg == RECORDSETS || seg == ROWS_AFFECTED);

        !noisy_segment && !path.contains(BILLING_CHANGE_EVENT)
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new(true)
    }
}
