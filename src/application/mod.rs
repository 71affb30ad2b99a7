pub mod diff;
pub mod filter;
pub mod monitoring;
pub mod pipeline;
pub mod snapshot;
pub mod summarize;
