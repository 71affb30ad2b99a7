pub mod client;
pub mod dialect;
pub mod sql_utils;

/// Internal bookkeeping table that is never part of a snapshot.
pub const BOOKKEEPING_TABLE: &str = "__UpgradeSyncRoot__";
