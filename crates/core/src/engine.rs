// crates/core/src/engine.rs
//! Structured result reported by the load engine.

use serde::{Deserialize, Serialize};

/// Detailed output of the underlying load engine for one job.
///
/// Attached to [`LoadStatus`](crate::status::LoadStatus) by the coordinator
/// and exposed unchanged to callers; nothing in this crate interprets it.
/// Transient: not part of the durable encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResult {
    pub success: bool,
    pub fail_reason: String,
    pub scanned_rows: i64,
    pub scanned_bytes: i64,
    pub file_count: i64,
    pub file_size: i64,
    /// Rows that passed quality checks and were loaded.
    pub normal_rows: i64,
    /// Rows rejected by quality checks.
    pub abnormal_rows: i64,
    /// Rows skipped by load-time predicates.
    pub unselected_rows: i64,
}
