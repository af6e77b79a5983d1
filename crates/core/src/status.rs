// crates/core/src/status.rs
//! Mutable status aggregate for one bulk-load job.
//!
//! One `LoadStatus` exists per job, owned by the coordinator that created it.
//! Worker-side reporters share a plain reference and are restricted to the
//! per-table counter surface, which is the only internally synchronized part
//! of the aggregate. Everything else is coordinator-only and takes
//! `&mut self`, so the compiler rejects coordinator mutation while reporter
//! borrows are live.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::engine::EngineResult;
use crate::state::LoadState;

/// Identifier of a table receiving loaded rows.
pub type TableId = u64;

type TableCounters = BTreeMap<TableId, BTreeMap<String, i64>>;

/// Tracking URL reported before the engine publishes a real one.
///
/// The SQL null display string, so status rows render the same way an absent
/// column would. Readers never see an absent value: the setter normalizes
/// `None` to the empty string.
pub const DEFAULT_TRACKING_URL: &str = "\\N";

// ---------------------------------------------------------------------------
// Durable / runtime split
// ---------------------------------------------------------------------------

/// The subset of job status that survives a persistence round-trip.
///
/// The wire codec reads and writes this struct and nothing else, so the
/// omission of runtime bookkeeping from the durable format is structural
/// rather than a convention the serializer has to remember.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct DurableStatus {
    pub(crate) state: LoadState,
    pub(crate) tracking_url: String,
    pub(crate) stats: BTreeMap<String, String>,
    pub(crate) counters: BTreeMap<String, String>,
}

/// Transient bookkeeping, repopulated by the runtime after every restart.
#[derive(Debug)]
struct RuntimeStatus {
    table_counters: Mutex<TableCounters>,
    file_map: BTreeMap<String, u64>,
    progress: u8,
    fail_msg: String,
    engine_result: Option<EngineResult>,
}

// ---------------------------------------------------------------------------
// LoadStatus
// ---------------------------------------------------------------------------

/// Status aggregate for a long-running bulk-load job.
///
/// ## Threading contract
///
/// Two surfaces with different rules:
///
/// - **Reporter surface** (`&self`): [`increase_table_counter`],
///   [`for_each_table_counter`], [`table_counter`]. Safe to call from any
///   number of threads through a shared reference; a single mutex makes each
///   call atomic as an observable unit, so concurrent increments never lose
///   updates and traversal never interleaves with accumulation.
/// - **Coordinator surface** (`&mut self`): every other mutator. Not
///   internally synchronized; exclusive access is required by signature, so
///   the single-owning-coordinator assumption is checked at compile time
///   instead of being a documentation-only contract.
///
/// Progress is 0-100 by convention; values are stored as given and clamping
/// is the caller's responsibility.
///
/// [`increase_table_counter`]: LoadStatus::increase_table_counter
/// [`for_each_table_counter`]: LoadStatus::for_each_table_counter
/// [`table_counter`]: LoadStatus::table_counter
#[derive(Debug)]
pub struct LoadStatus {
    pub(crate) durable: DurableStatus,
    runtime: RuntimeStatus,
}

impl LoadStatus {
    /// Create the status for a freshly submitted job: `Running`, sentinel
    /// tracking URL, all maps empty, progress 0, no failure, no engine
    /// result.
    pub fn new() -> Self {
        Self::from_durable(DurableStatus {
            state: LoadState::Running,
            tracking_url: DEFAULT_TRACKING_URL.to_string(),
            stats: BTreeMap::new(),
            counters: BTreeMap::new(),
        })
    }

    /// Rebuild an aggregate around a decoded durable subset. Runtime fields
    /// start at their defaults.
    pub(crate) fn from_durable(durable: DurableStatus) -> Self {
        Self {
            durable,
            runtime: RuntimeStatus {
                table_counters: Mutex::new(BTreeMap::new()),
                file_map: BTreeMap::new(),
                progress: 0,
                fail_msg: String::new(),
                engine_result: None,
            },
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Current lifecycle state.
    pub fn state(&self) -> LoadState {
        self.durable.state
    }

    /// One-way transition out of `Running`.
    ///
    /// Succeeds only while the job is still `Running`; once a terminal state
    /// is reached every later attempt returns `false` without mutating
    /// anything. Callers must check the result to detect a stale transition
    /// (e.g. a cancellation arriving after completion).
    pub fn try_set_state(&mut self, next: LoadState) -> bool {
        if self.durable.state != LoadState::Running {
            tracing::debug!(
                "ignoring transition to {} on terminal job (state {})",
                next.as_str(),
                self.durable.state.as_str()
            );
            return false;
        }
        self.durable.state = next;
        true
    }

    // -----------------------------------------------------------------------
    // Coordinator surface
    // -----------------------------------------------------------------------

    /// Tracking URL. Never absent: the sentinel or empty string stand in.
    pub fn tracking_url(&self) -> &str {
        &self.durable.tracking_url
    }

    /// Set the tracking URL, normalizing `None` to the empty string.
    pub fn set_tracking_url<T: Into<String>>(&mut self, url: Option<T>) {
        self.durable.tracking_url = url.map(Into::into).unwrap_or_default();
    }

    /// Summary metrics, replaced wholesale on every report.
    pub fn stats(&self) -> &BTreeMap<String, String> {
        &self.durable.stats
    }

    pub fn set_stats(&mut self, stats: BTreeMap<String, String>) {
        self.durable.stats = stats;
    }

    /// Named counters, replaceable one key at a time.
    pub fn counters(&self) -> &BTreeMap<String, String> {
        &self.durable.counters
    }

    pub fn set_counters(&mut self, counters: BTreeMap<String, String>) {
        self.durable.counters = counters;
    }

    /// Unconditionally insert or overwrite a single counter.
    pub fn replace_counter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.durable.counters.insert(key.into(), value.into());
    }

    /// File path → byte size bookkeeping. Not persisted.
    pub fn file_map(&self) -> &BTreeMap<String, u64> {
        &self.runtime.file_map
    }

    pub fn set_file_map(&mut self, file_map: BTreeMap<String, u64>) {
        self.runtime.file_map = file_map;
    }

    /// Merge file-size entries into the map, overwriting on collision.
    pub fn add_all_file_map(&mut self, entries: BTreeMap<String, u64>) {
        self.runtime.file_map.extend(entries);
    }

    pub fn progress(&self) -> u8 {
        self.runtime.progress
    }

    /// Store a progress value as given. 0-100 by convention, not enforced.
    pub fn set_progress(&mut self, progress: u8) {
        self.runtime.progress = progress;
    }

    /// Failure message; empty while no failure has been recorded.
    pub fn fail_msg(&self) -> &str {
        &self.runtime.fail_msg
    }

    pub fn set_fail_msg(&mut self, msg: impl Into<String>) {
        self.runtime.fail_msg = msg.into();
    }

    /// Detailed engine output, carried but never interpreted here.
    pub fn engine_result(&self) -> Option<&EngineResult> {
        self.runtime.engine_result.as_ref()
    }

    pub fn set_engine_result(&mut self, result: Option<EngineResult>) {
        self.runtime.engine_result = result;
    }

    /// Clear all metric state for a from-scratch retry.
    ///
    /// Stats, counters, table counters and the file map are emptied; progress,
    /// failure message and engine result return to their initial values.
    /// `state` and `tracking_url` are untouched. Idempotent.
    pub fn reset(&mut self) {
        self.durable.stats.clear();
        self.durable.counters.clear();
        self.lock_table_counters().clear();
        self.runtime.file_map.clear();
        self.runtime.progress = 0;
        self.runtime.fail_msg.clear();
        self.runtime.engine_result = None;
    }

    // -----------------------------------------------------------------------
    // Reporter surface
    // -----------------------------------------------------------------------

    /// Add `delta` to the counter `key` of `table_id`, creating the nested
    /// map and the counter (at 0) on first use.
    ///
    /// Safe under concurrent invocation from any number of reporter threads;
    /// the read-modify-write is atomic as an observable unit. Negative deltas
    /// are accepted and simply reduce the total.
    pub fn increase_table_counter(&self, table_id: TableId, key: &str, delta: i64) {
        let mut tables = self.lock_table_counters();
        let counters = tables.entry(table_id).or_default();
        *counters.entry(key.to_string()).or_insert(0) += delta;
    }

    /// Visit every `(table, counters)` entry under the counter lock.
    ///
    /// Traversal is mutually exclusive with [`increase_table_counter`], so
    /// the visitor observes a consistent snapshot: no torn entries, no
    /// concurrent structural modification. Keep the visitor short; reporters
    /// block while it runs.
    ///
    /// [`increase_table_counter`]: LoadStatus::increase_table_counter
    pub fn for_each_table_counter<F>(&self, mut f: F)
    where
        F: FnMut(TableId, &BTreeMap<String, i64>),
    {
        let tables = self.lock_table_counters();
        for (table_id, counters) in tables.iter() {
            f(*table_id, counters);
        }
    }

    /// Read a single table counter under the lock.
    pub fn table_counter(&self, table_id: TableId, key: &str) -> Option<i64> {
        self.lock_table_counters()
            .get(&table_id)
            .and_then(|counters| counters.get(key))
            .copied()
    }

    fn lock_table_counters(&self) -> MutexGuard<'_, TableCounters> {
        match self.runtime.table_counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // Map ops don't tear, so the data behind a poisoned lock is
                // still whole; recover rather than drop increments.
                tracing::error!("table counter mutex poisoned, recovering: {poisoned}");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for LoadStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Semantic "same reported summary" equality: lifecycle state, tracking URL,
/// stats and counters. Table counters, the file map, progress, the failure
/// message and the engine result are deliberately excluded.
impl PartialEq for LoadStatus {
    fn eq(&self, other: &Self) -> bool {
        self.durable == other.durable
    }
}

impl Eq for LoadStatus {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_defaults() {
        let status = LoadStatus::new();
        assert_eq!(status.state(), LoadState::Running);
        assert_eq!(status.tracking_url(), DEFAULT_TRACKING_URL);
        assert!(status.stats().is_empty());
        assert!(status.counters().is_empty());
        assert!(status.file_map().is_empty());
        assert_eq!(status.progress(), 0);
        assert_eq!(status.fail_msg(), "");
        assert!(status.engine_result().is_none());
    }

    #[test]
    fn test_state_latch_is_one_way() {
        let mut status = LoadStatus::new();
        assert!(status.try_set_state(LoadState::Finished));
        assert_eq!(status.state(), LoadState::Finished);

        // A late cancellation must not win.
        assert!(!status.try_set_state(LoadState::Cancelled));
        assert_eq!(status.state(), LoadState::Finished);
        assert!(!status.try_set_state(LoadState::Running));
        assert_eq!(status.state(), LoadState::Finished);
    }

    #[test]
    fn test_tracking_url_never_absent() {
        let mut status = LoadStatus::new();
        status.set_tracking_url(Some("http://worker-3:8080/job/17"));
        assert_eq!(status.tracking_url(), "http://worker-3:8080/job/17");

        status.set_tracking_url(None::<String>);
        assert_eq!(status.tracking_url(), "");
    }

    #[test]
    fn test_replace_counter_upserts() {
        let mut status = LoadStatus::new();
        status.replace_counter("dpp.norm.ALL", "100");
        status.replace_counter("dpp.norm.ALL", "250");
        assert_eq!(
            status.counters().get("dpp.norm.ALL").map(String::as_str),
            Some("250")
        );
    }

    #[test]
    fn test_table_counter_accumulates() {
        let status = LoadStatus::new();
        status.increase_table_counter(1, "loaded_rows", 100);
        status.increase_table_counter(1, "loaded_rows", 100);
        assert_eq!(status.table_counter(1, "loaded_rows"), Some(200));
        assert_eq!(status.table_counter(1, "filtered_rows"), None);
        assert_eq!(status.table_counter(2, "loaded_rows"), None);
    }

    #[test]
    fn test_negative_delta_reduces_total() {
        let status = LoadStatus::new();
        status.increase_table_counter(7, "rows", 10);
        status.increase_table_counter(7, "rows", -25);
        assert_eq!(status.table_counter(7, "rows"), Some(-15));
    }

    #[test]
    fn test_for_each_table_counter_visits_all_tables() {
        let status = LoadStatus::new();
        status.increase_table_counter(1, "rows", 5);
        status.increase_table_counter(2, "rows", 7);
        status.increase_table_counter(2, "bytes", 4096);

        let mut seen = Vec::new();
        status.for_each_table_counter(|table_id, counters| {
            seen.push((table_id, counters.len()));
        });
        assert_eq!(seen, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_file_map_merge_overwrites_on_collision() {
        let mut status = LoadStatus::new();
        status.add_all_file_map(BTreeMap::from([
            ("part-0".to_string(), 100u64),
            ("part-1".to_string(), 200u64),
        ]));
        status.add_all_file_map(BTreeMap::from([
            ("part-1".to_string(), 250u64),
            ("part-2".to_string(), 300u64),
        ]));
        assert_eq!(status.file_map().len(), 3);
        assert_eq!(status.file_map().get("part-1"), Some(&250));
    }

    #[test]
    fn test_reset_clears_metrics_keeps_identity() {
        let mut status = LoadStatus::new();
        assert!(status.try_set_state(LoadState::Cancelled));
        status.set_tracking_url(Some("http://tracker/1"));
        status.set_stats(BTreeMap::from([("rows".to_string(), "10".to_string())]));
        status.replace_counter("c", "1");
        status.increase_table_counter(3, "rows", 42);
        status.add_all_file_map(BTreeMap::from([("f".to_string(), 1u64)]));
        status.set_progress(80);
        status.set_fail_msg("user cancelled");
        status.set_engine_result(Some(EngineResult::default()));

        status.reset();

        assert!(status.stats().is_empty());
        assert!(status.counters().is_empty());
        assert_eq!(status.table_counter(3, "rows"), None);
        assert!(status.file_map().is_empty());
        assert_eq!(status.progress(), 0);
        assert_eq!(status.fail_msg(), "");
        assert!(status.engine_result().is_none());
        // Identity survives.
        assert_eq!(status.state(), LoadState::Cancelled);
        assert_eq!(status.tracking_url(), "http://tracker/1");
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut status = LoadStatus::new();
        status.set_progress(30);
        status.increase_table_counter(1, "rows", 9);

        status.reset();
        status.reset();

        assert_eq!(status.progress(), 0);
        assert_eq!(status.table_counter(1, "rows"), None);
        assert_eq!(status.state(), LoadState::Running);
    }

    #[test]
    fn test_equality_ignores_runtime_fields() {
        let mut a = LoadStatus::new();
        let mut b = LoadStatus::new();
        a.set_stats(BTreeMap::from([("k".to_string(), "v".to_string())]));
        b.set_stats(BTreeMap::from([("k".to_string(), "v".to_string())]));

        // Diverge only in runtime bookkeeping.
        a.increase_table_counter(1, "rows", 100);
        a.set_progress(90);
        a.set_fail_msg("transient");
        assert_eq!(a, b);

        // Diverge in a durable field.
        b.replace_counter("c", "1");
        assert_ne!(a, b);
    }
}
