// crates/core/src/state.rs
//! Lifecycle states for a bulk-load job.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a load job.
///
/// A job starts in `Running` and latches into exactly one terminal state via
/// [`LoadStatus::try_set_state`](crate::status::LoadStatus::try_set_state).
/// There is no path back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadState {
    Running,
    Finished,
    Cancelled,
}

impl LoadState {
    /// Symbolic name, exactly as written to the durable encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Running => "RUNNING",
            LoadState::Finished => "FINISHED",
            LoadState::Cancelled => "CANCELLED",
        }
    }

    /// Parse a symbolic name. Unknown names return `None`.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(LoadState::Running),
            "FINISHED" => Some(LoadState::Finished),
            "CANCELLED" => Some(LoadState::Cancelled),
            _ => None,
        }
    }

    /// True for any state other than `Running`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_name_round_trip() {
        for state in [LoadState::Running, LoadState::Finished, LoadState::Cancelled] {
            assert_eq!(LoadState::parse_str(state.as_str()), Some(state));
        }
    }

    #[test]
    fn test_parse_str_rejects_unknown_names() {
        assert_eq!(LoadState::parse_str("PAUSED"), None);
        assert_eq!(LoadState::parse_str("running"), None);
        assert_eq!(LoadState::parse_str(""), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!LoadState::Running.is_terminal());
        assert!(LoadState::Finished.is_terminal());
        assert!(LoadState::Cancelled.is_terminal());
    }

    #[test]
    fn test_serde_names_match_wire_names() {
        let json = serde_json::to_string(&LoadState::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
        let back: LoadState = serde_json::from_str("\"FINISHED\"").unwrap();
        assert_eq!(back, LoadState::Finished);
    }
}
