//! Index lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observable state of the live vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// No vectors are searchable.
    Empty,
    /// A rebuild is in progress; queries use the previous snapshot.
    Building,
    /// A non-empty snapshot is installed.
    Ready,
}

impl IndexState {
    /// Returns the state as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Building => "building",
            Self::Ready => "ready",
        }
    }
}

/// Status report for the live index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Current state.
    pub state: IndexState,
    /// Entries in the installed snapshot.
    pub entries: usize,
    /// Records skipped by the last successful build.
    pub excluded: usize,
    /// Vector dimensionality.
    pub dimensions: usize,
    /// Number of snapshots installed since startup.
    pub generation: u64,
    /// When the installed snapshot was built.
    pub built_at: Option<DateTime<Utc>>,
    /// Error from the most recent failed rebuild, cleared on success.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&IndexState::Building).unwrap(),
            "\"building\""
        );
        assert_eq!(IndexState::Ready.as_str(), "ready");
    }
}
