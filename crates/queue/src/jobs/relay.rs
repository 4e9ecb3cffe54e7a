//! Relay fan-out job.

use serde::{Deserialize, Serialize};

/// Job to forward an activity to one subscriber inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayJob {
    /// Target inbox URL.
    pub inbox: String,

    /// Activity JSON to forward.
    pub activity: serde_json::Value,
}

impl RelayJob {
    /// Create a new relay job.
    #[must_use]
    pub const fn new(inbox: String, activity: serde_json::Value) -> Self {
        Self { inbox, activity }
    }
}
