//! Subscription response job.

use serde::{Deserialize, Serialize};

/// Job to send an `Accept` or `Reject` to a server that asked to subscribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterJob {
    /// Inbox of the subscribing server.
    pub inbox: String,

    /// Response activity JSON.
    pub activity: serde_json::Value,
}

impl RegisterJob {
    /// Create a new register job.
    #[must_use]
    pub const fn new(inbox: String, activity: serde_json::Value) -> Self {
        Self { inbox, activity }
    }

    /// The `type` of the response activity, if present.
    #[must_use]
    pub fn response_type(&self) -> Option<&str> {
        self.activity.get("type").and_then(serde_json::Value::as_str)
    }
}
