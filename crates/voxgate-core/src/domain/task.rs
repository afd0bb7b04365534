//! Outcomes reported by the cancellable task registry.

use serde::{Deserialize, Serialize};

/// Result of a stop request for a correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    /// The task was live and has been asked to stop.
    Cancelling,
    /// The task finished before the stop arrived.
    AlreadyDone,
    /// Nothing is or recently was registered under this id.
    NotFound,
}

impl StopStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelling => "cancelling",
            Self::AlreadyDone => "already_done",
            Self::NotFound => "not_found",
        }
    }
}
