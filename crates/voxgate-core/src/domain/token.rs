//! Credential health as seen by the token pool.

use std::time::Instant;

use serde::Serialize;

/// Health of one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenHealth {
    Available,
    /// Rate limited; selectable again once `until` has passed.
    CoolingDown { until: Instant },
    /// Permanently rejected upstream. Only an explicit reset brings it back.
    Exhausted,
}

impl TokenHealth {
    /// Status label used in snapshots and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::CoolingDown { .. } => "cooling_down",
            Self::Exhausted => "exhausted",
        }
    }
}

/// What an upstream call told us about the credential it used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSignal {
    Success,
    RateLimited,
    Rejected,
}
