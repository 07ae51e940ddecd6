use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Connection lifecycle of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Ready,
    Disconnected,
    Retrying,
    /// No automatic retries; left only by an explicit reconnect
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Disconnected => "disconnected",
            SessionState::Retrying => "retrying",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Retry bookkeeping, reset on every successful join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryContext {
    /// Index of the current retry cycle, starting at 0
    pub attempt: u32,
    /// Delay scheduled by the most recent failure
    pub last_delay: Option<Duration>,
}
