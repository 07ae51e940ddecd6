use serde::{Deserialize, Serialize};

use super::backoff::BackoffPolicy;
use crate::transcript::DEFAULT_TRANSCRIPT_CAPACITY;

/// Configuration for the assistant session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Room shared with the assistant (e.g., "lookout-room")
    pub room: String,

    /// Media server URL
    pub endpoint: String,

    /// Prefix for generated participant identities ("user" → "user-3f9a1c2e")
    pub identity_prefix: String,

    /// Identities containing this marker belong to the assistant
    pub agent_identity_marker: String,

    /// Name used in status text and spoken feedback
    pub assistant_name: String,

    /// Consecutive failures before giving up
    /// Default: 5
    pub max_attempts: u32,

    /// First retry delay, doubled per attempt
    pub base_delay_ms: u64,

    /// Retry delay cap
    pub max_delay_ms: u64,

    /// Transcript entries kept on screen
    pub transcript_capacity: usize,
}

impl SessionConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.base_delay_ms, self.max_delay_ms, self.max_attempts)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room: "lookout-room".to_string(),
            endpoint: "ws://localhost:7880".to_string(),
            identity_prefix: "user".to_string(),
            agent_identity_marker: "agent".to_string(),
            assistant_name: "LookOut".to_string(),
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            transcript_capacity: DEFAULT_TRANSCRIPT_CAPACITY,
        }
    }
}
