use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::SessionState;
use crate::capture::FacingMode;

/// Statistics about the running client
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Current connection state
    pub state: SessionState,

    /// Current retry cycle (0 once connected)
    pub attempt: u32,

    /// Delay of the pending retry, if any
    pub retry_delay_ms: Option<u64>,

    /// When the client started
    pub started_at: DateTime<Utc>,

    /// Identity used for the latest connect attempt
    pub participant: Option<String>,

    /// Status line shown to the user
    pub status: String,

    pub frames_published: u64,

    /// Ticks that produced no frame (no data yet, or previous encode busy)
    pub frames_skipped: u64,

    pub locations_published: u64,

    pub publish_failures: u64,

    /// Number of entries currently in the transcript
    pub transcript_entries: usize,

    pub facing: FacingMode,

    /// Capture banner text, if a camera/microphone problem is active
    pub capture_error: Option<String>,
}

impl SessionStats {
    pub fn new(facing: FacingMode) -> Self {
        Self {
            state: SessionState::Idle,
            attempt: 0,
            retry_delay_ms: None,
            started_at: Utc::now(),
            participant: None,
            status: "Initializing...".to_string(),
            frames_published: 0,
            frames_skipped: 0,
            locations_published: 0,
            publish_failures: 0,
            transcript_entries: 0,
            facing,
            capture_error: None,
        }
    }
}
