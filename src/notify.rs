//! User-facing feedback
//!
//! Everything the UI renders arrives as a [`ClientEvent`] on a broadcast
//! channel. Spoken feedback goes through an [`Announcer`], the text-to-speech
//! collaborator of the host platform.

use std::sync::Mutex;
use tracing::info;

use crate::session::SessionState;
use crate::transcript::TranscriptEntry;

/// Events observed by the UI layer
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Connection state changed
    StateChanged {
        state: SessionState,
        attempt: u32,
    },

    /// Status line text ("Connecting...", "Reconnecting in 2s...")
    Status(String),

    /// An entry was appended to the transcript
    Transcript(TranscriptEntry),

    /// Camera or microphone problem. `None` clears the banner.
    CaptureError(Option<String>),

    /// Text that was spoken to the user
    Announcement(String),
}

/// Speaks short messages to the user
pub trait Announcer: Send + Sync {
    fn announce(&self, message: &str);
}

/// Announcer that only logs; used where no speech output exists
#[derive(Debug, Default)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, message: &str) {
        info!("🔊 {}", message);
    }
}

/// Announcer that remembers what it said
#[derive(Debug, Default)]
pub struct RecordingAnnouncer {
    spoken: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, message: &str) {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(message.to_string());
        }
    }
}
