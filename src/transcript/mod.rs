//! Bounded transcript of recent utterances
//!
//! Entries arrive from two places: native transcription events on the
//! transport and `agent-speech` messages on the data channel. Only the most
//! recent few are kept; the oldest is evicted first, in arrival order.

use serde::Serialize;
use std::collections::VecDeque;
use tokio::time::Instant;

/// Default number of entries kept on screen.
pub const DEFAULT_TRANSCRIPT_CAPACITY: usize = 5;

/// Who spoke an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

impl Speaker {
    /// Classify a participant identity.
    ///
    /// Identities containing `agent_marker` belong to the remote assistant.
    pub fn from_identity(identity: Option<&str>, agent_marker: &str) -> Self {
        match identity {
            Some(id) if !agent_marker.is_empty() && id.contains(agent_marker) => Speaker::Agent,
            _ => Speaker::User,
        }
    }
}

/// A single attributed utterance
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,

    /// When the entry was appended (monotonic, not serialized)
    #[serde(skip)]
    pub timestamp: Instant,
}

/// In-memory transcript with FIFO eviction
#[derive(Debug, Clone)]
pub struct TranscriptLog {
    entries: VecDeque<TranscriptEntry>,
    capacity: usize,
}

impl TranscriptLog {
    /// Create a log holding at most `capacity` entries (`capacity >= 1`).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an utterance, evicting the oldest entry when full.
    ///
    /// Blank text is ignored. Returns the appended entry.
    pub fn push(&mut self, speaker: Speaker, text: &str) -> Option<&TranscriptEntry> {
        if text.trim().is_empty() {
            return None;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(TranscriptEntry {
            speaker,
            text: text.to_string(),
            timestamp: Instant::now(),
        });

        self.entries.back()
    }

    /// Entries in arrival order, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TranscriptLog {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSCRIPT_CAPACITY)
    }
}
