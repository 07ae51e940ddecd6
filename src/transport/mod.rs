//! Real-time transport abstraction
//!
//! The media engine (signalling, NAT traversal, audio/video encoding) lives
//! outside this crate. It is consumed through the [`Transport`] trait plus a
//! stream of [`TransportEvent`]s delivered on a channel created alongside the
//! transport.

mod loopback;

use async_trait::async_trait;

use crate::channel::PublishOptions;
use crate::credentials::Credential;
use crate::error::{CaptureError, ConnectError, PublishError};

pub use loopback::LoopbackTransport;

/// Media kind of a subscribed remote track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// One piece of recognized speech from the transport's transcription feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionSegment {
    pub text: String,
}

impl TranscriptionSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Callbacks from the transport, as values
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Session joined
    Connected,

    /// Session dropped. A lifecycle signal, not an error.
    Disconnected { reason: String },

    /// A remote participant's track became available
    TrackSubscribed {
        kind: TrackKind,
        participant: String,
    },

    /// Native transcription for a participant's speech
    TranscriptionReceived {
        segments: Vec<TranscriptionSegment>,
        participant: Option<String>,
    },

    /// Data-channel payload from a remote participant
    DataReceived {
        payload: Vec<u8>,
        participant: Option<String>,
        topic: Option<String>,
    },
}

/// Capability set of the real-time session
#[async_trait]
pub trait Transport: Send + Sync {
    /// Join the session at `endpoint` using `credential`
    async fn connect(&self, endpoint: &str, credential: &Credential) -> Result<(), ConnectError>;

    /// Leave the session. Safe to call when not connected.
    async fn disconnect(&self);

    /// Publish a data-channel payload on behalf of the local participant
    async fn publish_data(
        &self,
        payload: &[u8],
        options: &PublishOptions,
    ) -> Result<(), PublishError>;

    /// Start or stop publishing the local microphone
    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), CaptureError>;

    /// Get transport name for logging
    fn name(&self) -> &str;
}
