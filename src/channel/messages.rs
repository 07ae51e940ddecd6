use serde::{Deserialize, Serialize};
use std::fmt;

use crate::location::LocationSample;

/// Topic tag used to demultiplex data-channel messages
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// JPEG snapshots from the camera
    CameraFrame,
    /// Device position updates
    UserLocation,
    /// Any topic this client does not know about
    Other(String),
}

impl Topic {
    pub fn as_str(&self) -> &str {
        match self {
            Topic::CameraFrame => "camera-frame",
            Topic::UserLocation => "user-location",
            Topic::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "camera-frame" => Topic::CameraFrame,
            "user-location" => Topic::UserLocation,
            other => Topic::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery options passed to the transport with every publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Must arrive; may be retransmitted by the transport
    pub reliable: bool,
    pub topic: Topic,
}

/// Wire-level envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub topic: Topic,
    pub payload: Vec<u8>,
}

impl ChannelMessage {
    /// Every application message this client sends is reliable.
    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            reliable: true,
            topic: self.topic.clone(),
        }
    }
}

/// Structured (JSON) application messages carried on the data channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DataMessage {
    /// Spoken response text from the assistant
    AgentSpeech { text: String },

    /// Latest device position
    Location { data: LocationSample },
}

/// Result of decoding one inbound payload
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Assistant speech to append to the transcript
    AgentSpeech { text: String },

    /// Position echoed by another participant
    Location(LocationSample),

    /// JSON object whose `type` this client does not handle
    Unrecognized { kind: Option<String> },

    /// Payload that is not a JSON object (frame data, garbage, ...)
    Raw { topic: Option<Topic>, len: usize },
}
