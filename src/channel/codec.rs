use serde_json::Value;
use tracing::debug;

use super::messages::{ChannelMessage, DataMessage, InboundMessage, Topic};
use crate::capture::OutboundFrame;
use crate::error::PublishError;
use crate::location::LocationSample;

/// Wrap a structured message under `topic`.
pub fn encode_message(message: &DataMessage, topic: Topic) -> Result<ChannelMessage, PublishError> {
    let payload = serde_json::to_vec(message)?;
    Ok(ChannelMessage { topic, payload })
}

/// `{"type":"location","data":{...}}` on `user-location`
pub fn encode_location(sample: LocationSample) -> Result<ChannelMessage, PublishError> {
    encode_message(&DataMessage::Location { data: sample }, Topic::UserLocation)
}

/// Raw JPEG bytes on `camera-frame`
pub fn encode_frame(frame: OutboundFrame) -> ChannelMessage {
    ChannelMessage {
        topic: Topic::CameraFrame,
        payload: frame.bytes,
    }
}

/// Decode an inbound payload.
///
/// Structured decoding is tried first. Anything that is not a JSON object is
/// reported as [`InboundMessage::Raw`]; decoding never fails.
pub fn decode(topic: Option<&str>, payload: &[u8]) -> InboundMessage {
    let topic = topic.map(Topic::parse);

    let value = match serde_json::from_slice::<Value>(payload) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            return InboundMessage::Raw {
                topic,
                len: payload.len(),
            }
        }
    };

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);

    match serde_json::from_value::<DataMessage>(value) {
        Ok(DataMessage::AgentSpeech { text }) => InboundMessage::AgentSpeech { text },
        Ok(DataMessage::Location { data }) => InboundMessage::Location(data),
        Err(e) => {
            debug!("Unrecognized data message (type={:?}): {}", kind, e);
            InboundMessage::Unrecognized { kind }
        }
    }
}
