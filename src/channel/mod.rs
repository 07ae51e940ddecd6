pub mod codec;
pub mod messages;

pub use codec::{decode, encode_frame, encode_location, encode_message};
pub use messages::{ChannelMessage, DataMessage, InboundMessage, PublishOptions, Topic};
