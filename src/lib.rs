pub mod capture;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod location;
pub mod notify;
pub mod session;
pub mod transcript;
pub mod transport;

pub use capture::{
    FacingMode, FrameSampler, SamplerConfig, StillImageSource, VideoFrame, VideoSource,
};
pub use channel::{ChannelMessage, DataMessage, InboundMessage, Topic};
pub use config::Config;
pub use credentials::{Credential, CredentialIssuer, LocalTokenIssuer};
pub use error::{CaptureError, ConnectError, CredentialError, PublishError, SessionClosed};
pub use http::{create_router, AppState};
pub use location::{FixedLocationProvider, LocationProvider, LocationSample, LocationTracker};
pub use notify::{Announcer, ClientEvent, LogAnnouncer};
pub use session::{
    Command, SessionConfig, SessionDeps, SessionHandle, SessionManager, SessionState, SessionStats,
};
pub use transcript::{Speaker, TranscriptEntry, TranscriptLog};
pub use transport::{LoopbackTransport, Transport, TransportEvent};
