use thiserror::Error;

/// Failure to obtain a credential for a connect attempt.
///
/// Feeds the same retry path as a transport connect failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// Issuer has no signing key/secret configured. The issuer fails closed.
    #[error("credential issuer is not configured: {0}")]
    Misconfigured(String),

    /// Room or participant identity was missing or malformed.
    #[error("invalid credential request: {0}")]
    InvalidParams(String),

    /// Token could not be signed.
    #[error("failed to sign credential: {0}")]
    Signing(String),

    /// Remote issuer could not be reached.
    #[error("credential issuer unavailable: {0}")]
    Unavailable(String),
}

/// The transport refused or failed to join the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to join session: {reason}")]
pub struct ConnectError {
    pub reason: String,
}

impl ConnectError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Camera or microphone could not be used. Never fatal to the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// A single outbound message failed to send. Logged and swallowed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("failed to encode payload: {0}")]
    Encode(String),

    #[error("transport rejected publish: {0}")]
    Transport(String),

    #[error("session is not connected")]
    NotConnected,
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

/// The session manager task is no longer running.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("session manager has stopped")]
pub struct SessionClosed;

/// Device position could not be watched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("location services unavailable: {0}")]
    Unavailable(String),
}
