use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{Transport, TransportEvent};
use crate::channel::{ChannelMessage, PublishOptions};
use crate::credentials::Credential;
use crate::error::{CaptureError, ConnectError, PublishError};

/// Published messages kept by [`LoopbackTransport::new`]
pub const DEFAULT_HISTORY: usize = 256;

#[derive(Debug, Default)]
struct LoopbackState {
    connected: bool,
    connect_attempts: usize,
    last_credential: Option<Credential>,
    scripted_connects: VecDeque<Result<(), ConnectError>>,
    failing_publishes: usize,
    microphone_enabled: bool,
    microphone_error: Option<String>,
    /// Most recent publishes, at most `history` of them
    published: VecDeque<ChannelMessage>,
    history: usize,
    published_total: usize,
}

/// In-process transport
///
/// Records recent publishes and lets the caller inject remote events.
/// Connect attempts succeed unless a failure was scripted. Cloning yields
/// another handle to the same session. Nothing leaves the process.
#[derive(Clone)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
    events: mpsc::Sender<TransportEvent>,
}

impl LoopbackTransport {
    /// Create a transport and the receiver for its events
    pub fn new() -> (Self, mpsc::Receiver<TransportEvent>) {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Like [`LoopbackTransport::new`], keeping only the last `history`
    /// payloads. With 0 only counts are kept.
    pub fn with_history(history: usize) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (events, rx) = mpsc::channel(100);
        let state = LoopbackState {
            history,
            ..Default::default()
        };
        (
            Self {
                state: Arc::new(Mutex::new(state)),
                events,
            },
            rx,
        )
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        // State stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the outcome of the next connect attempt
    pub fn script_connect(&self, result: Result<(), ConnectError>) {
        self.lock().scripted_connects.push_back(result);
    }

    /// Make the next `count` publishes fail
    pub fn fail_publishes(&self, count: usize) {
        self.lock().failing_publishes = count;
    }

    /// Make enabling the microphone fail
    pub fn fail_microphone(&self, reason: impl Into<String>) {
        self.lock().microphone_error = Some(reason.into());
    }

    /// Deliver a remote event as the media engine would
    pub async fn inject(&self, event: TransportEvent) {
        if self.events.send(event).await.is_err() {
            warn!("Loopback event dropped: receiver closed");
        }
    }

    /// Simulate the session dropping
    pub async fn drop_session(&self, reason: impl Into<String>) {
        self.lock().connected = false;
        self.inject(TransportEvent::Disconnected {
            reason: reason.into(),
        })
        .await;
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }

    pub fn last_credential(&self) -> Option<Credential> {
        self.lock().last_credential.clone()
    }

    pub fn microphone_enabled(&self) -> bool {
        self.lock().microphone_enabled
    }

    /// Retained publishes, oldest first
    pub fn published(&self) -> Vec<ChannelMessage> {
        self.lock().published.iter().cloned().collect()
    }

    /// Successful publishes since creation, retained or not
    pub fn published_count(&self) -> usize {
        self.lock().published_total
    }

    /// Published messages on one topic
    pub fn published_on(&self, topic: &str) -> Vec<ChannelMessage> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.topic.as_str() == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self, endpoint: &str, credential: &Credential) -> Result<(), ConnectError> {
        let result = {
            let mut state = self.lock();
            state.connect_attempts += 1;
            state.last_credential = Some(credential.clone());

            let result = state.scripted_connects.pop_front().unwrap_or(Ok(()));
            state.connected = result.is_ok();
            result
        };

        match &result {
            Ok(()) => {
                info!(
                    "Loopback joined {} as {} (room {})",
                    endpoint, credential.identity, credential.room
                );
                self.inject(TransportEvent::Connected).await;
            }
            Err(e) => warn!("Loopback connect to {} failed: {}", endpoint, e),
        }

        result
    }

    async fn disconnect(&self) {
        let mut state = self.lock();
        state.connected = false;
        state.microphone_enabled = false;
    }

    async fn publish_data(
        &self,
        payload: &[u8],
        options: &PublishOptions,
    ) -> Result<(), PublishError> {
        let mut state = self.lock();

        if !state.connected {
            return Err(PublishError::NotConnected);
        }

        if state.failing_publishes > 0 {
            state.failing_publishes -= 1;
            return Err(PublishError::Transport("scripted publish failure".into()));
        }

        state.published_total += 1;
        if state.history == 0 {
            return Ok(());
        }
        if state.published.len() == state.history {
            state.published.pop_front();
        }
        state.published.push_back(ChannelMessage {
            topic: options.topic.clone(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), CaptureError> {
        let mut state = self.lock();
        if enabled {
            if let Some(reason) = state.microphone_error.clone() {
                return Err(CaptureError::MicrophoneUnavailable(reason));
            }
        }
        state.microphone_enabled = enabled;
        Ok(())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Topic;
    use chrono::Utc;

    fn credential() -> Credential {
        Credential {
            token: "token".into(),
            room: "lookout-room".into(),
            identity: "user-abc".into(),
            expires_at: Utc::now(),
        }
    }

    fn options(topic: Topic) -> PublishOptions {
        PublishOptions {
            reliable: true,
            topic,
        }
    }

    #[tokio::test]
    async fn connect_emits_connected_event() {
        let (transport, mut events) = LoopbackTransport::new();
        transport.connect("wss://example", &credential()).await.unwrap();

        assert_eq!(events.recv().await, Some(TransportEvent::Connected));
        assert!(transport.is_connected());
        assert_eq!(transport.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn scripted_failure_is_returned() {
        let (transport, _events) = LoopbackTransport::new();
        transport.script_connect(Err(ConnectError::new("room full")));

        let err = transport
            .connect("wss://example", &credential())
            .await
            .unwrap_err();
        assert_eq!(err.reason, "room full");
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn publish_requires_connection() {
        let (transport, _events) = LoopbackTransport::new();
        let err = transport
            .publish_data(b"{}", &options(Topic::UserLocation))
            .await
            .unwrap_err();
        assert_eq!(err, PublishError::NotConnected);
    }

    #[tokio::test]
    async fn records_publishes_by_topic() {
        let (transport, _events) = LoopbackTransport::new();
        transport.connect("wss://example", &credential()).await.unwrap();

        transport.fail_publishes(1);
        assert!(transport
            .publish_data(b"a", &options(Topic::CameraFrame))
            .await
            .is_err());

        transport
            .publish_data(b"b", &options(Topic::CameraFrame))
            .await
            .unwrap();
        transport
            .publish_data(b"c", &options(Topic::UserLocation))
            .await
            .unwrap();

        assert_eq!(transport.published().len(), 2);
        assert_eq!(transport.published_on("camera-frame")[0].payload, b"b");
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let (transport, _events) = LoopbackTransport::with_history(2);
        transport.connect("wss://example", &credential()).await.unwrap();

        for payload in [b"1", b"2", b"3"] {
            transport
                .publish_data(payload, &options(Topic::CameraFrame))
                .await
                .unwrap();
        }

        let kept: Vec<Vec<u8>> = transport.published().into_iter().map(|m| m.payload).collect();
        assert_eq!(kept, vec![b"2".to_vec(), b"3".to_vec()]);
        assert_eq!(transport.published_count(), 3);
    }

    #[tokio::test]
    async fn zero_history_keeps_counts_only() {
        let (transport, _events) = LoopbackTransport::with_history(0);
        transport.connect("wss://example", &credential()).await.unwrap();
        transport
            .publish_data(&[0xFF; 4096], &options(Topic::CameraFrame))
            .await
            .unwrap();

        assert!(transport.published().is_empty());
        assert_eq!(transport.published_count(), 1);
    }
}
