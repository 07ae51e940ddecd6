// Shared harness for session integration tests
//
// Wires a SessionManager to the loopback transport, a scripted credential
// issuer, a still-image camera and a recording announcer.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use lookout_client::capture::{
    FacingMode, SamplerConfig, StillImageSource, VideoFrame, VideoSource,
};
use lookout_client::credentials::{Credential, CredentialIssuer};
use lookout_client::error::{CaptureError, CredentialError};
use lookout_client::location::LocationSample;
use lookout_client::notify::{ClientEvent, RecordingAnnouncer};
use lookout_client::session::{
    SessionConfig, SessionDeps, SessionHandle, SessionManager, SessionState, SessionStats,
};
use lookout_client::transport::LoopbackTransport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Issuer that replays scripted failures, then signs dummy tokens
#[derive(Default)]
pub struct ScriptedIssuer {
    failures: Mutex<VecDeque<CredentialError>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedIssuer {
    pub fn fail_next(&self, err: CredentialError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// (room, participant) for every request, in order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialIssuer for ScriptedIssuer {
    async fn issue(&self, room: &str, participant: &str) -> Result<Credential, CredentialError> {
        self.calls
            .lock()
            .unwrap()
            .push((room.to_string(), participant.to_string()));

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(Credential {
            token: format!("token-for-{}", participant),
            room: room.to_string(),
            identity: participant.to_string(),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        })
    }
}

/// Camera that records every call, with optional failing or slow starts
pub struct ScriptedCamera {
    calls: Mutex<Vec<String>>,
    capturing: Mutex<bool>,
    starts: Mutex<usize>,
    fail_starts: bool,
    /// (n, delay): the n-th start and every later one waits `delay`
    slow_from: Option<(usize, Duration)>,
}

impl ScriptedCamera {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            capturing: Mutex::new(false),
            starts: Mutex::new(0),
            fail_starts: false,
            slow_from: None,
        }
    }

    /// Every start fails as if permission was denied
    pub fn denied() -> Self {
        Self {
            fail_starts: true,
            ..Self::new()
        }
    }

    /// Starts from the `nth` (1-based) onwards take `delay`
    pub fn slow_from(nth: usize, delay: Duration) -> Self {
        Self {
            slow_from: Some((nth, delay)),
            ..Self::new()
        }
    }

    /// "stop" / "start:<facing>" in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoSource for ScriptedCamera {
    async fn start(&self, facing: FacingMode) -> Result<(), CaptureError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("start:{}", facing.label()));

        let nth = {
            let mut starts = self.starts.lock().unwrap();
            *starts += 1;
            *starts
        };
        if let Some((from, delay)) = self.slow_from {
            if nth >= from {
                tokio::time::sleep(delay).await;
            }
        }

        if self.fail_starts {
            return Err(CaptureError::CameraUnavailable("permission denied".into()));
        }
        *self.capturing.lock().unwrap() = true;
        Ok(())
    }

    async fn stop(&self) {
        self.calls.lock().unwrap().push("stop".to_string());
        *self.capturing.lock().unwrap() = false;
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        if self.is_capturing() {
            Some(VideoFrame::solid(4, 4, [200, 200, 200]))
        } else {
            None
        }
    }

    fn is_capturing(&self) -> bool {
        *self.capturing.lock().unwrap()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct Harness {
    pub handle: SessionHandle,
    pub transport: LoopbackTransport,
    pub issuer: Arc<ScriptedIssuer>,
    pub announcer: Arc<RecordingAnnouncer>,
    pub locations: mpsc::Sender<LocationSample>,
    pub events: broadcast::Receiver<ClientEvent>,
    pub task: JoinHandle<()>,
}

impl Harness {
    pub fn new() -> Self {
        let camera = StillImageSource::from_frame(VideoFrame::solid(8, 8, [90, 120, 200]));
        Self::with_camera(Arc::new(camera))
    }

    pub fn with_camera(video: Arc<dyn VideoSource>) -> Self {
        let (transport, transport_events) = LoopbackTransport::new();
        let (locations, location_rx) = mpsc::channel(16);
        let issuer = Arc::new(ScriptedIssuer::default());
        let announcer = Arc::new(RecordingAnnouncer::new());

        let deps = SessionDeps {
            issuer: issuer.clone(),
            transport: Arc::new(transport.clone()),
            transport_events,
            video,
            locations: location_rx,
            announcer: announcer.clone(),
        };

        let (manager, handle) = SessionManager::new(
            SessionConfig::default(),
            SamplerConfig::default(),
            FacingMode::Environment,
            deps,
        );
        let events = handle.subscribe();
        let task = manager.spawn();

        Self {
            handle,
            transport,
            issuer,
            announcer,
            locations,
            events,
            task,
        }
    }

    /// Wait until the published stats satisfy `pred`
    pub async fn wait_for<F>(&self, pred: F) -> SessionStats
    where
        F: FnMut(&SessionStats) -> bool,
    {
        let mut stats = self.handle.watch_stats();
        let result = tokio::time::timeout(Duration::from_secs(120), stats.wait_for(pred)).await;
        match result {
            Ok(Ok(stats)) => stats.clone(),
            Ok(Err(_)) => panic!("session manager stopped"),
            Err(_) => panic!("timed out; last stats: {:?}", self.handle.stats()),
        }
    }

    pub async fn wait_for_state(&self, state: SessionState) -> SessionStats {
        self.wait_for(|s| s.state == state).await
    }

    /// Drain state changes seen so far
    pub fn states_seen(&mut self) -> Vec<SessionState> {
        let mut states = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let ClientEvent::StateChanged { state, .. } = event {
                states.push(state);
            }
        }
        states
    }
}
