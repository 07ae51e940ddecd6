use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::machine::{Effect, MachineEvent, SessionMachine};
use super::state::SessionState;
use super::stats::SessionStats;
use crate::capture::{
    encode_jpeg, FacingMode, FrameSampler, OutboundFrame, SamplerConfig, VideoSource,
};
use crate::channel::{self, ChannelMessage, InboundMessage, Topic};
use crate::credentials::{generate_identity, CredentialIssuer};
use crate::error::{CaptureError, SessionClosed};
use crate::location::{LocationSample, LocationTracker};
use crate::notify::{Announcer, ClientEvent};
use crate::transcript::{Speaker, TranscriptEntry, TranscriptLog};
use crate::transport::{TrackKind, Transport, TransportEvent};

/// Banner shown when the camera cannot be opened
const CAMERA_ERROR_BANNER: &str = "Unable to access camera";

/// Collaborators the session manager drives
pub struct SessionDeps {
    pub issuer: Arc<dyn CredentialIssuer>,
    pub transport: Arc<dyn Transport>,
    /// Events from `transport`
    pub transport_events: mpsc::Receiver<TransportEvent>,
    pub video: Arc<dyn VideoSource>,
    /// Position watch, already running
    pub locations: mpsc::Receiver<LocationSample>,
    pub announcer: Arc<dyn Announcer>,
}

/// Requests from the UI or control API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Reconnect,
    FlipCamera,
}

/// Completions posted back into the event loop by spawned work
#[derive(Debug)]
enum Input {
    ConnectFinished {
        attempt_id: u64,
        result: Result<(), String>,
    },
    BackoffElapsed {
        timer_id: u64,
    },
    FrameTick {
        epoch: u64,
    },
    FrameEncoded {
        epoch: u64,
        result: Result<OutboundFrame, CaptureError>,
    },
    Published {
        topic: Topic,
        ok: bool,
    },
    MicrophoneFailed(CaptureError),
    CameraStarted {
        generation: u64,
        facing: FacingMode,
        result: Result<(), CaptureError>,
    },
}

/// Camera (re)configuration handed to the camera task
#[derive(Debug, Clone, Copy)]
struct CameraRequest {
    generation: u64,
    facing: FacingMode,
}

/// Cloneable handle for talking to a running [`SessionManager`]
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ClientEvent>,
    stats: watch::Receiver<SessionStats>,
    transcript: watch::Receiver<Vec<TranscriptEntry>>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    pub async fn send(&self, command: Command) -> Result<(), SessionClosed> {
        self.commands.send(command).await.map_err(|_| SessionClosed)
    }

    /// Start the session. No-op unless idle.
    pub async fn start(&self) -> Result<(), SessionClosed> {
        self.send(Command::Start).await
    }

    /// Explicit reconnect; the only way out of `Failed`
    pub async fn reconnect(&self) -> Result<(), SessionClosed> {
        self.send(Command::Reconnect).await
    }

    /// Switch between front and back camera
    pub async fn flip_camera(&self) -> Result<(), SessionClosed> {
        self.send(Command::FlipCamera).await
    }

    /// Subscribe to UI events
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Current statistics
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }

    /// Watch statistics as they change
    pub fn watch_stats(&self) -> watch::Receiver<SessionStats> {
        self.stats.clone()
    }

    /// Current transcript, oldest first
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.borrow().clone()
    }

    /// Stop the manager; it disconnects and releases capture on the way out
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Single actor owning the session state
///
/// Every state change happens inside [`SessionManager::run`], one event at a
/// time. Credential fetches, connects, camera restarts, frame encodes and
/// publishes run as separate tasks that post their completion back into the
/// loop.
pub struct SessionManager {
    config: SessionConfig,
    machine: SessionMachine,
    transcript: TranscriptLog,
    tracker: LocationTracker,
    sampler: FrameSampler,
    facing: FacingMode,

    issuer: Arc<dyn CredentialIssuer>,
    transport: Arc<dyn Transport>,
    video: Arc<dyn VideoSource>,
    announcer: Arc<dyn Announcer>,

    transport_events: mpsc::Receiver<TransportEvent>,
    locations: mpsc::Receiver<LocationSample>,
    commands: mpsc::Receiver<Command>,
    inputs_tx: mpsc::Sender<Input>,
    inputs_rx: mpsc::Receiver<Input>,

    /// At most one armed backoff timer
    retry_timer: Option<JoinHandle<()>>,
    /// At most one frame being encoded
    encode_in_flight: bool,

    camera_requests: mpsc::UnboundedSender<CameraRequest>,
    camera_rx: Option<mpsc::UnboundedReceiver<CameraRequest>>,
    camera_task: Option<JoinHandle<()>>,
    /// Bumped per camera request; older completions are stale
    camera_generation: u64,

    stats: SessionStats,
    stats_tx: watch::Sender<SessionStats>,
    transcript_tx: watch::Sender<Vec<TranscriptEntry>>,
    events: broadcast::Sender<ClientEvent>,
    shutdown: CancellationToken,
}

impl SessionManager {
    /// Create a manager and the handle used to control it
    pub fn new(
        config: SessionConfig,
        sampler: SamplerConfig,
        facing: FacingMode,
        deps: SessionDeps,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::channel(16);
        let (inputs_tx, inputs_rx) = mpsc::channel(100);
        let (events, _) = broadcast::channel(64);
        let (camera_requests, camera_rx) = mpsc::unbounded_channel();

        let stats = SessionStats::new(facing);
        let (stats_tx, stats_rx) = watch::channel(stats.clone());
        let (transcript_tx, transcript_rx) = watch::channel(Vec::new());
        let shutdown = CancellationToken::new();

        let handle = SessionHandle {
            commands: commands_tx,
            events: events.clone(),
            stats: stats_rx,
            transcript: transcript_rx,
            shutdown: shutdown.clone(),
        };

        let manager = Self {
            machine: SessionMachine::new(config.backoff(), config.assistant_name.clone()),
            transcript: TranscriptLog::new(config.transcript_capacity),
            tracker: LocationTracker::new(),
            sampler: FrameSampler::new(sampler),
            facing,
            issuer: deps.issuer,
            transport: deps.transport,
            video: deps.video,
            announcer: deps.announcer,
            transport_events: deps.transport_events,
            locations: deps.locations,
            commands,
            inputs_tx,
            inputs_rx,
            retry_timer: None,
            encode_in_flight: false,
            camera_requests,
            camera_rx: Some(camera_rx),
            camera_task: None,
            camera_generation: 0,
            stats,
            stats_tx,
            transcript_tx,
            events,
            shutdown,
            config,
        };

        (manager, handle)
    }

    /// Run on a new task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Event loop. Returns after shutdown, once resources are released.
    pub async fn run(mut self) {
        info!(
            "Session manager started (room={}, endpoint={})",
            self.config.room, self.config.endpoint
        );

        if let Some(requests) = self.camera_rx.take() {
            self.camera_task = Some(tokio::spawn(run_camera(
                Arc::clone(&self.video),
                requests,
                self.inputs_tx.clone(),
            )));
        }
        self.acquire_camera();
        self.publish_stats();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                Some(input) = self.inputs_rx.recv() => self.on_input(input),

                Some(command) = self.commands.recv() => self.on_command(command),

                Some(event) = self.transport_events.recv() => self.on_transport_event(event),

                Some(sample) = self.locations.recv() => self.on_location(sample),
            }

            self.publish_stats();
        }

        self.teardown().await;
    }

    fn on_command(&mut self, command: Command) {
        debug!("Command: {:?}", command);
        match command {
            Command::Start => self.dispatch(MachineEvent::Start),
            Command::Reconnect => self.dispatch(MachineEvent::Reconnect),
            Command::FlipCamera => self.flip_camera(),
        }
    }

    fn on_input(&mut self, input: Input) {
        match input {
            Input::ConnectFinished { attempt_id, result } => match result {
                Ok(()) => self.dispatch(MachineEvent::Joined {
                    attempt_id: Some(attempt_id),
                }),
                Err(reason) => self.dispatch(MachineEvent::JoinFailed { attempt_id, reason }),
            },

            Input::BackoffElapsed { timer_id } => {
                self.retry_timer = None;
                self.dispatch(MachineEvent::BackoffElapsed { timer_id });
            }

            Input::FrameTick { epoch } => self.on_frame_tick(epoch),

            Input::FrameEncoded { epoch, result } => self.on_frame_encoded(epoch, result),

            Input::Published { topic, ok } => {
                if !ok {
                    self.stats.publish_failures += 1;
                    return;
                }
                match topic {
                    Topic::CameraFrame => self.stats.frames_published += 1,
                    Topic::UserLocation => self.stats.locations_published += 1,
                    Topic::Other(_) => {}
                }
            }

            Input::MicrophoneFailed(e) => {
                self.report_capture_error(&e, "Unable to access microphone")
            }

            Input::CameraStarted {
                generation,
                facing,
                result,
            } => self.on_camera_started(generation, facing, result),
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("Transport reports session joined");
                self.dispatch(MachineEvent::Joined { attempt_id: None });
            }

            TransportEvent::Disconnected { reason } => {
                info!("Transport reports session dropped: {}", reason);
                self.dispatch(MachineEvent::Dropped { reason });
            }

            TransportEvent::TrackSubscribed { kind, participant } => {
                info!("Track subscribed: {:?} from {}", kind, participant);
                if kind == TrackKind::Audio && self.is_agent(Some(participant.as_str())) {
                    info!("Agent audio track subscribed");
                }
            }

            TransportEvent::TranscriptionReceived {
                segments,
                participant,
            } => {
                let speaker =
                    Speaker::from_identity(participant.as_deref(), &self.config.agent_identity_marker);
                for segment in segments {
                    self.append_transcript(speaker, &segment.text);
                }
            }

            TransportEvent::DataReceived {
                payload,
                participant,
                topic,
            } => match channel::decode(topic.as_deref(), &payload) {
                InboundMessage::AgentSpeech { text } => {
                    self.append_transcript(Speaker::Agent, &text);
                }
                InboundMessage::Location(sample) => {
                    debug!("Ignoring location from {:?}: {:?}", participant, sample);
                }
                InboundMessage::Unrecognized { kind } => {
                    debug!("Ignoring data message of type {:?}", kind);
                }
                InboundMessage::Raw { topic, len } => {
                    debug!("Ignoring {} raw bytes on {:?}", len, topic);
                }
            },
        }
    }

    fn on_location(&mut self, sample: LocationSample) {
        self.tracker.update(sample);

        if self.machine.state() == SessionState::Ready {
            self.publish_location(sample);
        } else {
            debug!("Location updated while {}; not published", self.machine.state());
        }
    }

    fn on_frame_tick(&mut self, epoch: u64) {
        if !self.is_sampling(epoch) {
            debug!("Discarding frame tick from ready period {}", epoch);
            return;
        }

        if self.encode_in_flight {
            self.stats.frames_skipped += 1;
            debug!("Previous frame still encoding; skipping tick");
            return;
        }

        let Some(frame) = self.video.latest_frame() else {
            self.stats.frames_skipped += 1;
            debug!("No video frame ready; skipping tick");
            return;
        };

        self.encode_in_flight = true;
        let quality = self.sampler.config().jpeg_quality;
        let tx = self.inputs_tx.clone();

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || encode_jpeg(&frame, quality))
                .await
                .unwrap_or_else(|e| Err(CaptureError::Encode(e.to_string())));
            let _ = tx.send(Input::FrameEncoded { epoch, result }).await;
        });
    }

    fn on_frame_encoded(&mut self, epoch: u64, result: Result<OutboundFrame, CaptureError>) {
        if epoch == self.machine.ready_epoch() {
            self.encode_in_flight = false;
        }

        if !self.is_sampling(epoch) {
            debug!("Discarding frame encoded for ready period {}", epoch);
            return;
        }

        match result {
            Ok(frame) => self.publish(channel::encode_frame(frame)),
            Err(e) => error!("Error capturing frame: {}", e),
        }
    }

    /// Feed the state machine and run what it asks for.
    fn dispatch(&mut self, event: MachineEvent) {
        let effects = self.machine.handle(event);
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Transition { from, to, retry } => {
                info!("Session {} → {} (attempt {})", from, to, retry.attempt);
                self.stats.state = to;
                self.stats.attempt = retry.attempt;
                self.stats.retry_delay_ms = retry.last_delay.map(|d| d.as_millis() as u64);
                self.emit(ClientEvent::StateChanged {
                    state: to,
                    attempt: retry.attempt,
                });
            }

            Effect::BeginConnect { attempt_id } => self.begin_connect(attempt_id),

            Effect::ScheduleRetry { timer_id, delay } => {
                self.cancel_retry_timer();
                info!("Retrying in {}ms", delay.as_millis());

                let tx = self.inputs_tx.clone();
                self.retry_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Input::BackoffElapsed { timer_id }).await;
                }));
            }

            Effect::CancelRetry => self.cancel_retry_timer(),

            Effect::StartSampler { epoch } => {
                self.encode_in_flight = false;
                self.sampler
                    .activate(self.inputs_tx.clone(), move || Input::FrameTick { epoch });
            }

            Effect::StopSampler => {
                self.sampler.deactivate();
                self.encode_in_flight = false;
            }

            Effect::EnableMicrophone => {
                let transport = Arc::clone(&self.transport);
                let tx = self.inputs_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = transport.set_microphone_enabled(true).await {
                        let _ = tx.send(Input::MicrophoneFailed(e)).await;
                    }
                });
            }

            Effect::PublishLastLocation => {
                if let Some(sample) = self.tracker.current() {
                    self.publish_location(sample);
                }
            }

            Effect::Status(text) => {
                self.stats.status = text.clone();
                self.emit(ClientEvent::Status(text));
            }

            Effect::Announce(text) => self.announce(&text),
        }
    }

    fn begin_connect(&mut self, attempt_id: u64) {
        let identity = generate_identity(&self.config.identity_prefix);
        self.stats.participant = Some(identity.clone());

        let issuer = Arc::clone(&self.issuer);
        let transport = Arc::clone(&self.transport);
        let room = self.config.room.clone();
        let endpoint = self.config.endpoint.clone();
        let tx = self.inputs_tx.clone();

        info!("Connect attempt {} as {}", attempt_id, identity);

        tokio::spawn(async move {
            let result = match issuer.issue(&room, &identity).await {
                Ok(credential) => transport
                    .connect(&endpoint, &credential)
                    .await
                    .map_err(|e| {
                        warn!("Connect attempt {} failed: {}", attempt_id, e);
                        e.to_string()
                    }),
                Err(e) => {
                    warn!("Credential request for attempt {} failed: {}", attempt_id, e);
                    Err(e.to_string())
                }
            };

            let _ = tx.send(Input::ConnectFinished { attempt_id, result }).await;
        });
    }

    fn cancel_retry_timer(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }

    fn is_sampling(&self, epoch: u64) -> bool {
        self.machine.state() == SessionState::Ready
            && self.machine.ready_epoch() == epoch
            && self.sampler.is_active()
    }

    fn is_agent(&self, identity: Option<&str>) -> bool {
        Speaker::from_identity(identity, &self.config.agent_identity_marker) == Speaker::Agent
    }

    fn publish_location(&self, sample: LocationSample) {
        match channel::encode_location(sample) {
            Ok(message) => self.publish(message),
            Err(e) => error!("Failed to encode location: {}", e),
        }
    }

    /// Fire-and-forget publish; failures are logged and counted only.
    fn publish(&self, message: ChannelMessage) {
        let transport = Arc::clone(&self.transport);
        let tx = self.inputs_tx.clone();

        tokio::spawn(async move {
            let options = message.publish_options();
            let ok = match transport.publish_data(&message.payload, &options).await {
                Ok(()) => true,
                Err(e) => {
                    error!("Failed to publish on {}: {}", options.topic, e);
                    false
                }
            };
            let _ = tx.send(Input::Published {
                topic: options.topic,
                ok,
            })
            .await;
        });
    }

    fn append_transcript(&mut self, speaker: Speaker, text: &str) {
        if let Some(entry) = self.transcript.push(speaker, text).cloned() {
            debug!("Transcript {:?}: {}", entry.speaker, entry.text);
            self.stats.transcript_entries = self.transcript.len();
            self.transcript_tx.send_replace(self.transcript.snapshot());
            self.emit(ClientEvent::Transcript(entry));
        }
    }

    fn flip_camera(&mut self) {
        self.facing = self.facing.flipped();
        self.stats.facing = self.facing;
        self.announce(&format!("Switching to {} camera", self.facing.label()));
        self.acquire_camera();
    }

    /// Ask the camera task to (re)open the camera for the current facing.
    fn acquire_camera(&mut self) {
        self.camera_generation += 1;
        let request = CameraRequest {
            generation: self.camera_generation,
            facing: self.facing,
        };

        if self.camera_requests.send(request).is_err() {
            warn!("Camera task is gone; cannot open {} camera", self.facing.label());
        }
    }

    fn on_camera_started(
        &mut self,
        generation: u64,
        facing: FacingMode,
        result: Result<(), CaptureError>,
    ) {
        if generation != self.camera_generation {
            debug!("Discarding camera result for superseded request {}", generation);
            return;
        }

        match result {
            Ok(()) => {
                info!(
                    "Camera started: {} ({} camera)",
                    self.video.name(),
                    facing.label()
                );
                if self.stats.capture_error.take().is_some() {
                    self.emit(ClientEvent::CaptureError(None));
                }
            }
            Err(e) => self.report_capture_error(&e, CAMERA_ERROR_BANNER),
        }
    }

    fn report_capture_error(&mut self, err: &CaptureError, banner: &str) {
        error!("Error accessing capture device: {}", err);
        self.stats.capture_error = Some(banner.to_string());
        self.emit(ClientEvent::CaptureError(Some(banner.to_string())));

        let spoken = match err {
            CaptureError::MicrophoneUnavailable(_) => {
                "Unable to access microphone. Please grant microphone permissions."
            }
            _ => "Unable to access camera. Please grant camera permissions.",
        };
        self.announce(spoken);
    }

    fn announce(&self, message: &str) {
        self.announcer.announce(message);
        self.emit(ClientEvent::Announcement(message.to_string()));
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish_stats(&self) {
        self.stats_tx.send_replace(self.stats.clone());
    }

    async fn teardown(&mut self) {
        info!("Session manager stopping");

        self.sampler.deactivate();
        self.cancel_retry_timer();
        if let Some(camera) = self.camera_task.take() {
            camera.abort();
            let _ = camera.await;
        }
        self.transport.disconnect().await;
        self.video.stop().await;

        self.stats.state = SessionState::Idle;
        self.stats.status = "Stopped".to_string();
        self.publish_stats();

        info!("Session manager stopped");
    }
}

/// Camera task: applies requests one at a time, off the event loop.
///
/// The current handle is always stopped before the next start, and again
/// after a failed start. Requests queued behind a newer one are skipped.
async fn run_camera(
    video: Arc<dyn VideoSource>,
    mut requests: mpsc::UnboundedReceiver<CameraRequest>,
    inputs: mpsc::Sender<Input>,
) {
    while let Some(mut request) = requests.recv().await {
        while let Ok(newer) = requests.try_recv() {
            request = newer;
        }

        video.stop().await;
        let result = match video.start(request.facing).await {
            Ok(()) => Ok(()),
            Err(e) => {
                video.stop().await;
                Err(e)
            }
        };

        let done = Input::CameraStarted {
            generation: request.generation,
            facing: request.facing,
            result,
        };
        if inputs.send(done).await.is_err() {
            break;
        }
    }
}
