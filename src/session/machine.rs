use std::time::Duration;
use tracing::debug;

use super::backoff::BackoffPolicy;
use super::state::{RetryContext, SessionState};

/// Inputs to the connection state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineEvent {
    /// Start the session. Ignored unless idle.
    Start,

    /// Explicit user request to connect again
    Reconnect,

    /// Join succeeded. `attempt_id` is `None` when the transport itself
    /// reported the join rather than a connect call returning.
    Joined { attempt_id: Option<u64> },

    /// Credential fetch or transport join failed
    JoinFailed { attempt_id: u64, reason: String },

    /// Transport reported the session dropped
    Dropped { reason: String },

    /// Backoff timer fired
    BackoffElapsed { timer_id: u64 },
}

/// Side effects requested by a transition, executed by the session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// State changed; observers should be told
    ///
    /// Besides the usual `Retrying -> Connecting -> Retrying` cycle, a failure
    /// that exhausts the retry budget moves `Connecting -> Failed` directly.
    /// No `Retrying` transition precedes it.
    Transition {
        from: SessionState,
        to: SessionState,
        retry: RetryContext,
    },

    /// Fetch a fresh credential and join
    BeginConnect { attempt_id: u64 },

    /// Arm the backoff timer, replacing any pending one
    ScheduleRetry { timer_id: u64, delay: Duration },

    /// Disarm the backoff timer
    CancelRetry,

    /// Start periodic frame sampling for this ready period
    StartSampler { epoch: u64 },

    /// Stop frame sampling
    StopSampler,

    /// Turn on the local microphone
    EnableMicrophone,

    /// Publish the last known location once
    PublishLastLocation,

    /// Status line text
    Status(String),

    /// Spoken notification
    Announce(String),
}

/// Connection lifecycle as a pure `(state, event) -> (state, effects)` function
///
/// Timers and connect attempts are identified by ids so that completions of
/// superseded work can be recognized and dropped.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    retry: RetryContext,
    policy: BackoffPolicy,
    assistant_name: String,
    in_flight: Option<u64>,
    pending_retry: Option<u64>,
    next_id: u64,
    ready_epoch: u64,
}

/// Attempts after which the status line suggests checking the assistant
const HINT_AFTER_ATTEMPTS: u32 = 3;

impl SessionMachine {
    pub fn new(policy: BackoffPolicy, assistant_name: impl Into<String>) -> Self {
        Self {
            state: SessionState::Idle,
            retry: RetryContext::default(),
            policy,
            assistant_name: assistant_name.into(),
            in_flight: None,
            pending_retry: None,
            next_id: 0,
            ready_epoch: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn retry(&self) -> RetryContext {
        self.retry
    }

    /// Identifies the current ready period; bumps on every join
    pub fn ready_epoch(&self) -> u64 {
        self.ready_epoch
    }

    /// Connect attempt currently awaiting a result
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Backoff timer currently armed
    pub fn pending_retry(&self) -> Option<u64> {
        self.pending_retry
    }

    /// Apply one event and return the effects to run, in order.
    pub fn handle(&mut self, event: MachineEvent) -> Vec<Effect> {
        use MachineEvent::*;
        use SessionState::*;

        let mut effects = Vec::new();

        match (self.state, event) {
            (Idle, Start) | (Idle, Reconnect) => self.begin_connect(&mut effects),

            (Failed, Reconnect) => {
                self.retry = RetryContext::default();
                self.begin_connect(&mut effects);
            }

            (Retrying, Reconnect) => {
                // Skip the rest of the wait; the attempt still counts
                self.cancel_retry(&mut effects);
                self.retry.attempt += 1;
                self.begin_connect(&mut effects);
            }

            (Connecting, Joined { attempt_id }) => {
                if attempt_id.is_some() && attempt_id != self.in_flight {
                    debug!("Discarding join for superseded attempt {:?}", attempt_id);
                } else {
                    self.enter_ready(&mut effects);
                }
            }

            // A late ready signal from the transport wins over a pending retry
            (Retrying, Joined { attempt_id: None }) => self.enter_ready(&mut effects),

            (Connecting, JoinFailed { attempt_id, reason }) if self.in_flight == Some(attempt_id) => {
                debug!("Attempt {} failed: {}", attempt_id, reason);
                self.in_flight = None;
                self.fail(&mut effects);
            }

            (Ready, Dropped { reason }) => {
                debug!("Session dropped: {}", reason);
                effects.push(Effect::StopSampler);
                self.transition(Disconnected, &mut effects);
                effects.push(Effect::Status("Disconnected".into()));
                self.fail(&mut effects);
            }

            (Retrying, BackoffElapsed { timer_id }) if self.pending_retry == Some(timer_id) => {
                self.pending_retry = None;
                self.retry.attempt += 1;
                self.begin_connect(&mut effects);
            }

            (state, event) => {
                debug!("Ignoring {:?} while {}", event, state);
            }
        }

        effects
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn transition(&mut self, to: SessionState, effects: &mut Vec<Effect>) {
        let from = self.state;
        self.state = to;
        effects.push(Effect::Transition {
            from,
            to,
            retry: self.retry,
        });
    }

    fn cancel_retry(&mut self, effects: &mut Vec<Effect>) {
        if self.pending_retry.take().is_some() {
            effects.push(Effect::CancelRetry);
        }
    }

    fn begin_connect(&mut self, effects: &mut Vec<Effect>) {
        self.cancel_retry(effects);

        let attempt_id = self.next_id();
        self.in_flight = Some(attempt_id);

        self.transition(SessionState::Connecting, effects);
        effects.push(Effect::Status(format!(
            "Connecting to {}...",
            self.assistant_name
        )));
        effects.push(Effect::BeginConnect { attempt_id });
    }

    fn enter_ready(&mut self, effects: &mut Vec<Effect>) {
        self.in_flight = None;
        self.cancel_retry(effects);
        self.retry = RetryContext::default();
        self.ready_epoch += 1;

        self.transition(SessionState::Ready, effects);
        effects.push(Effect::StartSampler {
            epoch: self.ready_epoch,
        });
        effects.push(Effect::EnableMicrophone);
        effects.push(Effect::PublishLastLocation);
        effects.push(Effect::Status("Connected".into()));
        effects.push(Effect::Announce(format!(
            "{} is ready",
            self.assistant_name
        )));
    }

    /// Route a failed attempt or a drop to Retrying, or Failed at the ceiling.
    fn fail(&mut self, effects: &mut Vec<Effect>) {
        let failures = self.retry.attempt + 1;

        if self.policy.should_give_up(failures) {
            self.retry.last_delay = None;
            self.transition(SessionState::Failed, effects);
            effects.push(Effect::Status(
                "Connection failed. Please reconnect.".into(),
            ));
            effects.push(Effect::Announce(format!(
                "Connection lost. Please make sure {} is running and reconnect.",
                self.assistant_name
            )));
            return;
        }

        let delay = self.policy.delay(self.retry.attempt);
        self.retry.last_delay = Some(delay);

        let timer_id = self.next_id();
        self.pending_retry = Some(timer_id);

        self.transition(SessionState::Retrying, effects);
        effects.push(Effect::ScheduleRetry { timer_id, delay });

        let mut status = format!("Reconnecting in {}s...", delay.as_secs_f64());
        if failures >= HINT_AFTER_ATTEMPTS {
            status.push_str(&format!(" (make sure {} is running)", self.assistant_name));
        }
        effects.push(Effect::Status(status));
    }
}
