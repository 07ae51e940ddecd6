//! Session lifecycle management
//!
//! This module provides the `SessionManager` actor that manages:
//! - Credential acquisition and transport join, one attempt at a time
//! - Reconnection with bounded exponential backoff
//! - Frame sampling and location publication while the session is ready
//! - Routing of inbound transcription and data messages to the transcript
//! - Session statistics and user-facing status

mod backoff;
mod config;
mod machine;
mod manager;
mod state;
mod stats;

pub use backoff::BackoffPolicy;
pub use config::SessionConfig;
pub use machine::{Effect, MachineEvent, SessionMachine};
pub use manager::{Command, SessionDeps, SessionHandle, SessionManager};
pub use state::{RetryContext, SessionState};
pub use stats::SessionStats;
