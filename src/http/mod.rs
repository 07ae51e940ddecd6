//! HTTP control API
//!
//! Local REST surface for driving the running client:
//! - GET /health - Health check
//! - GET /session/status - Session statistics
//! - GET /session/transcript - Recent transcript entries
//! - POST /session/reconnect - Reconnect (the way out of `failed`)
//! - POST /camera/flip - Switch between front and back camera

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
