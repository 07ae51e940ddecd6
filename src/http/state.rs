use crate::session::SessionHandle;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
}

impl AppState {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}
