//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::util::rate_limit::{create_limiter, Limiter, RENDER_INPUT_RATE_LIMIT};

use super::session::SessionHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: SessionHandle,
    /// Caps held-input updates from renderer sockets
    pub input_limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Arc<Config>, session: SessionHandle) -> Self {
        Self {
            config,
            session,
            input_limiter: create_limiter(RENDER_INPUT_RATE_LIMIT),
        }
    }
}
