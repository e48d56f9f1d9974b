//! HTTP API for ember-chat

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::llm::Generator;
use crate::session::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub generator: Arc<dyn Generator>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, generator: Arc<dyn Generator>) -> Self {
        Self {
            sessions,
            generator,
        }
    }
}
