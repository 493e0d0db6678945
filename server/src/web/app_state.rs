use std::sync::Arc;

use crate::engine::chat_engine::ChatEngine;

/// Shared state handed to every HTTP and WebSocket handler.
pub struct AppState {
    pub engine: Arc<ChatEngine>,
}

impl AppState {
    pub fn new(engine: Arc<ChatEngine>) -> Self {
        Self { engine }
    }
}
