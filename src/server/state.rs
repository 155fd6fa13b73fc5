use std::sync::Arc;

use crate::config::PlaygroundConfig;
use crate::upstream::CompletionClient;

/// Shared application state accessible to all HTTP handlers.
///
/// Everything here is read-only; requests share nothing mutable.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PlaygroundConfig>,
    pub client: Arc<dyn CompletionClient>,
}

impl AppState {
    pub fn new(config: Arc<PlaygroundConfig>, client: Arc<dyn CompletionClient>) -> Self {
        Self { config, client }
    }
}
