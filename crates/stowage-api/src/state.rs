//! Application state shared by every handler.

use std::sync::Arc;

use stowage_core::Config;
use stowage_explorer::{Explorer, Reply};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub explorer: Explorer,
}

impl AppState {
    pub fn new(config: Arc<Config>, explorer: Explorer) -> Self {
        Self { config, explorer }
    }

    /// Prepare a service reply for the client. Error causes stay inside the process
    /// in production.
    pub fn finish(&self, reply: Reply) -> Reply {
        if self.config.is_production() {
            reply.without_cause()
        } else {
            reply
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("explorer", &self.explorer)
            .finish()
    }
}
