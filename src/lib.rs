pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod server;

use std::sync::Arc;

use config::AppConfig;
use engine::{ModelBackend, PhaseRegistry};

/// Shared application state, built once at startup. Everything here is
/// read-only after construction — the only cross-request state.
pub struct AppState {
    pub config: AppConfig,
    pub registry: PhaseRegistry,
    pub backend: Arc<dyn ModelBackend>,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            config,
            registry: PhaseRegistry::new(),
            backend,
        }
    }
}
