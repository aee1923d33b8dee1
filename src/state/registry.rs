use crate::config::Config;
use crate::state::sessions::SessionRegistry;
use std::sync::Arc;

/// Global application state, constructed once in main and shared by every
/// connection task.
pub struct Registry {
    pub config: Arc<Config>,
    pub sessions: SessionRegistry,
}

impl Registry {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            sessions: SessionRegistry::new(),
        }
    }
}
