use crate::net::output::Peers;
use crate::state::registry::Registry;
use std::sync::Arc;

pub mod output;
pub mod sink;
pub mod tcp;

/// Everything a connection task needs a handle on.
pub struct AppCtx {
    pub registry: Arc<Registry>,
    pub peers: Arc<Peers>,
}
