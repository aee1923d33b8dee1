use crate::protocol::ConnectionId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Per-connection authentication state.
///
/// An empty username means "connected but not logged in"; the entry itself
/// exists exactly as long as the connection is open.
#[derive(Debug)]
pub struct Session {
    pub session_started: std::time::Instant,
    username: String,
}

impl Session {
    fn new() -> Self {
        Self {
            session_started: std::time::Instant::now(),
            username: String::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_logged_in(&self) -> bool {
        !self.username.is_empty()
    }
}

/// The connection-id → session map shared by all connection workers.
///
/// Single-key operations are atomic against each other (dashmap shard
/// locking); the scan operations (`connection_of`, `is_logged_in`,
/// `logged_in_connections`) iterate without a global lock, so an entry
/// added or removed mid-scan may or may not be observed. Nothing here
/// panics or errors for a missing entry; absence is a `bool` or `None`.
#[derive(Default)]
pub struct SessionRegistry {
    clients: DashMap<ConnectionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { clients: DashMap::new() }
    }

    /// Create an empty session for a newly opened connection. Idempotent:
    /// registering an already-known connection leaves its session alone.
    pub fn register_connection(&self, connection_id: &ConnectionId) {
        match self.clients.entry(connection_id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(Session::new());
                tracing::info!(%connection_id, "client registered");
            }
            Entry::Occupied(_) => {
                tracing::info!(%connection_id, "client already registered");
            }
        }
    }

    /// Drop the session for a closed connection. Idempotent.
    pub fn remove_connection(&self, connection_id: &ConnectionId) {
        match self.clients.remove(connection_id) {
            Some((_, session)) => {
                let session_secs = session.session_started.elapsed().as_secs();
                tracing::info!(%connection_id, session_secs, "client unregistered");
            }
            None => {
                tracing::info!(%connection_id, "client not found");
            }
        }
    }

    /// Bind `username` to the connection. Returns false when the connection
    /// is unknown. A prior username is overwritten (last write wins), and no
    /// uniqueness is enforced across connections: two connections may claim
    /// the same name, in which case `connection_of` resolves to whichever
    /// entry iteration yields first.
    pub fn login(&self, connection_id: &ConnectionId, username: &str) -> bool {
        match self.clients.get_mut(connection_id) {
            Some(mut session) => {
                session.username = username.to_string();
                tracing::info!(%connection_id, username, "user logged in");
                true
            }
            None => {
                tracing::info!(%connection_id, username, "client not connected for user");
                false
            }
        }
    }

    /// Clear the connection's username, keeping the connection entry.
    /// The `username` argument is for log parity only; it is not checked
    /// against the stored value.
    pub fn logout(&self, connection_id: &ConnectionId, username: &str) -> bool {
        match self.clients.get_mut(connection_id) {
            Some(mut session) => {
                session.username.clear();
                tracing::info!(%connection_id, username, "user logged out");
                true
            }
            None => {
                tracing::info!(%connection_id, username, "client not connected for user");
                false
            }
        }
    }

    /// Stored username for a registered connection; empty string when the
    /// connection has not logged in, `None` when the connection is unknown.
    pub fn username_of(&self, connection_id: &ConnectionId) -> Option<String> {
        self.clients.get(connection_id).map(|s| s.username().to_string())
    }

    /// First connection whose username matches. Ambiguous when several
    /// connections share a name; exactly one of them is returned.
    pub fn connection_of(&self, username: &str) -> Option<ConnectionId> {
        self.clients
            .iter()
            .find(|entry| entry.value().username() == username)
            .map(|entry| entry.key().clone())
    }

    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.clients.contains_key(connection_id)
    }

    pub fn is_logged_in(&self, username: &str) -> bool {
        self.clients.iter().any(|entry| entry.value().username() == username)
    }

    /// All connections with a non-empty username, in map iteration order.
    pub fn logged_in_connections(&self) -> Vec<ConnectionId> {
        self.clients
            .iter()
            .filter(|entry| entry.value().is_logged_in())
            .map(|entry| entry.key().clone())
            .collect()
    }
}
