use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Transport-assigned token for one open connection.
///
/// Opaque to the registry and router. Unique while the connection is open;
/// the transport may hand out a previously-used id after a close, so nothing
/// here treats it as permanently unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Mint a fresh id for a connection accepted from `peer`.
    pub fn assign(peer: std::net::SocketAddr) -> Self {
        Self(format!("{peer}:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Inbound envelope exactly as it appears on the wire, before classification.
/// All fields are optional here; validation happens in [`classify`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub action: Option<String>,
    #[serde(default)]
    pub payload: HashMap<String, String>,
}

/// Command actions carried by `type = "command"` envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Login,
    Logout,
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandAction::Login => f.write_str("login"),
            CommandAction::Logout => f.write_str("logout"),
        }
    }
}

/// A classified inbound envelope, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Command { action: CommandAction, username: String },
    Chat { to: String, message: String },
    Broadcast { message: String },
    /// Unmatched or missing `type`: the default route is a silent no-op.
    Discard,
}

/// Parse one wire line into a [`Route`].
///
/// An unknown or absent `type` classifies as `Discard`. A recognized `type`
/// with missing payload fields (or an unrecognized command `action`) is a
/// hard validation failure, as is non-JSON input.
pub fn classify(raw: &str) -> Result<Route, ProtocolError> {
    let envelope: RawEnvelope = serde_json::from_str(raw)?;

    let Some(kind) = envelope.kind.as_deref() else {
        return Ok(Route::Discard);
    };

    match kind {
        "command" => {
            let action = match envelope.action.as_deref() {
                Some("login") => CommandAction::Login,
                Some("logout") => CommandAction::Logout,
                Some(other) => return Err(ProtocolError::UnknownAction(other.to_string())),
                None => return Err(ProtocolError::MissingField { kind: "command", field: "action" }),
            };
            let username = require(&envelope, "command", "username")?;
            Ok(Route::Command { action, username })
        }
        "chat" => {
            let to = require(&envelope, "chat", "to")?;
            let message = require(&envelope, "chat", "message")?;
            Ok(Route::Chat { to, message })
        }
        "broadcast" => {
            let message = require(&envelope, "broadcast", "message")?;
            Ok(Route::Broadcast { message })
        }
        _ => Ok(Route::Discard),
    }
}

fn require(envelope: &RawEnvelope, kind: &'static str, field: &'static str) -> Result<String, ProtocolError> {
    envelope
        .payload
        .get(field)
        .cloned()
        .ok_or(ProtocolError::MissingField { kind, field })
}

/// An outbound frame, serialized as one JSON line on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    /// Reply to a command: `{"status": "login succeeded!"}`
    Status { status: String },
    /// Chat/broadcast delivery, and the chat error reply (which carries no
    /// `from`): `{"type": "chatResponse", "payload": {...}}`
    ChatResponse {
        #[serde(rename = "type")]
        kind: &'static str,
        payload: ChatPayload,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub message: String,
}

impl ServerFrame {
    pub fn status(status: impl Into<String>) -> Self {
        ServerFrame::Status { status: status.into() }
    }

    pub fn chat(from: impl Into<String>, message: impl Into<String>) -> Self {
        ServerFrame::ChatResponse {
            kind: "chatResponse",
            payload: ChatPayload {
                from: Some(from.into()),
                message: message.into(),
            },
        }
    }

    pub fn chat_error(message: impl Into<String>) -> Self {
        ServerFrame::ChatResponse {
            kind: "chatResponse",
            payload: ChatPayload {
                from: None,
                message: message.into(),
            },
        }
    }
}
