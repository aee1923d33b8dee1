use crate::error::ProtocolError;
use crate::protocol::{ConnectionId, CommandAction, Route, ServerFrame, classify};
use crate::state::sessions::SessionRegistry;

/// One outbound frame bound to a single destination connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub frame: ServerFrame,
}

impl Delivery {
    fn reply(to: &ConnectionId, frame: ServerFrame) -> Self {
        Self { to: to.clone(), frame }
    }
}

/// Classify one raw wire line and dispatch it. This is the whole routing
/// pipeline as seen by the transport layer.
pub fn handle_line(
    sessions: &SessionRegistry,
    source: &ConnectionId,
    raw: &str,
) -> Result<Vec<Delivery>, ProtocolError> {
    Ok(dispatch(sessions, source, classify(raw)?))
}

/// Dispatch a classified envelope, producing zero or more deliveries.
///
/// Every "not found" / "not logged in" outcome degrades to an error-status
/// frame back to the sender; nothing here fails or drops the sender's
/// connection.
pub fn dispatch(sessions: &SessionRegistry, source: &ConnectionId, route: Route) -> Vec<Delivery> {
    match route {
        Route::Command { action, username } => {
            let ok = match action {
                CommandAction::Login => sessions.login(source, &username),
                CommandAction::Logout => sessions.logout(source, &username),
            };
            let status = format!("{action} {}!", if ok { "succeeded" } else { "failed" });
            vec![Delivery::reply(source, ServerFrame::status(status))]
        }

        Route::Chat { to, message } => chat(sessions, source, &to, message),

        Route::Broadcast { message } => broadcast(sessions, source, message),

        Route::Discard => {
            tracing::debug!(%source, "discarding unroutable envelope");
            Vec::new()
        }
    }
}

fn chat(sessions: &SessionRegistry, source: &ConnectionId, to: &str, message: String) -> Vec<Delivery> {
    let from = match sessions.username_of(source) {
        Some(name) if !name.is_empty() => name,
        _ => {
            tracing::info!(%source, "chat from unauthenticated connection");
            return vec![Delivery::reply(source, ServerFrame::chat_error("chat not sent!"))];
        }
    };

    match sessions.connection_of(to) {
        Some(recipient) => {
            vec![Delivery::reply(&recipient, ServerFrame::chat(from, message))]
        }
        None => {
            tracing::info!(%source, to, "chat recipient not logged in");
            vec![Delivery::reply(source, ServerFrame::chat_error("chat not sent!"))]
        }
    }
}

fn broadcast(sessions: &SessionRegistry, source: &ConnectionId, message: String) -> Vec<Delivery> {
    let from = match sessions.username_of(source) {
        Some(name) if !name.is_empty() => name,
        _ => {
            tracing::info!(%source, "broadcast from unauthenticated connection");
            return vec![Delivery::reply(source, ServerFrame::chat_error("broadcast not sent!"))];
        }
    };

    sessions
        .logged_in_connections()
        .into_iter()
        .filter(|connection_id| connection_id != source)
        .map(|connection_id| Delivery {
            to: connection_id,
            frame: ServerFrame::chat(from.clone(), message.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ChatPayload;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::from(id)
    }

    fn registry_with(logins: &[(&str, &str)]) -> SessionRegistry {
        let sessions = SessionRegistry::new();
        for (id, user) in logins {
            sessions.register_connection(&conn(id));
            assert!(sessions.login(&conn(id), user));
        }
        sessions
    }

    #[test]
    fn login_replies_to_sender() {
        let sessions = SessionRegistry::new();
        sessions.register_connection(&conn("conn1"));

        let out = handle_line(
            &sessions,
            &conn("conn1"),
            r#"{"type":"command","action":"login","payload":{"username":"alice"}}"#,
        )
        .unwrap();

        assert_eq!(out, vec![Delivery::reply(&conn("conn1"), ServerFrame::status("login succeeded!"))]);
        assert!(sessions.is_logged_in("alice"));
    }

    #[test]
    fn login_on_unknown_connection_fails() {
        let sessions = SessionRegistry::new();

        let out = dispatch(
            &sessions,
            &conn("ghost"),
            Route::Command {
                action: CommandAction::Login,
                username: "alice".to_string(),
            },
        );

        assert_eq!(out, vec![Delivery::reply(&conn("ghost"), ServerFrame::status("login failed!"))]);
    }

    #[test]
    fn logout_replies_to_sender() {
        let sessions = registry_with(&[("conn1", "alice")]);

        let out = dispatch(
            &sessions,
            &conn("conn1"),
            Route::Command {
                action: CommandAction::Logout,
                username: "alice".to_string(),
            },
        );

        assert_eq!(out, vec![Delivery::reply(&conn("conn1"), ServerFrame::status("logout succeeded!"))]);
        assert!(!sessions.is_logged_in("alice"));
        assert!(sessions.is_connected(&conn("conn1")));
    }

    #[test]
    fn chat_delivers_to_recipient() {
        let sessions = registry_with(&[("conn1", "alice"), ("conn2", "bob")]);

        let out = dispatch(
            &sessions,
            &conn("conn1"),
            Route::Chat {
                to: "bob".to_string(),
                message: "hi".to_string(),
            },
        );

        assert_eq!(out, vec![Delivery::reply(&conn("conn2"), ServerFrame::chat("alice", "hi"))]);
    }

    #[test]
    fn chat_to_unknown_user_errors_to_sender() {
        let sessions = registry_with(&[("conn1", "alice")]);

        let out = dispatch(
            &sessions,
            &conn("conn1"),
            Route::Chat {
                to: "carol".to_string(),
                message: "hi".to_string(),
            },
        );

        assert_eq!(out, vec![Delivery::reply(&conn("conn1"), ServerFrame::chat_error("chat not sent!"))]);
    }

    #[test]
    fn chat_from_anonymous_sender_errors_to_sender() {
        let sessions = SessionRegistry::new();
        sessions.register_connection(&conn("conn1"));
        sessions.register_connection(&conn("conn2"));
        sessions.login(&conn("conn2"), "bob");

        let out = dispatch(
            &sessions,
            &conn("conn1"),
            Route::Chat {
                to: "bob".to_string(),
                message: "hi".to_string(),
            },
        );

        assert_eq!(out, vec![Delivery::reply(&conn("conn1"), ServerFrame::chat_error("chat not sent!"))]);
    }

    #[test]
    fn broadcast_fans_out_excluding_sender() {
        let sessions = registry_with(&[("conn1", "alice"), ("conn2", "bob"), ("conn3", "carol")]);

        let out = dispatch(
            &sessions,
            &conn("conn1"),
            Route::Broadcast { message: "hey".to_string() },
        );

        assert_eq!(out.len(), 2);
        let mut recipients: Vec<&str> = out.iter().map(|d| d.to.as_str()).collect();
        recipients.sort();
        assert_eq!(recipients, vec!["conn2", "conn3"]);
        for delivery in &out {
            assert_eq!(
                delivery.frame,
                ServerFrame::ChatResponse {
                    kind: "chatResponse",
                    payload: ChatPayload {
                        from: Some("alice".to_string()),
                        message: "hey".to_string(),
                    },
                }
            );
        }
    }

    #[test]
    fn broadcast_with_no_other_users_is_empty() {
        let sessions = registry_with(&[("conn1", "alice")]);

        let out = dispatch(
            &sessions,
            &conn("conn1"),
            Route::Broadcast { message: "hey".to_string() },
        );

        assert!(out.is_empty());
    }

    #[test]
    fn broadcast_from_anonymous_sender_errors_to_sender() {
        let sessions = registry_with(&[("conn2", "bob")]);
        sessions.register_connection(&conn("conn1"));

        let out = dispatch(
            &sessions,
            &conn("conn1"),
            Route::Broadcast { message: "hey".to_string() },
        );

        assert_eq!(out, vec![Delivery::reply(&conn("conn1"), ServerFrame::chat_error("broadcast not sent!"))]);
    }

    #[test]
    fn unknown_type_produces_nothing() {
        let sessions = registry_with(&[("conn1", "alice")]);

        let out = handle_line(&sessions, &conn("conn1"), r#"{"type":"ping"}"#).unwrap();
        assert!(out.is_empty());
    }
}
