use std::sync::Arc;

use serde::Serialize;
use socketioxide::extract::SocketRef;
use socketioxide::SocketIo;
use uuid::Uuid;

use happy_shared::middleware::JwtSecret;

use crate::models::NotificationView;
use crate::socket::ConnectionRegistry;
use crate::AppState;

pub const NEW_NOTIFICATION: &str = "new_notification";

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Every socket joins a room named after its own id so a push reaches
/// exactly the registered connection.
fn socket_room(socket_id: &str) -> String {
    format!("socket:{socket_id}")
}

fn get_user_id(socket: &SocketRef) -> Option<Uuid> {
    socket.extensions.get::<Uuid>()
}

pub async fn on_connect(socket: SocketRef, auth: Option<serde_json::Value>, state: Arc<AppState>) {
    let query = socket.req_parts().uri.query().map(str::to_owned);
    let user_id = match authenticate(auth.as_ref(), query.as_deref(), &state.jwt_secret) {
        Ok(id) => id,
        Err(msg) => {
            tracing::warn!(error = %msg, sid = %socket.id, "socket auth failed");
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: "AUTH_FAILED".into(),
                    message: msg,
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    socket.extensions.insert(user_id);

    let sid = socket.id.to_string();
    socket.join(socket_room(&sid)).ok();

    if let Some(previous) = state.connections.register(user_id, sid.clone()) {
        tracing::debug!(user_id = %user_id, previous_sid = %previous, "socket replaced older connection");
    }
    tracing::info!(user_id = %user_id, sid = %sid, online = state.connections.len(), "socket connected");

    socket.on_disconnect({
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                on_disconnect(socket, state);
            }
        }
    });
}

fn on_disconnect(socket: SocketRef, state: Arc<AppState>) {
    let Some(user_id) = get_user_id(&socket) else {
        return;
    };

    let sid = socket.id.to_string();
    let removed = state.connections.unregister(user_id, &sid);
    tracing::info!(user_id = %user_id, sid = %sid, removed, "socket disconnected");
}

/// Resolves the account behind a connection attempt. The token comes from
/// the handshake `auth.token` field, or else from a `token` query parameter.
pub fn authenticate(
    auth: Option<&serde_json::Value>,
    query: Option<&str>,
    secret: &JwtSecret,
) -> Result<Uuid, String> {
    let token = auth
        .and_then(|a| a.get("token"))
        .and_then(|t| t.as_str())
        .map(str::to_owned)
        .or_else(|| query.and_then(token_from_query))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "missing token".to_string())?;

    secret
        .verify(&token)
        .map(|claims| claims.sub)
        .map_err(|e| e.to_string())
}

fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token").then(|| value.to_string())
    })
}

/// Emits the notification to the recipient's live connection. Returns
/// `false` when the recipient is offline or the emit fails; nothing is
/// retried.
pub fn push_notification(
    io: &SocketIo,
    connections: &ConnectionRegistry,
    user_id: Uuid,
    notification: &NotificationView,
) -> bool {
    let Some(sid) = connections.socket_of(user_id) else {
        tracing::debug!(user_id = %user_id, "recipient offline, notification kept for REST");
        return false;
    };

    match io.to(socket_room(&sid)).emit(NEW_NOTIFICATION, notification) {
        Ok(()) => {
            tracing::debug!(user_id = %user_id, sid = %sid, "notification pushed");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user_id, "notification push failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use happy_shared::types::auth::{Claims, UserRole};

    fn signed(secret: &JwtSecret, user: Uuid, ttl: i64) -> String {
        secret
            .sign(&Claims::new(user, "carol@example.com", UserRole::User, ttl))
            .unwrap()
    }

    #[test]
    fn handshake_auth_token() {
        let secret = JwtSecret::new("socket-test");
        let user = Uuid::now_v7();
        let auth = serde_json::json!({ "token": signed(&secret, user, 60) });

        assert_eq!(authenticate(Some(&auth), None, &secret), Ok(user));
    }

    #[test]
    fn query_token_fallback() {
        let secret = JwtSecret::new("socket-test");
        let user = Uuid::now_v7();
        let query = format!("EIO=4&transport=websocket&token={}", signed(&secret, user, 60));

        assert_eq!(authenticate(None, Some(&query), &secret), Ok(user));
        assert_eq!(
            authenticate(Some(&serde_json::json!({})), Some(&query), &secret),
            Ok(user)
        );
    }

    #[test]
    fn missing_or_bad_tokens_fail() {
        let secret = JwtSecret::new("socket-test");
        assert!(authenticate(None, Some("EIO=4"), &secret).is_err());

        let expired = serde_json::json!({ "token": signed(&secret, Uuid::now_v7(), -60) });
        let err = authenticate(Some(&expired), None, &secret).unwrap_err();
        assert!(err.contains("expired"));

        let forged = serde_json::json!({ "token": signed(&JwtSecret::new("other"), Uuid::now_v7(), 60) });
        assert!(authenticate(Some(&forged), None, &secret).is_err());
    }

    #[test]
    fn offline_recipient_is_not_pushed() {
        let (_layer, io) = SocketIo::builder().build_layer();
        let connections = ConnectionRegistry::new();
        let notification = NotificationView {
            notification: crate::models::Notification {
                id: Uuid::now_v7(),
                user_id: Uuid::now_v7(),
                notification_type: "like_review".into(),
                reference_id: None,
                message: "liked".into(),
                is_read: false,
                created_at: chrono::Utc::now(),
            },
            restaurant: None,
        };

        assert!(!push_notification(&io, &connections, notification.notification.user_id, &notification));
    }
}
