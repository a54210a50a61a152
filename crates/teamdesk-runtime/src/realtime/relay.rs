use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use teamdesk_core::model::ChatType;

use super::rooms::ConnectionId;
use crate::gateway::AppState;

/// Capacity of each connection's outgoing queue.
const OUTBOX_CAPACITY: usize = 256;

/// Event sent by a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom {
        room: String,
    },
    LeaveRoom {
        room: String,
    },
    /// A message the client already persisted over REST.
    SendMessage {
        room: String,
        message: Value,
    },
    Typing {
        room: String,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    Ping,
}

/// Event delivered to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
    },
    NewMessage {
        room: String,
        message: Value,
    },
    UserTyping {
        room: String,
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<Uuid>,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    Pong,
    Error {
        message: String,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct RelayParams {
    token: Option<String>,
}

/// WebSocket upgrade handler. A `?token=` query parameter identifies the
/// user; anonymous connections are accepted.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<RelayParams>,
    State(state): State<AppState>,
) -> Response {
    let user = match params.token.as_deref() {
        Some(token) => match state.services.auth.authenticate(token).await {
            Ok(user) => Some(user.id),
            Err(e) => {
                debug!(error = %e, "Relay token rejected, continuing anonymously");
                None
            }
        },
        None => None,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: Option<Uuid>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let id = ConnectionId::new();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOX_CAPACITY);

    state.rooms.register(id, user, tx.clone()).await;
    let _ = tx.send(ServerEvent::Connected { connection_id: id }).await;
    debug!(connection = %id, ?user, "Relay connection established");

    let sender_handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to encode relay event: {}", e),
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            _ => continue,
        };

        let event: ClientEvent = match serde_json::from_str(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to parse relay event: {}", e);
                let _ = tx
                    .send(ServerEvent::Error {
                        message: "Malformed event".to_string(),
                    })
                    .await;
                continue;
            }
        };

        if let Some(reply) = dispatch(&state, id, event).await {
            let _ = tx.send(reply).await;
        }
    }

    sender_handle.abort();
    state.rooms.unregister(id).await;
    debug!(connection = %id, "Relay connection closed");
}

/// Apply one client event. Returns a direct reply for the sender, if any.
pub(crate) async fn dispatch(
    state: &AppState,
    id: ConnectionId,
    event: ClientEvent,
) -> Option<ServerEvent> {
    match event {
        ClientEvent::JoinRoom { room } => {
            state.rooms.join(id, &room).await;
            None
        }
        ClientEvent::LeaveRoom { room } => {
            state.rooms.leave(id, &room).await;
            None
        }
        ClientEvent::SendMessage { room, message } => {
            let chat_id = chat_reference(&room, &message);
            let event = ServerEvent::NewMessage { room: room.clone(), message };
            state.rooms.broadcast_to_room(&room, &event, None).await;

            match chat_id {
                Some(chat_id) => match state.services.chat.kind_of(chat_id).await {
                    Ok(Some(ChatType::Team)) => {
                        state.rooms.broadcast_all(&event).await;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(chat = %chat_id, error = %e, "Chat lookup failed"),
                },
                None => debug!(%room, "Relay message without a chat reference"),
            }
            None
        }
        ClientEvent::Typing { room, is_typing } => {
            let event = ServerEvent::UserTyping {
                room: room.clone(),
                user_id: state.rooms.user_of(id).await,
                is_typing,
            };
            state.rooms.broadcast_to_room(&room, &event, Some(id)).await;
            None
        }
        ClientEvent::Ping => Some(ServerEvent::Pong),
    }
}

/// Rooms are keyed by chat id; fall back to the message's own `chat` field.
fn chat_reference(room: &str, message: &Value) -> Option<Uuid> {
    Uuid::parse_str(room).ok().or_else(|| {
        message
            .get("chat")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    use crate::auth::TokenService;
    use crate::realtime::RoomManager;
    use crate::service::Services;
    use crate::store::Store;

    fn state() -> AppState {
        let services = Services::new(Store::memory(), TokenService::new("secret", 3600));
        AppState::new(services, Arc::new(RoomManager::new()))
    }

    async fn connect(state: &AppState, user: Option<Uuid>) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let id = ConnectionId::new();
        state.rooms.register(id, user, tx).await;
        (id, rx)
    }

    #[test]
    fn test_client_event_parsing() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"typing","room":"r","isTyping":true}"#).unwrap();
        assert!(matches!(event, ClientEvent::Typing { is_typing: true, .. }));

        let event: ClientEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Ping));
    }

    #[test]
    fn test_server_event_serialization() {
        let json = serde_json::to_value(ServerEvent::UserTyping {
            room: "r".into(),
            user_id: None,
            is_typing: false,
        })
        .unwrap();
        assert_eq!(json["type"], "user_typing");
        assert_eq!(json["isTyping"], false);
        assert!(json.get("userId").is_none());
    }

    #[tokio::test]
    async fn test_team_message_reaches_everyone() {
        let state = state();
        let team = state.services.chat.ensure_team_chat().await.unwrap();
        let room = team.id.to_string();

        let (sender, mut rx_sender) = connect(&state, None).await;
        let (_outsider, mut rx_outsider) = connect(&state, None).await;
        dispatch(&state, sender, ClientEvent::JoinRoom { room: room.clone() }).await;

        dispatch(
            &state,
            sender,
            ClientEvent::SendMessage {
                room: room.clone(),
                message: json!({"content": "hello team"}),
            },
        )
        .await;

        // once through the room, once through the global broadcast
        assert!(rx_sender.try_recv().is_ok());
        assert!(rx_sender.try_recv().is_ok());
        assert!(rx_outsider.try_recv().is_ok());
        assert!(rx_outsider.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_chat_only_reaches_room() {
        let state = state();
        let room = Uuid::new_v4().to_string();
        let (a, mut rx_a) = connect(&state, None).await;
        let (_b, mut rx_b) = connect(&state, None).await;
        dispatch(&state, a, ClientEvent::JoinRoom { room: room.clone() }).await;

        dispatch(
            &state,
            a,
            ClientEvent::SendMessage {
                room,
                message: json!({"content": "hi"}),
            },
        )
        .await;
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_typing_skips_sender_and_carries_user() {
        let state = state();
        let user = Uuid::new_v4();
        let (a, mut rx_a) = connect(&state, Some(user)).await;
        let (b, mut rx_b) = connect(&state, None).await;
        dispatch(&state, a, ClientEvent::JoinRoom { room: "r".into() }).await;
        dispatch(&state, b, ClientEvent::JoinRoom { room: "r".into() }).await;

        dispatch(
            &state,
            a,
            ClientEvent::Typing {
                room: "r".into(),
                is_typing: true,
            },
        )
        .await;

        assert!(rx_a.try_recv().is_err());
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerEvent::UserTyping {
                room: "r".into(),
                user_id: Some(user),
                is_typing: true
            }
        );
    }

    #[tokio::test]
    async fn test_ping_gets_pong() {
        let state = state();
        let (a, _rx) = connect(&state, None).await;
        assert_eq!(dispatch(&state, a, ClientEvent::Ping).await, Some(ServerEvent::Pong));
    }

    #[test]
    fn test_chat_reference_fallback() {
        let id = Uuid::new_v4();
        assert_eq!(chat_reference(&id.to_string(), &json!({})), Some(id));
        assert_eq!(
            chat_reference("general", &json!({"chat": id.to_string()})),
            Some(id)
        );
        assert_eq!(chat_reference("general", &json!({})), None);
    }
}
