use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::relay::ServerEvent;

/// Identifier of one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Connection {
    sender: mpsc::Sender<ServerEvent>,
    user: Option<Uuid>,
    rooms: HashSet<String>,
}

/// Connection counts for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoomStats {
    pub connections: usize,
    pub rooms: usize,
}

/// Live connections and their room memberships.
///
/// Held in process memory only; clients re-join their rooms after a
/// reconnect. A slow connection whose queue is full drops events instead of
/// blocking the sender.
#[derive(Default)]
pub struct RoomManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    rooms: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and the channel its events are written to.
    pub async fn register(
        &self,
        id: ConnectionId,
        user: Option<Uuid>,
        sender: mpsc::Sender<ServerEvent>,
    ) {
        let mut connections = self.connections.write().await;
        connections.insert(
            id,
            Connection {
                sender,
                user,
                rooms: HashSet::new(),
            },
        );
    }

    /// Drop a connection and every room membership it held.
    pub async fn unregister(&self, id: ConnectionId) {
        let removed = self.connections.write().await.remove(&id);
        if let Some(conn) = removed {
            let mut rooms = self.rooms.write().await;
            for room in conn.rooms {
                if let Some(members) = rooms.get_mut(&room) {
                    members.remove(&id);
                    if members.is_empty() {
                        rooms.remove(&room);
                    }
                }
            }
        }
    }

    pub async fn user_of(&self, id: ConnectionId) -> Option<Uuid> {
        self.connections.read().await.get(&id).and_then(|c| c.user)
    }

    /// Add a connection to a room. Unknown connections are ignored.
    pub async fn join(&self, id: ConnectionId, room: &str) {
        let mut connections = self.connections.write().await;
        let Some(conn) = connections.get_mut(&id) else {
            return;
        };
        conn.rooms.insert(room.to_string());
        self.rooms
            .write()
            .await
            .entry(room.to_string())
            .or_default()
            .insert(id);
    }

    pub async fn leave(&self, id: ConnectionId, room: &str) {
        if let Some(conn) = self.connections.write().await.get_mut(&id) {
            conn.rooms.remove(room);
        }
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    pub async fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .read()
            .await
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Send to every member of `room`, optionally skipping one connection.
    /// Returns the number of connections the event was queued for.
    pub async fn broadcast_to_room(
        &self,
        room: &str,
        event: &ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize {
        let members = self.members(room).await;
        let connections = self.connections.read().await;
        members
            .into_iter()
            .filter(|id| Some(*id) != except)
            .filter_map(|id| connections.get(&id))
            .filter(|conn| deliver(&conn.sender, event))
            .count()
    }

    /// Send to every live connection.
    pub async fn broadcast_all(&self, event: &ServerEvent) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|conn| deliver(&conn.sender, event))
            .count()
    }

    pub async fn stats(&self) -> RoomStats {
        RoomStats {
            connections: self.connections.read().await.len(),
            rooms: self.rooms.read().await.len(),
        }
    }
}

fn deliver(sender: &mpsc::Sender<ServerEvent>, event: &ServerEvent) -> bool {
    match sender.try_send(event.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("Dropping relay event for a slow connection");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn connect(rooms: &RoomManager) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let id = ConnectionId::new();
        rooms.register(id, None, tx).await;
        (id, rx)
    }

    fn message(room: &str) -> ServerEvent {
        ServerEvent::NewMessage {
            room: room.to_string(),
            message: json!({"content": "hi"}),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_room_members_only() {
        let rooms = RoomManager::new();
        let (a, mut rx_a) = connect(&rooms).await;
        let (_b, mut rx_b) = connect(&rooms).await;
        rooms.join(a, "chat-1").await;

        assert_eq!(rooms.broadcast_to_room("chat-1", &message("chat-1"), None).await, 1);
        assert!(matches!(rx_a.try_recv(), Ok(ServerEvent::NewMessage { .. })));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let rooms = RoomManager::new();
        let (a, mut rx_a) = connect(&rooms).await;
        let (b, mut rx_b) = connect(&rooms).await;
        rooms.join(a, "r").await;
        rooms.join(b, "r").await;

        let sent = rooms.broadcast_to_room("r", &message("r"), Some(a)).await;
        assert_eq!(sent, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_all() {
        let rooms = RoomManager::new();
        let (_a, mut rx_a) = connect(&rooms).await;
        let (_b, mut rx_b) = connect(&rooms).await;

        assert_eq!(rooms.broadcast_all(&message("team")).await, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_leave_and_unregister_clean_up() {
        let rooms = RoomManager::new();
        let (a, _rx_a) = connect(&rooms).await;
        let (b, _rx_b) = connect(&rooms).await;
        rooms.join(a, "r1").await;
        rooms.join(a, "r2").await;
        rooms.join(b, "r2").await;

        rooms.leave(a, "r1").await;
        assert!(rooms.members("r1").await.is_empty());

        rooms.unregister(a).await;
        assert_eq!(rooms.members("r2").await, vec![b]);
        assert_eq!(
            rooms.stats().await,
            RoomStats {
                connections: 1,
                rooms: 1
            }
        );
    }

    #[tokio::test]
    async fn test_join_unknown_connection_is_ignored() {
        let rooms = RoomManager::new();
        rooms.join(ConnectionId::new(), "r").await;
        assert_eq!(rooms.stats().await.rooms, 0);
    }
}
