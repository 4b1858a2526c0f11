use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::{mpsc, RwLock};
use warp::ws::Message;

pub type ConnectionId = String;

/// One live client link: its id, the room it has joined (if any), the
/// display name it last used for chat, and the handle to its outbound
/// message queue.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub room: Option<String>,
    pub name: Option<String>,
    pub sender: mpsc::UnboundedSender<Message>,
}

#[derive(Debug, Default)]
struct Room {
    members: HashSet<ConnectionId>,
    /// Most recent code buffer, kept so a mid-session joiner can be
    /// brought up to date immediately instead of waiting for the next
    /// edit.
    current_code: Option<String>,
}

#[derive(Default)]
struct DirectoryState {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<String, Room>,
}

/// Sole source of truth for "who is in which room".
///
/// Connections and rooms live behind a single lock so that a join and a
/// leave racing on the same room serialize, and two concurrent joins of
/// the same identifier land in one room. Fan-out never happens under
/// the lock; callers take a membership snapshot and send afterwards.
pub struct RoomDirectory {
    state: RwLock<DirectoryState>,
}

impl RoomDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(DirectoryState::default()),
        })
    }

    fn generate_connection_id() -> ConnectionId {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect()
    }

    /// Register a fresh connection on transport handshake.
    pub async fn register(&self, sender: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let mut state = self.state.write().await;

        let mut id = Self::generate_connection_id();
        while state.connections.contains_key(&id) {
            id = Self::generate_connection_id();
        }

        state.connections.insert(
            id.clone(),
            Connection {
                id: id.clone(),
                room: None,
                name: None,
                sender,
            },
        );

        tracing::info!(conn_id = %id, "Connection registered");
        id
    }

    /// Add a connection to a room, creating the room on first join.
    ///
    /// Re-joining the current room is a no-op. Joining a different room
    /// moves the connection. Returns the room's code snapshot when the
    /// connection newly joined and one exists.
    pub async fn join(&self, room_id: &str, conn_id: &str) -> Option<String> {
        let mut state = self.state.write().await;

        let previous_room = match state.connections.get(conn_id) {
            Some(conn) => conn.room.clone(),
            None => {
                tracing::warn!(conn_id = %conn_id, "Join from unregistered connection, ignoring");
                return None;
            }
        };

        if previous_room.as_deref() == Some(room_id) {
            return None; // Already in room
        }

        if let Some(old_room) = previous_room {
            Self::remove_member(&mut state.rooms, &old_room, conn_id);
        }

        state
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .members
            .insert(conn_id.to_string());

        if let Some(conn) = state.connections.get_mut(conn_id) {
            conn.room = Some(room_id.to_string());
        }

        tracing::info!(conn_id = %conn_id, room_id = %room_id, "Connection joined room");

        state
            .rooms
            .get(room_id)
            .and_then(|r| r.current_code.clone())
    }

    /// Remove a connection from whatever room its own record says it is
    /// in. The room is looked up from the connection, never from the
    /// caller, so a stale request cannot evict it from somewhere else.
    pub async fn leave(&self, conn_id: &str) -> Option<String> {
        let mut state = self.state.write().await;
        Self::detach_from_room(&mut state, conn_id)
    }

    /// Drop a connection entirely: leave its room, then unregister.
    /// Never fails; this runs on every disconnect path including
    /// abnormal transport closes.
    pub async fn remove(&self, conn_id: &str) -> Option<String> {
        let mut state = self.state.write().await;
        let room = Self::detach_from_room(&mut state, conn_id);
        state.connections.remove(conn_id);
        room
    }

    fn detach_from_room(state: &mut DirectoryState, conn_id: &str) -> Option<String> {
        let room_id = state.connections.get_mut(conn_id).and_then(|c| c.room.take())?;
        Self::remove_member(&mut state.rooms, &room_id, conn_id);
        tracing::info!(conn_id = %conn_id, room_id = %room_id, "Connection left room");
        Some(room_id)
    }

    fn remove_member(rooms: &mut HashMap<String, Room>, room_id: &str, conn_id: &str) {
        if let Some(room) = rooms.get_mut(room_id) {
            room.members.remove(conn_id);
            if room.members.is_empty() {
                rooms.remove(room_id);
                tracing::debug!(room_id = %room_id, "Room emptied, discarding");
            }
        }
    }

    /// Record the latest code buffer for a room. A room that nobody has
    /// joined yet has nothing to bring joiners up to date on, so the
    /// update is dropped.
    pub async fn set_code(&self, room_id: &str, code: &str) {
        let mut state = self.state.write().await;
        if let Some(room) = state.rooms.get_mut(room_id) {
            room.current_code = Some(code.to_string());
        }
    }

    /// Remember the display name a connection last attributed a chat
    /// message to.
    pub async fn set_name(&self, conn_id: &str, name: &str) {
        let mut state = self.state.write().await;
        if let Some(conn) = state.connections.get_mut(conn_id) {
            conn.name = Some(name.to_string());
        }
    }

    pub async fn get(&self, conn_id: &str) -> Option<Connection> {
        let state = self.state.read().await;
        state.connections.get(conn_id).cloned()
    }

    /// Snapshot of a room's current members. Unknown or empty rooms
    /// yield an empty snapshot, never an error.
    pub async fn members_of(&self, room_id: &str) -> Vec<Connection> {
        let state = self.state.read().await;
        match state.rooms.get(room_id) {
            Some(room) => room
                .members
                .iter()
                .filter_map(|id| state.connections.get(id).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    pub async fn room_exists(&self, room_id: &str) -> bool {
        let state = self.state.read().await;
        state.rooms.contains_key(room_id)
    }

    pub async fn member_count(&self, room_id: &str) -> usize {
        let state = self.state.read().await;
        state.rooms.get(room_id).map(|r| r.members.len()).unwrap_or(0)
    }

    /// (connections, rooms) counts for the stats endpoint.
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.read().await;
        (state.connections.len(), state.rooms.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn register(directory: &RoomDirectory) -> ConnectionId {
        let (tx, _rx) = mpsc::unbounded_channel();
        directory.register(tx).await
    }

    #[tokio::test]
    async fn test_join_creates_room() {
        let directory = RoomDirectory::new();
        let conn = register(&directory).await;

        assert!(!directory.room_exists("r1").await);
        directory.join("r1", &conn).await;

        assert!(directory.room_exists("r1").await);
        assert_eq!(directory.member_count("r1").await, 1);
    }

    #[tokio::test]
    async fn test_rejoin_same_room_is_noop() {
        let directory = RoomDirectory::new();
        let conn = register(&directory).await;

        directory.join("r1", &conn).await;
        directory.join("r1", &conn).await;

        assert_eq!(directory.member_count("r1").await, 1);
    }

    #[tokio::test]
    async fn test_join_moves_between_rooms() {
        let directory = RoomDirectory::new();
        let conn = register(&directory).await;

        directory.join("r1", &conn).await;
        directory.join("r2", &conn).await;

        assert!(!directory.room_exists("r1").await);
        assert_eq!(directory.member_count("r2").await, 1);
    }

    #[tokio::test]
    async fn test_remove_discards_empty_room() {
        let directory = RoomDirectory::new();
        let a = register(&directory).await;
        let b = register(&directory).await;

        directory.join("r1", &a).await;
        directory.join("r1", &b).await;

        directory.remove(&a).await;
        assert!(directory.room_exists("r1").await);
        assert_eq!(directory.member_count("r1").await, 1);

        directory.remove(&b).await;
        assert!(!directory.room_exists("r1").await);

        let (connections, rooms) = directory.counts().await;
        assert_eq!(connections, 0);
        assert_eq!(rooms, 0);
    }

    #[tokio::test]
    async fn test_leave_uses_recorded_room() {
        let directory = RoomDirectory::new();
        let conn = register(&directory).await;

        directory.join("r1", &conn).await;
        let left = directory.leave(&conn).await;

        assert_eq!(left.as_deref(), Some("r1"));
        assert!(!directory.room_exists("r1").await);

        // Connection is still registered, just roomless
        let (connections, _) = directory.counts().await;
        assert_eq!(connections, 1);

        // Leaving again is a no-op
        assert!(directory.leave(&conn).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_unknown_connection_is_noop() {
        let directory = RoomDirectory::new();
        assert!(directory.remove("nobody").await.is_none());
    }

    #[tokio::test]
    async fn test_members_of_unknown_room_is_empty() {
        let directory = RoomDirectory::new();
        assert!(directory.members_of("ghost").await.is_empty());
    }

    #[tokio::test]
    async fn test_code_snapshot_delivered_on_join() {
        let directory = RoomDirectory::new();
        let a = register(&directory).await;
        let b = register(&directory).await;

        directory.join("r1", &a).await;
        directory.set_code("r1", "x=1").await;

        let snapshot = directory.join("r1", &b).await;
        assert_eq!(snapshot.as_deref(), Some("x=1"));
    }

    #[tokio::test]
    async fn test_set_code_on_unknown_room_is_dropped() {
        let directory = RoomDirectory::new();
        directory.set_code("ghost", "x=1").await;
        assert!(!directory.room_exists("ghost").await);
    }

    #[tokio::test]
    async fn test_concurrent_joins_land_in_one_room() {
        let directory = RoomDirectory::new();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let directory = directory.clone();
            handles.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::unbounded_channel();
                let conn = directory.register(tx).await;
                directory.join("shared", &conn).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let (connections, rooms) = directory.counts().await;
        assert_eq!(connections, 32);
        assert_eq!(rooms, 1);
        assert_eq!(directory.member_count("shared").await, 32);
    }
}
