use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use warp::ws::Message;

use super::events::{ClientEvent, ServerEvent};
use super::registry::{Connection, ConnectionId, RoomDirectory};

/// Single entry point for the real-time path: owns the room directory
/// and dispatches the four inbound event kinds to their fan-out
/// channels.
///
/// No authentication happens here: any connection that knows a room
/// identifier may join it and emit events for it, exactly as the
/// surrounding product expects. Tokens tying connections to rooms would
/// belong to the HTTP layer above, not this one.
pub struct SessionGateway {
    directory: Arc<RoomDirectory>,
}

impl SessionGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            directory: RoomDirectory::new(),
        })
    }

    /// Register a fresh connection and hand back its id.
    pub async fn on_connect(&self, sender: mpsc::UnboundedSender<Message>) -> ConnectionId {
        self.directory.register(sender).await
    }

    /// The only cleanup path, so it must cover unclean closes too and
    /// can never fail: unknown connections are a no-op.
    pub async fn on_disconnect(&self, conn_id: &str) {
        let room = self.directory.remove(conn_id).await;
        tracing::info!(
            conn_id = %conn_id,
            room_id = room.as_deref().unwrap_or("-"),
            "Connection closed"
        );
    }

    pub async fn on_event(&self, conn_id: &str, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom { room } => self.handle_join(conn_id, &room).await,
            ClientEvent::CodeChange { room, code } => {
                self.handle_code_change(conn_id, &room, code).await
            }
            ClientEvent::SendMessage {
                room,
                sender,
                message,
            } => self.handle_send_message(conn_id, &room, sender, message).await,
            ClientEvent::SignalWarning { room } => self.handle_signal_warning(conn_id, &room).await,
        }
    }

    async fn handle_join(&self, conn_id: &str, room_id: &str) {
        if room_id.is_empty() {
            tracing::debug!(conn_id = %conn_id, "join-room without a room identifier, dropping");
            return;
        }

        let snapshot = self.directory.join(room_id, conn_id).await;

        // Bring a mid-session joiner up to date before any other
        // traffic reaches it.
        if let Some(code) = snapshot {
            if let Some(conn) = self.directory.get(conn_id).await {
                Self::deliver(&conn, &ServerEvent::CodeUpdate { code, from: None });
            }
        }
    }

    async fn handle_code_change(&self, conn_id: &str, room_id: &str, code: String) {
        if room_id.is_empty() {
            tracing::debug!(conn_id = %conn_id, "code-change without a room identifier, dropping");
            return;
        }

        self.directory.set_code(room_id, &code).await;

        // Everyone but the sender: it already holds the authoritative
        // buffer, and an echo would reset its cursor.
        let event = ServerEvent::CodeUpdate {
            code,
            from: Some(conn_id.to_string()),
        };
        self.broadcast(room_id, &event, Some(conn_id)).await;
    }

    async fn handle_send_message(
        &self,
        conn_id: &str,
        room_id: &str,
        sender: String,
        message: String,
    ) {
        if room_id.is_empty() || message.is_empty() {
            tracing::debug!(conn_id = %conn_id, "send-message missing room or text, dropping");
            return;
        }

        self.directory.set_name(conn_id, &sender).await;

        // Echoed to the sender as well; the relay is the sole writer of
        // chat state and the timestamp is assigned here so every
        // recipient observes the same one.
        let event = ServerEvent::ReceiveMessage {
            sender,
            message,
            from: conn_id.to_string(),
            ts: Self::now_millis(),
        };
        self.broadcast(room_id, &event, None).await;
    }

    async fn handle_signal_warning(&self, conn_id: &str, room_id: &str) {
        if room_id.is_empty() {
            tracing::debug!(conn_id = %conn_id, "signal-warning without a room identifier, dropping");
            return;
        }

        tracing::warn!(conn_id = %conn_id, room_id = %room_id, "Attention lost in room");

        // Delivered to the originator too, so proctor and audit views
        // observe the same stream. Deliberately not debounced; repeats
        // are audit signal.
        let event = ServerEvent::ReceiveWarning {
            from: conn_id.to_string(),
        };
        self.broadcast(room_id, &event, None).await;
    }

    /// Fan one event out to a room's current members, optionally
    /// skipping the sender. An empty or unknown room delivers to
    /// nobody. The membership snapshot is taken first and the lock
    /// released, so a slow member's queue never stalls the others.
    async fn broadcast(&self, room_id: &str, event: &ServerEvent, exclude: Option<&str>) {
        let members = self.directory.members_of(room_id).await;
        if members.is_empty() {
            return;
        }

        let message = match event.to_message() {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, room_id = %room_id, "Failed to encode event");
                return;
            }
        };

        for member in &members {
            if exclude == Some(member.id.as_str()) {
                continue;
            }
            if member.sender.send(message.clone()).is_err() {
                // Writer task already gone; the disconnect path cleans
                // the member up, delivery to the rest continues.
                tracing::debug!(conn_id = %member.id, "Skipping departed connection");
            }
        }
    }

    fn deliver(conn: &Connection, event: &ServerEvent) {
        match event.to_message() {
            Ok(message) => {
                let _ = conn.sender.send(message);
            }
            Err(e) => tracing::error!(error = %e, conn_id = %conn.id, "Failed to encode event"),
        }
    }

    fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// (connections, rooms) counts for the stats endpoint.
    pub async fn stats(&self) -> (usize, usize) {
        self.directory.counts().await
    }
}
