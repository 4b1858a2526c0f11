use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::hub::{ClientEvent, SessionGateway};

/// Per-connection loop: register with the gateway, pump inbound events
/// into it, and drain the connection's outbound queue from its own
/// task so a slow socket never blocks fan-out to the rest of its room.
pub async fn handle_hub_websocket(websocket: WebSocket, gateway: Arc<SessionGateway>) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let conn_id = gateway.on_connect(tx).await;
    tracing::info!(conn_id = %conn_id, "New hub WebSocket connection established");

    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => handle_client_message(&gateway, &conn_id, message).await,
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Reached on clean and unclean closes alike; the only cleanup path.
    gateway.on_disconnect(&conn_id).await;
    sender_task.abort();
}

async fn handle_client_message(gateway: &SessionGateway, conn_id: &str, message: Message) {
    // Pings, pongs, binary and close frames are not hub events.
    if let Ok(text) = message.to_str() {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => gateway.on_event(conn_id, event).await,
            Err(e) => {
                // Fire-and-forget: there is no response channel to
                // report the failure on, so the event just disappears.
                tracing::debug!(
                    conn_id = %conn_id,
                    error = %e,
                    raw_message = %text,
                    "Dropping malformed hub event"
                );
            }
        }
    }
}
