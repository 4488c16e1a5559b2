use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::PaymentEvent;
use crate::services::broadcaster::{Binding, ConnectionId, EventBroadcaster};
use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Messages a client may send over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(default, rename = "tenantId", alias = "tenant_id")]
        tenant_id: Option<String>,
    },
    Unsubscribe {
        #[serde(default, rename = "tenantId", alias = "tenant_id")]
        tenant_id: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    PaymentEvent(&'a PaymentEvent),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Applies one client frame to the registry. Returns the connection's binding afterwards.
pub fn apply_client_message(
    broadcaster: &EventBroadcaster,
    connection_id: ConnectionId,
    text: &str,
) -> Option<Binding> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { tenant_id }) => {
            broadcaster.subscribe(connection_id, tenant_id.as_deref())
        }
        Ok(ClientMessage::Unsubscribe { tenant_id }) => {
            broadcaster.unsubscribe(connection_id, tenant_id.as_deref());
            broadcaster.binding(connection_id)
        }
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "ignoring malformed client message");
            broadcaster.binding(connection_id)
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut events) = state.broadcaster.connect();

    let broadcaster = state.broadcaster.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    apply_client_message(&broadcaster, connection_id, &text);
                }
                Message::Close(_) => {
                    tracing::info!(connection_id = %connection_id, "Client closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat_interval = tokio::time::interval(HEARTBEAT_INTERVAL);

        loop {
            tokio::select! {
                _ = heartbeat_interval.tick() => {
                    if sender.send(Message::Ping(vec![])).await.is_err() {
                        tracing::info!(connection_id = %connection_id, "Client disconnected during heartbeat");
                        break;
                    }
                }
                event = events.recv() => {
                    // None once the broadcaster drops this connection.
                    let Some(event) = event else { break };
                    let json = match serde_json::to_string(&ServerMessage::PaymentEvent(&event)) {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::error!("Failed to serialize payment event: {}", e);
                            continue;
                        }
                    };

                    if sender.send(Message::Text(json)).await.is_err() {
                        tracing::info!(connection_id = %connection_id, "Client disconnected");
                        break;
                    }
                }
            }
        }
        let _ = sender.close().await;
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    state.broadcaster.disconnect(connection_id);
}
