use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::StreamExt;
use medassist_core::job_events::{JoinRequest, MSG_TYPE_JOIN};
use medassist_events::{CompletionNotifier, EventReceiver};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::state::AppState;
use crate::ws::heartbeat::run_sender;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Owner room to join immediately after the upgrade.
    pub owner_id: Option<String>,
}

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.notifier, params.owner_id))
}

/// Rooms joined by one connection, with the task forwarding each room's
/// events into the connection's outbound channel.
struct Rooms {
    conn_id: String,
    notifier: Arc<CompletionNotifier>,
    outbound: mpsc::UnboundedSender<Message>,
    joined: Vec<(String, JoinHandle<()>)>,
}

impl Rooms {
    async fn join(&mut self, owner_id: &str) {
        if owner_id.trim().is_empty() || self.joined.iter().any(|(o, _)| o == owner_id) {
            return;
        }
        let rx = self.notifier.subscribe(owner_id, &self.conn_id).await;
        let task = tokio::spawn(forward_events(rx, self.outbound.clone()));
        self.joined.push((owner_id.to_string(), task));
        tracing::info!(conn_id = %self.conn_id, owner_id, "WebSocket joined owner room");
    }

    async fn leave_all(self) {
        for (owner_id, task) in self.joined {
            self.notifier.unsubscribe(&owner_id, &self.conn_id).await;
            task.abort();
        }
    }
}

/// Serialize each event onto the connection's outbound channel.
async fn forward_events(mut rx: EventReceiver, outbound: mpsc::UnboundedSender<Message>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(text) => {
                if outbound.send(Message::Text(text.into())).is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, job_id = %event.job_id, "Failed to encode event"),
        }
    }
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket, spawns the sender (outbound + heartbeat), joins the
/// requested room, then processes inbound `join` messages until the peer
/// disconnects. All room memberships are released on exit.
async fn handle_socket(socket: WebSocket, notifier: Arc<CompletionNotifier>, owner_id: Option<String>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let (sink, mut stream) = socket.split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let send_task = tokio::spawn(run_sender(sink, out_rx, conn_id.clone()));

    let mut rooms = Rooms {
        conn_id: conn_id.clone(),
        notifier,
        outbound: out_tx,
        joined: Vec::new(),
    };
    if let Some(owner_id) = owner_id {
        rooms.join(&owner_id).await;
    }

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => match serde_json::from_str::<JoinRequest>(text.as_str()) {
                Ok(req) if req.message_type == MSG_TYPE_JOIN => rooms.join(&req.owner_id).await,
                _ => tracing::trace!(conn_id = %conn_id, "Ignoring unrecognised message"),
            },
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    rooms.leave_all().await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
