use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::mpsc;

/// Interval between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Forward outbound messages to the socket sink, interleaving a Ping frame
/// every [`HEARTBEAT_INTERVAL`].
///
/// Returns when the outbound channel closes or the sink rejects a frame.
pub(crate) async fn run_sender(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    conn_id: String,
) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        let msg = tokio::select! {
            msg = outbound.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = ticker.tick() => {
                tracing::trace!(conn_id = %conn_id, "WebSocket heartbeat ping");
                Message::Ping(Bytes::new())
            }
        };

        if sink.send(msg).await.is_err() {
            tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
            break;
        }
    }
}
