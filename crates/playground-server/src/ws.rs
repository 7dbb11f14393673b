//! `WebSocket` endpoint speaking the packet protocol.
//!
//! Each socket gets a connection id, an outbound queue registered with the
//! hub, and two tasks:
//!
//! - the **reader** (the upgrade task itself) forwards every text frame to
//!   the hub,
//! - the **writer** drains the outbound queue into the socket.
//!
//! The hub closes a connection by dropping its queue; the writer then ends
//! and the reader stops with it. However the socket ends, the connection
//! is unregistered so the hub can run the disconnect procedure.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use playground_core::Registration;
use playground_types::ConnectionId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade to a `WebSocket` and join the hub.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let id = ConnectionId::new();
    let capacity = state.ctx.settings.hub.outbound_queue.max(1);
    let (outbound, queue) = mpsc::channel(capacity);

    if let Err(e) = state.hub.register(Registration { id, outbound }).await {
        warn!(connection = %id, error = %e, "Hub unavailable; closing socket");
        return;
    }
    debug!(connection = %id, "WebSocket client connected");

    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_frames(sink, queue));

    loop {
        tokio::select! {
            _ = &mut writer => {
                debug!(connection = %id, "Outbound queue closed by hub");
                break;
            }
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if state.hub.dispatch(id, text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(connection = %id, "WebSocket client disconnected");
                    break;
                }
                Some(Err(e)) => {
                    debug!(connection = %id, error = %e, "WebSocket error");
                    break;
                }
                // Pings are answered by the protocol layer; binary frames are not part of the protocol.
                Some(Ok(_)) => {}
            },
        }
    }

    writer.abort();
    if let Err(e) = state.hub.unregister(id).await {
        debug!(connection = %id, error = %e, "Hub stopped before unregister");
    }
}

async fn write_frames(mut sink: SplitSink<WebSocket, Message>, mut queue: mpsc::Receiver<String>) {
    while let Some(frame) = queue.recv().await {
        if sink.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}
