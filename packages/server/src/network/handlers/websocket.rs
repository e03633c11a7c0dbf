//! Real-time channel endpoint.
//!
//! Each accepted upgrade registers a subscriber in the channel registry
//! and runs two loops: a write loop draining the subscriber's bounded
//! outbound queue into the socket, and a read loop that answers pings
//! and watches for the peer closing. The channel is one-way — inbound
//! text frames are ignored — so the read loop exists only to keep the
//! connection honest. Either loop ending removes the subscriber.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use metrics::gauge;
use tracing::{debug, info};

use super::AppState;
use crate::network::connection::OutboundFrame;

/// Upgrades an HTTP connection to a real-time channel subscription.
pub async fn ws_upgrade_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (handle, mut outbound_rx) = state.registry.register(&state.config.connection);
    let connection = handle.id;
    info!(connection = connection.0, subscribers = state.registry.count(), "channel subscriber connected");
    gauge!("tagbridge_channel_subscribers").set(state.registry.count() as f64);

    let (mut sink, mut stream) = socket.split();

    let mut write_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let message = match frame {
                OutboundFrame::Text(text) => Message::Text(text.into()),
                OutboundFrame::Close(reason) => {
                    let close = reason.map(|reason| CloseFrame {
                        code: axum::extract::ws::close_code::AWAY,
                        reason: reason.into(),
                    });
                    let _ = sink.send(Message::Close(close)).await;
                    break;
                }
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut read_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                // One-way channel: inbound frames are ignored.
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => write_task.abort(),
    }

    state.registry.remove(connection);
    gauge!("tagbridge_channel_subscribers").set(state.registry.count() as f64);
    debug!(connection = connection.0, "channel subscriber disconnected");
}
