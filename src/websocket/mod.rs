pub mod hub;
pub mod protocol;

use crate::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use hub::Hub;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Accepts one connection for its lifetime: registers with the
/// Hub, pumps outbound frames from its per-connection channel, and feeds
/// inbound text frames to the Hub's dispatch pipeline.
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let client = hub.connect(tx).await;
    let client_id = client.client_id;

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => hub.handle_frame(client_id, &text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    hub.disconnect(client_id).await;
    writer.abort();
}
