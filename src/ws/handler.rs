//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::connection::{Connection, ConnectionHandle, ConnectionId, WsConnection};

/// WebSocket upgrade handler. Anyone may connect; identity is issued on join.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection, outbound_rx) = WsConnection::new();
    let connection_id = connection.id();
    let handle: ConnectionHandle = connection.clone();
    info!(connection = %connection_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Spawn writer task: outbound channel -> WebSocket
    let writer_handle = tokio::spawn(write_outbound(connection_id, ws_sink, outbound_rx));

    match state.session.on_open(handle.clone()) {
        Ok(_) => {
            tokio::select! {
                _ = read_inbound(&state, &handle, ws_stream) => {}
                _ = connection.closed() => {
                    warn!(connection = %connection_id, "Dropping client that fell behind");
                }
            }
        }
        Err(e) => error!(connection = %connection_id, error = %e, "Failed to admit player"),
    }

    // Stop sends before the player is forgotten
    connection.close();
    state.session.on_close(&handle);
    writer_handle.abort();

    info!(connection = %connection_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> session
async fn read_inbound(
    state: &AppState,
    connection: &ConnectionHandle,
    mut ws_stream: SplitStream<WebSocket>,
) {
    let connection_id = connection.id();
    let rate_limiter = ConnectionRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_inbound() {
                    warn!(connection = %connection_id, "Rate limited client message");
                    continue;
                }
                state.session.on_message(connection, &text);
            }
            Ok(Message::Binary(_)) => {
                warn!(connection = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(connection = %connection_id, "Received ping/pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                warn!(connection = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Writer loop. Ends when the socket fails or every sender is gone; either
/// way the connection reads as closed from then on.
async fn write_outbound(
    connection_id: ConnectionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<String>,
) {
    while let Some(text) = outbound_rx.recv().await {
        if let Err(e) = ws_sink.send(Message::Text(text)).await {
            debug!(connection = %connection_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}
