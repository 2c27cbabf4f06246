//! Outbound connection capability held by each player

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tracing::warn;
use uuid::Uuid;

/// Frames a client may fall behind by before it is dropped
pub const OUTBOUND_BUFFER: usize = 256;

/// Identity of one client connection
pub type ConnectionId = Uuid;

/// What the world needs from a transport: an identity, a best-effort text
/// sink and an open check. Socket lifecycle stays with the transport.
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn send(&self, text: String);

    fn is_open(&self) -> bool;
}

/// Shared handle stored on each player
pub type ConnectionHandle = Arc<dyn Connection>;

/// Send if the connection is still open; closed connections are skipped
/// silently. Returns whether the message was handed to the transport.
pub fn send_if_open(connection: &dyn Connection, text: &str) -> bool {
    if !connection.is_open() {
        return false;
    }
    connection.send(text.to_owned());
    true
}

/// Connection backed by a WebSocket writer task. The outbound buffer is
/// bounded; a client that stops reading is closed once it fills.
pub struct WsConnection {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    open: AtomicBool,
    shutdown: Notify,
}

impl WsConnection {
    /// Returns the handle and the receiving end the writer task drains
    pub fn new() -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let connection = Arc::new(Self {
            id: Uuid::new_v4(),
            tx,
            open: AtomicBool::new(true),
            shutdown: Notify::new(),
        });
        (connection, rx)
    }

    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.shutdown.notify_one();
        }
    }

    /// Resolves once the connection has been closed from this side
    pub async fn closed(&self) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        self.shutdown.notified().await;
    }
}

impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, text: String) {
        match self.tx.try_send(text) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(connection = %self.id, "Outbound buffer full, closing connection");
                self.close();
            }
            // Writer gone means the socket is closing; nothing to report
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}
