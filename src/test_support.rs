//! In-memory doubles shared by unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::game::player::{Player, SharedPlayer};
use crate::ws::connection::{Connection, ConnectionId};

/// Connection that records everything sent to it
pub struct RecordingConnection {
    id: ConnectionId,
    sent: Mutex<Vec<String>>,
    open: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            sent: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
        })
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Payloads of recorded messages carrying `tag`
    pub fn payloads(&self, tag: &str) -> Vec<serde_json::Value> {
        let prefix = format!("{}:", tag);
        self.sent()
            .iter()
            .filter_map(|m| m.strip_prefix(prefix.as_str()))
            .map(|json| serde_json::from_str(json).expect("recorded payload is json"))
            .collect()
    }
}

impl Connection for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, text: String) {
        self.sent.lock().push(text);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Player at a fixed position with a recording connection
pub fn player_at(username: &str, x: f32, y: f32) -> (SharedPlayer, Arc<RecordingConnection>) {
    let connection = RecordingConnection::new();
    let player = Player::new(
        username.to_string(),
        format!("token-{}", username),
        x,
        y,
        connection.clone(),
    );
    (Arc::new(Mutex::new(player)), connection)
}
