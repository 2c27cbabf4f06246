//! WebSocket transport and wire protocol

pub mod connection;
pub mod handler;
pub mod protocol;
