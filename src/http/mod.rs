//! HTTP surface: health check and the WebSocket endpoint

pub mod routes;

pub use routes::build_router;
