//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.client_origin.as_deref());

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Restrict to the configured origins (comma-separated), or allow any
/// origin when none are configured
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let Some(origins) = client_origin else {
        return CorsLayer::permissive();
    };

    let allowed_origins: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    live_players: usize,
    dead_sessions: usize,
    tick: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        live_players: state.registry.live_count(),
        dead_sessions: state.registry.dead_count(),
        tick: state.world.current_tick(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, WorldSettings};
    use crate::test_support::RecordingConnection;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".to_string(),
            log_json: false,
            client_origin: None,
            world: WorldSettings::default(),
        }
    }

    #[tokio::test]
    async fn health_reports_registry_and_tick() {
        let state = AppState::new(test_config());
        state.session.on_open(RecordingConnection::new()).unwrap();
        state.world.tick(0.05);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("expected request to build");
        let response = build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("expected response body");
        let payload: Value = serde_json::from_slice(&body).expect("expected json body");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["live_players"], 1);
        assert_eq!(payload["dead_sessions"], 0);
        assert_eq!(payload["tick"], 1);
    }

    #[tokio::test]
    async fn plain_get_on_ws_is_not_an_upgrade() {
        let state = AppState::new(test_config());
        let request = Request::builder()
            .uri("/ws")
            .body(Body::empty())
            .expect("expected request to build");
        let response = build_router(state).oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
