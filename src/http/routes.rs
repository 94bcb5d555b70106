//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::app::{AppState, RoomSummary};
use crate::game::RoomId;
use crate::util::time::uptime_secs;

/// Build the admin router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms", get(rooms_handler))
        .route("/rooms/:id", get(room_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_tick: u64,
    tick_rate: u32,
    rooms: usize,
    players: usize,
    queue_size: usize,
    packets_dropped: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let server = state.directory.server();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        server_tick: server.server_tick,
        tick_rate: state.config.tick_rate,
        rooms: state.directory.room_count(),
        players: server.connected_players,
        queue_size: server.queue_size,
        packets_dropped: server.packets_dropped,
    })
}

// ============================================================================
// Room endpoints
// ============================================================================

#[derive(Serialize)]
struct RoomsResponse {
    rooms: Vec<RoomSummary>,
}

async fn rooms_handler(State(state): State<AppState>) -> Json<RoomsResponse> {
    Json(RoomsResponse {
        rooms: state.directory.rooms(),
    })
}

async fn room_handler(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<RoomSummary>, AppError> {
    state
        .directory
        .room(RoomId(id))
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("room {id}")))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::app::{RoomDirectory, ServerSummary};
    use crate::config::Config;
    use crate::ecs::PlayerId;
    use crate::game::RoomState;

    fn state() -> AppState {
        let directory = Arc::new(RoomDirectory::new());
        directory.publish_room(RoomSummary {
            id: RoomId(0),
            state: RoomState::Active,
            tick: 120,
            players: vec![PlayerId(0), PlayerId(1)],
            active_entities: 15,
            walls: 13,
            updated_at_ms: 0,
        });
        directory.publish_server(ServerSummary {
            server_tick: 120,
            connected_players: 2,
            ..ServerSummary::default()
        });
        AppState::new(Arc::new(Config::default()), directory)
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = build_router(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_published_counters() {
        let (status, body) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["server_tick"], 120);
        assert_eq!(body["rooms"], 1);
        assert_eq!(body["players"], 2);
    }

    #[tokio::test]
    async fn rooms_are_listed_and_fetched_by_id() {
        let (status, body) = get_json("/rooms").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rooms"][0]["id"], 0);
        assert_eq!(body["rooms"][0]["state"], "active");

        let (status, body) = get_json("/rooms/0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["players"], serde_json::json!([0, 1]));
        assert_eq!(body["walls"], 13);
    }

    #[tokio::test]
    async fn missing_room_is_404() {
        let (status, body) = get_json("/rooms/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "room 42");
    }
}
