//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Browsers first obtain an ownership key (`POST /api/session`, stored
//! locally and reused) or take one from a room link, then open
//! `/api/ws?room=<key>`. Everything else happens over that websocket.

pub mod ws;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::owner::OwnerKey;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/session", post(create_session))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub owner_key: String,
}

/// Mint an anonymous ownership key for a browser that has none yet.
pub async fn create_session() -> Json<SessionResponse> {
    Json(SessionResponse { owner_key: OwnerKey::anonymous().to_string() })
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
