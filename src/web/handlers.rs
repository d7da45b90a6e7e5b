//! HTTP request handlers
//!
//! Handlers stay thin: address validation happens here at the boundary,
//! everything else is delegated to the service layer.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde_json::json;
use std::net::IpAddr;
use tracing::{error, warn};

use super::{responses, AppState};
use crate::errors::LookupError;
use crate::models::{LookupRequest, LookupResponse};

pub async fn lookup(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> Response {
    // Malformed addresses never reach the database manager.
    let addr: IpAddr = match request.ip.trim().parse() {
        Ok(addr) => addr,
        Err(_) => return responses::error(StatusCode::BAD_REQUEST, "failed to parse ip address"),
    };

    match state.geoip.lookup(addr).await {
        Ok(record) => responses::ok(LookupResponse::new(addr, &record)),
        Err(LookupError::NotReady) => {
            warn!("lookup rejected: no database installed yet");
            responses::error(StatusCode::SERVICE_UNAVAILABLE, "geoip database not ready")
        }
        Err(err @ LookupError::Decode(_)) => {
            error!("lookup failed for {addr}: {err}");
            responses::error(StatusCode::INTERNAL_SERVER_ERROR, "lookup failed")
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ready = state.geoip.is_ready().await;
    Json(json!({
        "status": if ready { "healthy" } else { "starting" },
        "database_ready": ready,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
