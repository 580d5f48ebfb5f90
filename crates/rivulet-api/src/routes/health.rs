use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{error::ApiResult, state::AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: HashMap<String, String>,
    /// Clients attached to `/data`
    pub subscribers: usize,
    /// Records held by the server-side mirror
    pub buffered: usize,
}

/// Health check endpoint
///
/// Returns the health status of the API and the emitter
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let snapshot = state.mirror.snapshot();

    let mut services = HashMap::new();
    let emitter = if snapshot.version() > 0 {
        "emitting"
    } else {
        "starting"
    };
    services.insert("emitter".to_string(), emitter.to_string());

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services,
        subscribers: state.subscribers(),
        buffered: snapshot.len(),
    }))
}
