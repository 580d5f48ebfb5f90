use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{error::ApiResult, state::AppState};

/// What a late subscriber needs to backfill before following `/data`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SnapshotResponse {
    pub fields: Vec<String>,
    /// Positional rows in `fields` order, oldest first
    pub records: Vec<Vec<f64>>,
    pub version: u64,
    /// `null` when the mirror is unbounded
    pub capacity: Option<usize>,
    pub mode: String,
}

/// Current contents of the server-side mirror
#[utoipa::path(
    get,
    path = "/snapshot",
    responses(
        (status = 200, description = "Buffered points", body = SnapshotResponse)
    ),
    tag = "data"
)]
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> ApiResult<Json<SnapshotResponse>> {
    let snapshot = state.mirror.snapshot();
    let fields = snapshot
        .schema()
        .unwrap_or(&state.schema)
        .fields()
        .to_vec();

    Ok(Json(SnapshotResponse {
        fields,
        records: snapshot.iter().map(|r| r.values().to_vec()).collect(),
        version: snapshot.version(),
        capacity: state.mirror.capacity().limit(),
        mode: state.mirror.mode().to_string(),
    }))
}
