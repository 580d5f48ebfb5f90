use utoipa::OpenApi;

use crate::handlers::stream;
use crate::routes::{health, snapshot};

#[derive(OpenApi)]
#[openapi(
    paths(stream::data_stream, snapshot::get_snapshot, health::health_check),
    components(schemas(health::HealthResponse, snapshot::SnapshotResponse)),
    tags(
        (name = "data", description = "Streamed points and the server-side mirror"),
        (name = "health", description = "Service status")
    )
)]
pub struct ApiDoc;
