//! Health and liveness endpoints

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    status: &'static str,
    version: &'static str,
    commit: &'static str,
    mode: &'static str,
    #[serde(rename = "nodeId")]
    node_id: String,
    timestamp: String,
}

#[derive(Serialize)]
struct BannerResponse {
    wicket: &'static str,
}

/// GET /health
pub fn health_check(state: Arc<AppState>) -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            healthy: true,
            status: "online",
            version: env!("CARGO_PKG_VERSION"),
            commit: env!("GIT_COMMIT_SHORT"),
            mode: if state.args.dev_mode {
                "development"
            } else {
                "production"
            },
            node_id: state.args.node_id.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    )
}

/// GET /
pub fn root_banner() -> Response<BoxBody> {
    json_response(StatusCode::OK, &BannerResponse { wicket: "running" })
}
