//! Health check endpoints
//!
//! - /health, /healthz - Liveness check, always 200 while the process serves
//! - /ready, /readyz - Readiness check, 503 when the store cannot be reached

use hyper::{Response, StatusCode};
use serde::Serialize;

use super::respond::{json_response, FullBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// `mongodb` or `memory`
    pub backend: &'static str,
    /// `development` or `production`
    pub mode: &'static str,
    pub node_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn build_health_response(state: &AppState, error: Option<String>) -> HealthResponse {
    HealthResponse {
        healthy: error.is_none(),
        version: env!("CARGO_PKG_VERSION"),
        backend: state.ctx.stores.backend(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        node_id: state.args.node_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        error,
    }
}

pub fn health_check(state: &AppState) -> Response<FullBody> {
    json_response(StatusCode::OK, &build_health_response(state, None))
}

/// Ready when a trivial admin lookup succeeds within the store timeout.
pub async fn readiness_check(state: &AppState) -> Response<FullBody> {
    let lookup = tokio::time::timeout(
        state.args.store_timeout(),
        state.ctx.stores.admins.find_one(bson::doc! { "_id": bson::oid::ObjectId::new() }),
    )
    .await;

    let error = match lookup {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some("Store did not answer in time".to_string()),
    };
    let status = if error.is_none() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &build_health_response(state, error))
}
