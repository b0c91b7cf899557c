use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::connection::SimpleConnection;

use happy_shared::clients::db::get_conn;
use happy_shared::types::api::{HealthCheck, HealthResponse};

use crate::AppState;

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let db_check = match get_conn(&state.db).and_then(|mut conn| {
        conn.batch_execute("SELECT 1").map_err(Into::into)
    }) {
        Ok(()) => HealthCheck::passed("database"),
        Err(e) => HealthCheck::failed("database", e.to_string()),
    };

    let response = HealthResponse::healthy("happy-api", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![db_check]);
    let status = if response.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}
