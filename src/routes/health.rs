use axum::{extract::State, http::StatusCode, Json};
use diesel::{sql_query, RunQueryDsl};
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

/// Liveness plus a database round trip; 503 when Postgres is unreachable.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = state
        .db()
        .and_then(|mut conn| sql_query("SELECT 1").execute(&mut conn).map_err(Into::into));

    match database {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "ok" })),
        ),
        Err(err) => {
            warn!(error = ?err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unavailable" })),
            )
        }
    }
}
