use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use super::ServerState;

pub async fn healthz(State(state): State<ServerState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(error) => {
            tracing::error!(%error, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error" })),
            )
        }
    }
}
