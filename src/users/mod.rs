use axum::{extract::State, http::StatusCode, response::IntoResponse, routing};
use axum_jsonschema::Json;
use error_stack::ResultExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{auth::Authed, server::ServerState, Error};

pub mod queries;

crate::make_object_id!(UserId);

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize, Debug, Clone, Default, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UserCreatePayload {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Self-service profile update. Absent fields keep their current value.
#[derive(Deserialize, Debug, Clone, Default, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UserSelfUpdatePayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

async fn get_current_user(
    State(state): State<ServerState>,
    auth: Authed,
) -> Result<impl IntoResponse, Error> {
    let user = queries::get(&state.db, auth.user_id).await?;

    Ok(Json(user))
}

async fn update_current_user(
    State(state): State<ServerState>,
    auth: Authed,
    Json(payload): Json<UserSelfUpdatePayload>,
) -> Result<impl IntoResponse, Error> {
    let mut tx = state.db.begin().await.change_context(Error::Db)?;
    let updated = queries::update_self(&mut *tx, auth.user_id, payload).await?;
    tx.commit().await.change_context(Error::Db)?;

    let status = if updated {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok(status)
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route("/users/me", routing::get(get_current_user))
        .route("/users/me", routing::put(update_current_user))
}
