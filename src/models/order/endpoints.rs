use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing,
};
use axum_extra::extract::Query;
use axum_jsonschema::Json;
use error_stack::ResultExt;

use super::{queries, types::*, OrderId};
use crate::{
    auth::{login_required, Authed},
    server::ServerState,
    Error,
};

async fn get(
    State(state): State<ServerState>,
    auth: Authed,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse, Error> {
    let object = queries::get(&state.db, &auth, id).await?;

    Ok(Json(object))
}

async fn list(
    State(state): State<ServerState>,
    auth: Authed,
    Query(qs): Query<queries::ListQueryFilters>,
) -> Result<impl IntoResponse, Error> {
    let results = queries::list(&state.db, &auth, &qs).await?;

    Ok(Json(results))
}

async fn create(
    State(state): State<ServerState>,
    auth: Authed,
    Json(payload): Json<OrderCreatePayload>,
) -> Result<impl IntoResponse, Error> {
    let mut tx = state.db.begin().await.change_context(Error::Db)?;
    let result = queries::create(&mut tx, &auth, payload).await?;
    tx.commit().await.change_context(Error::Db)?;

    Ok((StatusCode::CREATED, Json(result)))
}

async fn delete(
    State(state): State<ServerState>,
    auth: Authed,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse, Error> {
    let deleted = queries::delete(&state.db, &auth, id).await?;

    if deleted {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

pub fn create_routes() -> axum::Router<ServerState> {
    // Orders belong to the calling user; any active user may manage their own.
    axum::Router::new()
        .route("/orders", routing::get(list).route_layer(login_required()))
        .route(
            "/orders/:id",
            routing::get(get).route_layer(login_required()),
        )
        .route(
            "/orders",
            routing::post(create).route_layer(login_required()),
        )
        .route(
            "/orders/:id",
            routing::delete(delete).route_layer(login_required()),
        )
}
