use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing,
};
use axum_extra::extract::Query;
use axum_jsonschema::Json;
use error_stack::ResultExt;

use super::{queries, types::*, RouteId};
use crate::{
    auth::{admin_required, Authed},
    server::ServerState,
    Error,
};

async fn get(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<RouteId>,
) -> Result<impl IntoResponse, Error> {
    let object = queries::get(&state.db, id).await?;

    Ok(Json(object))
}

async fn list(
    State(state): State<ServerState>,
    _auth: Authed,
    Query(qs): Query<queries::ListQueryFilters>,
) -> Result<impl IntoResponse, Error> {
    let results = queries::list(&state.db, &qs).await?;

    Ok(Json(results))
}

async fn create(
    State(state): State<ServerState>,
    _auth: Authed,
    Json(payload): Json<RouteCreatePayload>,
) -> Result<impl IntoResponse, Error> {
    let mut tx = state.db.begin().await.change_context(Error::Db)?;
    let result = queries::create(&mut tx, payload).await?;
    tx.commit().await.change_context(Error::Db)?;

    Ok((StatusCode::CREATED, Json(result)))
}

async fn update(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<RouteId>,
    Json(payload): Json<RouteUpdatePayload>,
) -> Result<impl IntoResponse, Error> {
    let updated = queries::update(&state.db, id, payload).await?;

    if updated {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

async fn delete(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<RouteId>,
) -> Result<impl IntoResponse, Error> {
    let deleted = queries::delete(&state.db, id).await?;

    if deleted {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route("/routes", routing::get(list).route_layer(admin_required()))
        .route(
            "/routes/:id",
            routing::get(get).route_layer(admin_required()),
        )
        .route(
            "/routes",
            routing::post(create).route_layer(admin_required()),
        )
        .route(
            "/routes/:id",
            routing::put(update).route_layer(admin_required()),
        )
        .route(
            "/routes/:id",
            routing::delete(delete).route_layer(admin_required()),
        )
}
