use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing,
};
use axum_extra::extract::Query;
use axum_jsonschema::Json;
use error_stack::ResultExt;

use super::{queries, types::*, FlightId};
use crate::{
    auth::{admin_required, login_required, Authed},
    server::ServerState,
    Error,
};

async fn get(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<FlightId>,
) -> Result<impl IntoResponse, Error> {
    let object = queries::get_populated(&state.db, id).await?;

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
    Json(payload): Json<FlightCreatePayload>,
) -> Result<impl IntoResponse, Error> {
    let mut tx = state.db.begin().await.change_context(Error::Db)?;
    let result = queries::create(&mut tx, payload).await?;
    tx.commit().await.change_context(Error::Db)?;

    Ok((StatusCode::CREATED, Json(result)))
}

async fn update(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<FlightId>,
    Json(payload): Json<FlightUpdatePayload>,
) -> Result<impl IntoResponse, Error> {
    let mut tx = state.db.begin().await.change_context(Error::Db)?;
    let updated = queries::update(&mut tx, id, payload).await?;
    tx.commit().await.change_context(Error::Db)?;

    if updated {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

async fn delete(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<FlightId>,
) -> Result<impl IntoResponse, Error> {
    let deleted = queries::delete(&state.db, id).await?;

    if deleted {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

pub fn create_routes() -> axum::Router<ServerState> {
    // Reads are open to any logged-in user; writes stay admin-only.
    axum::Router::new()
        .route("/flights", routing::get(list).route_layer(login_required()))
        .route(
            "/flights/:id",
            routing::get(get).route_layer(login_required()),
        )
        .route(
            "/flights",
            routing::post(create).route_layer(admin_required()),
        )
        .route(
            "/flights/:id",
            routing::put(update).route_layer(admin_required()),
        )
        .route(
            "/flights/:id",
            routing::delete(delete).route_layer(admin_required()),
        )
}
