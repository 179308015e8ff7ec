use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing,
};
use axum_extra::extract::Query;
use axum_jsonschema::Json;
use error_stack::ResultExt;

use super::{queries, types::*, CrewId};
use crate::{
    auth::{admin_required, Authed},
    server::ServerState,
    Error,
};

async fn get(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<CrewId>,
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
    Json(payload): Json<CrewCreatePayload>,
) -> Result<impl IntoResponse, Error> {
    let mut tx = state.db.begin().await.change_context(Error::Db)?;
    let result = queries::create(&mut tx, payload).await?;
    tx.commit().await.change_context(Error::Db)?;

    Ok((StatusCode::CREATED, Json(result)))
}

async fn update(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<CrewId>,
    Json(payload): Json<CrewUpdatePayload>,
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
    Path(id): Path<CrewId>,
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
        .route("/crews", routing::get(list).route_layer(admin_required()))
        .route("/crews/:id", routing::get(get).route_layer(admin_required()))
        .route("/crews", routing::post(create).route_layer(admin_required()))
        .route("/crews/:id", routing::put(update).route_layer(admin_required()))
        .route(
            "/crews/:id",
            routing::delete(delete).route_layer(admin_required()),
        )
}

#[cfg(test)]
mod test {
    use super::super::testing::make_create_payload;
    use super::*;
    use crate::tests::{start_app, BootstrappedData};

    #[sqlx::test]
    async fn crud_and_permissions(pool: sqlx::PgPool) {
        let (
            _app,
            BootstrappedData {
                admin_user, user, ..
            },
        ) = start_app(pool.clone()).await;

        let payload = make_create_payload(1);
        let created: serde_json::Value = admin_user
            .client
            .post("crews")
            .json(&payload)
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(created["first_name"], payload.first_name);
        assert_eq!(
            created["full_name"],
            format!("{} {}", payload.first_name, payload.last_name)
        );

        let id = created["id"].as_str().unwrap();

        let listed: Vec<serde_json::Value> = admin_user
            .client
            .get("crews")
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let update = make_create_payload(2);
        admin_user
            .client
            .put(&format!("crews/{id}"))
            .json(&update)
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();

        let fetched: serde_json::Value = admin_user
            .client
            .get(&format!("crews/{id}"))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["last_name"], update.last_name);

        // Regular users have no access at all.
        let response = user.client.get("crews").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
        let response = user
            .client
            .post("crews")
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);

        admin_user
            .client
            .delete(&format!("crews/{id}"))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();

        let response = admin_user
            .client
            .get(&format!("crews/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
