use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing,
};
use axum_extra::extract::Query;
use axum_jsonschema::Json;
use error_stack::ResultExt;

use super::{queries, types::*, AirportId};
use crate::{
    auth::{admin_required, Authed},
    server::ServerState,
    Error,
};

async fn get(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<AirportId>,
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
    Json(payload): Json<AirportCreatePayload>,
) -> Result<impl IntoResponse, Error> {
    let mut tx = state.db.begin().await.change_context(Error::Db)?;
    let result = queries::create(&mut tx, payload).await?;
    tx.commit().await.change_context(Error::Db)?;

    Ok((StatusCode::CREATED, Json(result)))
}

async fn update(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(id): Path<AirportId>,
    Json(payload): Json<AirportUpdatePayload>,
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
    Path(id): Path<AirportId>,
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
        .route(
            "/airports",
            routing::get(list).route_layer(admin_required()),
        )
        .route(
            "/airports/:id",
            routing::get(get).route_layer(admin_required()),
        )
        .route(
            "/airports",
            routing::post(create).route_layer(admin_required()),
        )
        .route(
            "/airports/:id",
            routing::put(update).route_layer(admin_required()),
        )
        .route(
            "/airports/:id",
            routing::delete(delete).route_layer(admin_required()),
        )
}

#[cfg(test)]
mod test {
    use super::super::testing::make_create_payload;
    use super::*;
    use crate::tests::{start_app, BootstrappedData};

    async fn setup_test_objects(
        db: &sqlx::PgPool,
        count: usize,
    ) -> Vec<(AirportCreatePayload, AirportCreateResult)> {
        let mut tx = db.begin().await.unwrap();
        let mut objects = Vec::with_capacity(count);
        for i in 0..count {
            let payload = make_create_payload(i);
            let result = super::queries::create_raw(&mut tx, AirportId::new(), payload.clone())
                .await
                .expect("Creating test object failed");

            objects.push((payload, result));
        }

        tx.commit().await.unwrap();
        objects
    }

    #[sqlx::test]
    async fn list_objects(pool: sqlx::PgPool) {
        let (
            _app,
            BootstrappedData {
                admin_user,
                user,
                disabled_user,
                ..
            },
        ) = start_app(pool.clone()).await;

        let added_objects = setup_test_objects(&pool, 3).await;

        let results = admin_user
            .client
            .get("airports")
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json::<Vec<serde_json::Value>>()
            .await
            .unwrap();

        assert_eq!(results.len(), added_objects.len());

        for result in results {
            let (_, added) = added_objects
                .iter()
                .find(|i| i.1.id.to_string() == result["id"].as_str().unwrap())
                .expect("Returned object did not match any of the added objects");
            assert_eq!(result["name"], added.name, "field name");
            assert_eq!(
                result["closest_big_city"], added.closest_big_city,
                "field closest_big_city"
            );
        }

        // Only admins may read reference data.
        let response = user.client.get("airports").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);

        let response = disabled_user.client.get("airports").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    async fn list_fetch_specific_ids(pool: sqlx::PgPool) {
        let (_app, BootstrappedData { admin_user, .. }) = start_app(pool.clone()).await;

        let added_objects = setup_test_objects(&pool, 3).await;

        let results = admin_user
            .client
            .get("airports")
            .query(&[("id", added_objects[0].1.id), ("id", added_objects[2].1.id)])
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json::<Vec<serde_json::Value>>()
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .any(|o| o["id"] == added_objects[0].1.id.to_string()));
        assert!(results
            .iter()
            .any(|o| o["id"] == added_objects[2].1.id.to_string()));
    }

    #[sqlx::test]
    async fn get_object(pool: sqlx::PgPool) {
        let (
            _app,
            BootstrappedData {
                admin_user, user, ..
            },
        ) = start_app(pool.clone()).await;

        let added_objects = setup_test_objects(&pool, 2).await;

        let result = admin_user
            .client
            .get(&format!("airports/{}", added_objects[1].1.id))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap();

        let (_, added) = &added_objects[1];
        assert_eq!(result["id"].as_str().unwrap(), added.id.to_string());
        assert_eq!(result["name"], added.name);
        assert_eq!(result["closest_big_city"], added.closest_big_city);

        let response = user
            .client
            .get(&format!("airports/{}", added_objects[1].1.id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    async fn create_object(pool: sqlx::PgPool) {
        let (
            _app,
            BootstrappedData {
                admin_user, user, ..
            },
        ) = start_app(pool.clone()).await;

        let create_payload = make_create_payload(10);
        let created: serde_json::Value = admin_user
            .client
            .post("airports")
            .json(&create_payload)
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(created["name"], create_payload.name);
        assert_eq!(created["closest_big_city"], create_payload.closest_big_city);

        let fetched: serde_json::Value = admin_user
            .client
            .get(&format!("airports/{}", created["id"].as_str().unwrap()))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(fetched, created);

        let response = user
            .client
            .post("airports")
            .json(&create_payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    async fn update_object(pool: sqlx::PgPool) {
        let (_app, BootstrappedData { admin_user, .. }) = start_app(pool.clone()).await;

        let added_objects = setup_test_objects(&pool, 2).await;

        let update_payload = make_create_payload(20);
        admin_user
            .client
            .put(&format!("airports/{}", added_objects[1].1.id))
            .json(&update_payload)
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();

        let updated: serde_json::Value = admin_user
            .client
            .get(&format!("airports/{}", added_objects[1].1.id))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(updated["name"], update_payload.name);
        assert_eq!(
            updated["closest_big_city"],
            update_payload.closest_big_city
        );

        // Make sure that no other objects were updated
        let non_updated: serde_json::Value = admin_user
            .client
            .get(&format!("airports/{}", added_objects[0].1.id))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(non_updated["name"], added_objects[0].1.name);

        let missing = admin_user
            .client
            .put(&format!("airports/{}", AirportId::new()))
            .json(&update_payload)
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    async fn delete_object(pool: sqlx::PgPool) {
        let (
            _app,
            BootstrappedData {
                admin_user, user, ..
            },
        ) = start_app(pool.clone()).await;

        let added_objects = setup_test_objects(&pool, 2).await;

        admin_user
            .client
            .delete(&format!("airports/{}", added_objects[1].1.id))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();

        let response = admin_user
            .client
            .get(&format!("airports/{}", added_objects[1].1.id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        // Delete should not happen without permissions
        let response = user
            .client
            .delete(&format!("airports/{}", added_objects[0].1.id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);

        // Make sure other objects still exist
        let response = admin_user
            .client
            .get(&format!("airports/{}", added_objects[0].1.id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }
}
