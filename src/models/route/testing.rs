use super::{queries, Route, RouteCreatePayload, RouteId};
use crate::models::airport::{
    self, testing::make_create_payload as make_airport_payload, Airport, AirportId,
};

/// Insert two airports and a route between them.
pub async fn setup_route(db: &sqlx::PgPool, i: usize) -> (Airport, Airport, Route) {
    let mut tx = db.begin().await.unwrap();

    let source = airport::queries::create_raw(&mut tx, AirportId::new(), make_airport_payload(i))
        .await
        .expect("Creating test source airport failed");
    let destination =
        airport::queries::create_raw(&mut tx, AirportId::new(), make_airport_payload(i + 100))
            .await
            .expect("Creating test destination airport failed");

    let route = queries::create_raw(
        &mut tx,
        RouteId::new(),
        RouteCreatePayload {
            source_id: source.id,
            destination_id: destination.id,
            distance: 500 + i as i32,
        },
    )
    .await
    .expect("Creating test route failed");

    tx.commit().await.unwrap();

    (source, destination, route)
}
