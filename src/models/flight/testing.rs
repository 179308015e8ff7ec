use super::{queries, FlightCreatePayload, FlightCreateResult, FlightId};
use crate::models::{
    airplane::{self, Airplane, AirplaneId},
    airplane_type::{self, testing::make_create_payload as make_type_payload, AirplaneTypeId},
    airport::{self, testing::make_create_payload as make_airport_payload, Airport, AirportId},
    crew::{self, testing::make_create_payload as make_crew_payload, Crew, CrewId},
    route::{self, Route, RouteId},
};

pub fn make_create_payload(
    i: usize,
    route_id: RouteId,
    airplane_id: AirplaneId,
    crew_ids: Vec<CrewId>,
) -> FlightCreatePayload {
    let departure_time = chrono::Utc::now() + chrono::Duration::days(i as i64 + 1);
    FlightCreatePayload {
        route_id,
        airplane_id,
        departure_time,
        arrival_time: departure_time + chrono::Duration::hours(3),
        crew_ids,
    }
}

pub struct FlightFixture {
    pub source: Airport,
    pub destination: Airport,
    pub route: Route,
    pub airplane: Airplane,
    pub crew: Vec<Crew>,
    pub flight: FlightCreateResult,
}

/// Insert the whole reference chain a flight needs, then the flight itself with two crew
/// members assigned.
pub async fn setup_flight(db: &sqlx::PgPool, i: usize) -> FlightFixture {
    let mut tx = db.begin().await.unwrap();

    let source = airport::queries::create_raw(&mut tx, AirportId::new(), make_airport_payload(i))
        .await
        .expect("Creating test source airport failed");
    let destination =
        airport::queries::create_raw(&mut tx, AirportId::new(), make_airport_payload(i + 100))
            .await
            .expect("Creating test destination airport failed");

    let route = route::queries::create_raw(
        &mut tx,
        RouteId::new(),
        route::RouteCreatePayload {
            source_id: source.id,
            destination_id: destination.id,
            distance: 1000,
        },
    )
    .await
    .expect("Creating test route failed");

    let airplane_type =
        airplane_type::queries::create_raw(&mut tx, AirplaneTypeId::new(), make_type_payload(i))
            .await
            .expect("Creating test airplane type failed");
    let airplane = airplane::queries::create_raw(
        &mut tx,
        AirplaneId::new(),
        airplane::testing::make_create_payload(i, airplane_type.id),
    )
    .await
    .expect("Creating test airplane failed");

    let mut crew = Vec::new();
    for j in 0..2 {
        let member =
            crew::queries::create_raw(&mut tx, CrewId::new(), make_crew_payload(i * 10 + j))
                .await
                .expect("Creating test crew failed");
        crew.push(member);
    }

    let flight = queries::create_raw(
        &mut tx,
        FlightId::new(),
        make_create_payload(i, route.id, airplane.id, crew.iter().map(|c| c.id).collect()),
    )
    .await
    .expect("Creating test flight failed");

    tx.commit().await.unwrap();

    FlightFixture {
        source,
        destination,
        route,
        airplane,
        crew,
        flight,
    }
}
