use std::str::FromStr;

use error_stack::{Report, ResultExt};
use serde::Deserialize;
use sqlx::{PgConnection, PgExecutor};
use tracing::{event, instrument, Level};

use super::{types::*, FlightId};
use crate::{
    error::violated_constraint,
    models::{
        airplane::{AirplaneId, AirplaneListResult},
        crew::{Crew, CrewId},
        route::{RouteId, RouteListResult},
    },
    sql::{self, BindingOperator, FilterBuilder, OrderByError, QueryAs},
    Error,
};

const SELECT_FIELDS: &str =
    "id, route_id, airplane_id, departure_time, arrival_time, created_at, updated_at";

fn reference_error(e: sqlx::Error) -> Report<Error> {
    match violated_constraint(&e) {
        Some("flights_route_id_fkey") => {
            Report::new(e).change_context(Error::InvalidReference("route"))
        }
        Some("flights_airplane_id_fkey") => {
            Report::new(e).change_context(Error::InvalidReference("airplane"))
        }
        Some("flight_crews_crew_id_fkey") => {
            Report::new(e).change_context(Error::InvalidReference("crew"))
        }
        _ => Report::new(e).change_context(Error::Db),
    }
}

#[instrument(skip(db))]
pub async fn get(db: impl PgExecutor<'_>, id: FlightId) -> Result<Flight, Report<Error>> {
    let object = sqlx::query_as::<_, Flight>(&format!(
        "SELECT {SELECT_FIELDS} FROM flights WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(db)
    .await
    .change_context(Error::Db)?
    .ok_or(Error::NotFound("Flight"))?;

    Ok(object)
}

/// The single-row half of the populated get: the flight with its route, both airports,
/// the airplane, and its type joined in.
#[derive(sqlx::FromRow)]
struct FlightDetailRow {
    id: FlightId,
    route_id: RouteId,
    airplane_id: AirplaneId,
    departure_time: chrono::DateTime<chrono::Utc>,
    arrival_time: chrono::DateTime<chrono::Utc>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    route_source: String,
    route_destination: String,
    route_distance: i32,
    route_created_at: chrono::DateTime<chrono::Utc>,
    route_updated_at: chrono::DateTime<chrono::Utc>,
    airplane_name: String,
    airplane_rows: i32,
    airplane_seats_in_row: i32,
    airplane_type: String,
    airplane_created_at: chrono::DateTime<chrono::Utc>,
    airplane_updated_at: chrono::DateTime<chrono::Utc>,
}

/// Get a flight with its route, airplane, crew, and taken seats. The relations load as
/// one joined query plus one batched query each for the crew and ticket collections.
#[instrument(skip(db))]
pub async fn get_populated(
    db: impl PgExecutor<'_> + Copy,
    id: FlightId,
) -> Result<FlightPopulatedGetResult, Report<Error>> {
    let row = sqlx::query_as::<_, FlightDetailRow>(
        r#"SELECT f.id, f.route_id, f.airplane_id,
            f.departure_time, f.arrival_time, f.created_at, f.updated_at,
            src.name AS route_source,
            dst.name AS route_destination,
            r.distance AS route_distance,
            r.created_at AS route_created_at,
            r.updated_at AS route_updated_at,
            a.name AS airplane_name,
            a."rows" AS airplane_rows,
            a.seats_in_row AS airplane_seats_in_row,
            t.name AS airplane_type,
            a.created_at AS airplane_created_at,
            a.updated_at AS airplane_updated_at
        FROM flights f
        JOIN routes r ON r.id = f.route_id
        JOIN airports src ON src.id = r.source_id
        JOIN airports dst ON dst.id = r.destination_id
        JOIN airplanes a ON a.id = f.airplane_id
        JOIN airplane_types t ON t.id = a.airplane_type_id
        WHERE f.id = $1"#,
    )
    .bind(id.as_uuid())
    .fetch_optional(db)
    .await
    .change_context(Error::Db)?
    .ok_or(Error::NotFound("Flight"))?;

    let crew = sqlx::query_as::<_, Crew>(
        "SELECT c.id, c.first_name, c.last_name, c.created_at, c.updated_at
        FROM crews c
        JOIN flight_crews fc ON fc.crew_id = c.id
        WHERE fc.flight_id = $1
        ORDER BY c.last_name, c.first_name",
    )
    .bind(id.as_uuid())
    .fetch_all(db)
    .await
    .change_context(Error::Db)?;

    let taken_seats = sqlx::query_as::<_, SeatRef>(
        r#"SELECT "row", seat FROM tickets WHERE flight_id = $1 ORDER BY "row", seat"#,
    )
    .bind(id.as_uuid())
    .fetch_all(db)
    .await
    .change_context(Error::Db)?;

    Ok(FlightPopulatedGetResult {
        id: row.id,
        route_id: row.route_id,
        airplane_id: row.airplane_id,
        departure_time: row.departure_time,
        arrival_time: row.arrival_time,
        route: RouteListResult {
            id: row.route_id,
            source: row.route_source,
            destination: row.route_destination,
            distance: row.route_distance,
            created_at: row.route_created_at,
            updated_at: row.route_updated_at,
        },
        airplane: AirplaneListResult {
            id: row.airplane_id,
            name: row.airplane_name,
            rows: row.airplane_rows,
            seats_in_row: row.airplane_seats_in_row,
            airplane_type: row.airplane_type,
            created_at: row.airplane_created_at,
            updated_at: row.airplane_updated_at,
        },
        crew,
        taken_seats,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[derive(Debug, Default)]
enum OrderByField {
    #[default]
    DepartureTime,
    ArrivalTime,
    UpdatedAt,
    CreatedAt,
}

impl OrderByField {
    fn as_str(&self) -> &str {
        match self {
            Self::DepartureTime => "f.departure_time",
            Self::ArrivalTime => "f.arrival_time",
            Self::UpdatedAt => "f.updated_at",
            Self::CreatedAt => "f.created_at",
        }
    }
}

impl FromStr for OrderByField {
    type Err = OrderByError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s {
            "departure_time" => OrderByField::DepartureTime,
            "arrival_time" => OrderByField::ArrivalTime,
            "updated_at" => OrderByField::UpdatedAt,
            "created_at" => OrderByField::CreatedAt,
            _ => return Err(OrderByError::InvalidField),
        };

        Ok(value)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ListQueryFilters {
    pub page: Option<u32>,
    pub per_page: Option<u32>,

    pub order_by: Option<String>,
    #[serde(default)]
    pub id: Vec<FlightId>,
    #[serde(default)]
    pub route_id: Vec<RouteId>,
    #[serde(default)]
    pub airplane_id: Vec<AirplaneId>,
    pub departure_time_lte: Option<chrono::DateTime<chrono::Utc>>,
    pub departure_time_gte: Option<chrono::DateTime<chrono::Utc>>,
}

impl ListQueryFilters {
    fn build_where_clause(&self) -> String {
        let mut bindings = FilterBuilder::new(3);

        bindings.add_vec("f.id", &self.id);
        bindings.add_vec("f.route_id", &self.route_id);
        bindings.add_vec("f.airplane_id", &self.airplane_id);
        bindings.add_option(
            "f.departure_time",
            &self.departure_time_lte,
            BindingOperator::Lte,
        );
        bindings.add_option(
            "f.departure_time",
            &self.departure_time_gte,
            BindingOperator::Gte,
        );

        let query = bindings.to_string();
        event!(Level::DEBUG, %query);
        query
    }

    fn bind_to_query<'a, T>(&'a self, mut query: QueryAs<'a, T>) -> QueryAs<'a, T> {
        const MAX_PER_PAGE: u32 = 200;
        const DEFAULT_PER_PAGE: u32 = 50;
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE)
            .max(1);
        let offset = self.page.unwrap_or(0) * per_page;
        query = query.bind(per_page as i32).bind(offset as i32);

        if !self.id.is_empty() {
            query = query.bind(self.id.iter().map(|id| id.0).collect::<Vec<_>>());
        }

        if !self.route_id.is_empty() {
            query = query.bind(self.route_id.iter().map(|id| id.0).collect::<Vec<_>>());
        }

        if !self.airplane_id.is_empty() {
            query = query.bind(self.airplane_id.iter().map(|id| id.0).collect::<Vec<_>>());
        }

        if self.departure_time_lte.is_some() {
            query = query.bind(self.departure_time_lte);
        }

        if self.departure_time_gte.is_some() {
            query = query.bind(self.departure_time_gte);
        }

        query
    }
}

/// List flights. The route, airports, and airplane load in the same query, and the sold
/// ticket count turns into `tickets_available`.
#[instrument(skip(db))]
pub async fn list(
    db: impl PgExecutor<'_>,
    filters: &ListQueryFilters,
) -> Result<Vec<FlightListResult>, Report<Error>> {
    let (descending, order_by_field) = sql::parse_order_by::<OrderByField>(
        filters.order_by.as_deref().unwrap_or("departure_time"),
    )
    .change_context(Error::Filter)?;
    let order_direction = if descending { "DESC" } else { "ASC" };

    let q = format!(
        r#"SELECT f.id,
            src.name || ' - ' || dst.name AS route,
            a.name AS airplane_name,
            (a."rows" * a.seats_in_row) AS airplane_capacity,
            f.departure_time, f.arrival_time,
            (a."rows" * a.seats_in_row
                - (SELECT count(*) FROM tickets t WHERE t.flight_id = f.id))::int
                AS tickets_available
        FROM flights f
        JOIN routes r ON r.id = f.route_id
        JOIN airports src ON src.id = r.source_id
        JOIN airports dst ON dst.id = r.destination_id
        JOIN airplanes a ON a.id = f.airplane_id
        WHERE true{filters}
        ORDER BY {order_by} {order_direction}
        LIMIT $1 OFFSET $2"#,
        filters = filters.build_where_clause(),
        order_by = order_by_field.as_str(),
    );

    let mut query = sqlx::query_as::<_, FlightListResult>(&q);
    query = filters.bind_to_query(query);

    let results = query.fetch_all(db).await.change_context(Error::Db)?;

    Ok(results)
}

pub async fn create(
    db: &mut PgConnection,
    payload: FlightCreatePayload,
) -> Result<FlightCreateResult, Report<Error>> {
    let id = FlightId::new();

    create_raw(&mut *db, id, payload).await
}

#[instrument(skip(db))]
pub async fn create_raw(
    db: &mut PgConnection,
    id: FlightId,
    payload: FlightCreatePayload,
) -> Result<FlightCreateResult, Report<Error>> {
    validate(&payload)?;

    let flight = sqlx::query_as::<_, Flight>(&format!(
        "INSERT INTO flights (id, route_id, airplane_id, departure_time, arrival_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {SELECT_FIELDS}"
    ))
    .bind(id.as_uuid())
    .bind(payload.route_id.as_uuid())
    .bind(payload.airplane_id.as_uuid())
    .bind(payload.departure_time)
    .bind(payload.arrival_time)
    .fetch_one(&mut *db)
    .await
    .map_err(reference_error)?;

    let crew_ids = replace_crew(&mut *db, id, &payload.crew_ids).await?;

    Ok(FlightCreateResult { flight, crew_ids })
}

#[instrument(skip(db))]
pub async fn update(
    db: &mut PgConnection,
    id: FlightId,
    payload: FlightUpdatePayload,
) -> Result<bool, Report<Error>> {
    validate(&payload)?;

    let result = sqlx::query(
        "UPDATE flights
        SET route_id = $2, airplane_id = $3, departure_time = $4, arrival_time = $5,
            updated_at = now()
        WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(payload.route_id.as_uuid())
    .bind(payload.airplane_id.as_uuid())
    .bind(payload.departure_time)
    .bind(payload.arrival_time)
    .execute(&mut *db)
    .await
    .map_err(reference_error)?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM flight_crews WHERE flight_id = $1")
        .bind(id.as_uuid())
        .execute(&mut *db)
        .await
        .change_context(Error::Db)?;

    replace_crew(&mut *db, id, &payload.crew_ids).await?;

    Ok(true)
}

/// Insert the crew assignment rows and read back the stored set.
async fn replace_crew(
    db: &mut PgConnection,
    id: FlightId,
    crew_ids: &[CrewId],
) -> Result<Vec<CrewId>, Report<Error>> {
    if !crew_ids.is_empty() {
        sqlx::query(
            "INSERT INTO flight_crews (flight_id, crew_id)
            SELECT $1::uuid, unnest($2::uuid[])
            ON CONFLICT DO NOTHING",
        )
        .bind(id.as_uuid())
        .bind(crew_ids.iter().map(|id| id.0).collect::<Vec<_>>())
        .execute(&mut *db)
        .await
        .map_err(reference_error)?;
    }

    let stored = sqlx::query_scalar::<_, uuid::Uuid>(
        "SELECT crew_id FROM flight_crews WHERE flight_id = $1 ORDER BY crew_id",
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *db)
    .await
    .change_context(Error::Db)?;

    Ok(stored.into_iter().map(CrewId::from_uuid).collect())
}

#[instrument(skip(db))]
pub async fn delete(db: impl PgExecutor<'_>, id: FlightId) -> Result<bool, Report<Error>> {
    let result = sqlx::query("DELETE FROM flights WHERE id = $1")
        .bind(id.as_uuid())
        .execute(db)
        .await
        .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}

fn validate(payload: &FlightCreatePayload) -> Result<(), Error> {
    if payload.arrival_time <= payload.departure_time {
        return Err(Error::Validation(
            "arrival_time must be after departure_time".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_backwards_times() {
        let departure = chrono::Utc::now();
        let payload = FlightCreatePayload {
            route_id: RouteId::new(),
            airplane_id: AirplaneId::new(),
            departure_time: departure,
            arrival_time: departure - chrono::Duration::hours(1),
            crew_ids: vec![],
        };
        assert!(validate(&payload).is_err());

        let payload = FlightCreatePayload {
            arrival_time: departure,
            departure_time: departure,
            ..payload
        };
        assert!(validate(&payload).is_err());
    }

    #[test]
    fn accepts_forward_times() {
        let departure = chrono::Utc::now();
        let payload = FlightCreatePayload {
            route_id: RouteId::new(),
            airplane_id: AirplaneId::new(),
            departure_time: departure,
            arrival_time: departure + chrono::Duration::hours(2),
            crew_ids: vec![],
        };
        assert!(validate(&payload).is_ok());
    }
}
