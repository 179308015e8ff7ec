use std::collections::HashMap;
use std::str::FromStr;

use error_stack::{Report, ResultExt};
use serde::Deserialize;
use sqlx::{PgConnection, PgExecutor};
use tracing::{event, instrument, Level};

use super::{types::*, OrderId};
use crate::{
    auth::AuthInfo,
    error::violated_constraint,
    models::{
        flight::FlightId,
        ticket::{self, TicketCreatePayload, TicketFlightSummary, TicketId, TicketWithFlight},
    },
    sql::{self, BindingOperator, FilterBuilder, OrderByError, QueryAs},
    Error,
};

/// One row of the batched ticket load: the ticket plus its flight summary.
#[derive(sqlx::FromRow)]
struct TicketRow {
    id: TicketId,
    order_id: OrderId,
    seat: i32,
    flight_id: FlightId,
    flight_route: String,
    departure_time: chrono::DateTime<chrono::Utc>,
    arrival_time: chrono::DateTime<chrono::Utc>,
    row: i32,
}

impl TicketRow {
    fn into_ticket(self) -> TicketWithFlight {
        TicketWithFlight {
            id: self.id,
            row: self.row,
            seat: self.seat,
            flight: TicketFlightSummary {
                id: self.flight_id,
                route: self.flight_route,
                departure_time: self.departure_time,
                arrival_time: self.arrival_time,
            },
        }
    }
}

/// Fetch the tickets for a batch of orders in one query, flights joined in, grouped by
/// order.
async fn load_tickets(
    db: impl PgExecutor<'_>,
    order_ids: &[OrderId],
) -> Result<HashMap<OrderId, Vec<TicketWithFlight>>, Report<Error>> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, TicketRow>(
        r#"SELECT t.id, t.order_id, t."row", t.seat,
            f.id AS flight_id,
            src.name || ' - ' || dst.name AS flight_route,
            f.departure_time, f.arrival_time
        FROM tickets t
        JOIN flights f ON f.id = t.flight_id
        JOIN routes r ON r.id = f.route_id
        JOIN airports src ON src.id = r.source_id
        JOIN airports dst ON dst.id = r.destination_id
        WHERE t.order_id = ANY($1)
        ORDER BY t.order_id, t."row", t.seat"#,
    )
    .bind(order_ids.iter().map(|id| id.0).collect::<Vec<_>>())
    .fetch_all(db)
    .await
    .change_context(Error::Db)?;

    let mut tickets: HashMap<OrderId, Vec<TicketWithFlight>> = HashMap::new();
    for row in rows {
        tickets
            .entry(row.order_id)
            .or_default()
            .push(row.into_ticket());
    }

    Ok(tickets)
}

/// Get one of the calling user's orders, with its tickets.
#[instrument(skip(db))]
pub async fn get(
    db: impl PgExecutor<'_> + Copy,
    auth: &AuthInfo,
    id: OrderId,
) -> Result<OrderWithTickets, Report<Error>> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT id, user_id, created_at FROM orders WHERE id = $1 AND user_id = $2",
    )
    .bind(id.as_uuid())
    .bind(auth.user_id.as_uuid())
    .fetch_optional(db)
    .await
    .change_context(Error::Db)?
    .ok_or(Error::NotFound("Order"))?;

    let mut tickets = load_tickets(db, &[order.id]).await?;

    Ok(OrderWithTickets {
        id: order.id,
        created_at: order.created_at,
        tickets: tickets.remove(&order.id).unwrap_or_default(),
    })
}

#[derive(Debug, Default)]
enum OrderByField {
    #[default]
    CreatedAt,
}

impl OrderByField {
    fn as_str(&self) -> &str {
        match self {
            Self::CreatedAt => "created_at",
        }
    }
}

impl FromStr for OrderByField {
    type Err = OrderByError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(OrderByField::CreatedAt),
            _ => Err(OrderByError::InvalidField),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ListQueryFilters {
    pub page: Option<u32>,
    pub per_page: Option<u32>,

    pub order_by: Option<String>,
    pub created_at_lte: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at_gte: Option<chrono::DateTime<chrono::Utc>>,
}

impl ListQueryFilters {
    fn build_where_clause(&self) -> String {
        // $1 and $2 are the page bounds, $3 is the calling user.
        let mut bindings = FilterBuilder::new(4);

        bindings.add_option("created_at", &self.created_at_lte, BindingOperator::Lte);
        bindings.add_option("created_at", &self.created_at_gte, BindingOperator::Gte);

        let query = bindings.to_string();
        event!(Level::DEBUG, %query);
        query
    }

    fn bind_to_query<'a, T>(&'a self, mut query: QueryAs<'a, T>, user_id: uuid::Uuid) -> QueryAs<'a, T> {
        const MAX_PER_PAGE: u32 = 200;
        const DEFAULT_PER_PAGE: u32 = 50;
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE)
            .max(1);
        let offset = self.page.unwrap_or(0) * per_page;
        query = query.bind(per_page as i32).bind(offset as i32).bind(user_id);

        if self.created_at_lte.is_some() {
            query = query.bind(self.created_at_lte);
        }

        if self.created_at_gte.is_some() {
            query = query.bind(self.created_at_gte);
        }

        query
    }
}

/// List the calling user's orders, tickets attached via one batched query.
#[instrument(skip(db))]
pub async fn list(
    db: impl PgExecutor<'_> + Copy,
    auth: &AuthInfo,
    filters: &ListQueryFilters,
) -> Result<Vec<OrderWithTickets>, Report<Error>> {
    let (descending, order_by_field) =
        sql::parse_order_by::<OrderByField>(filters.order_by.as_deref().unwrap_or("-created_at"))
            .change_context(Error::Filter)?;
    let order_direction = if descending { "DESC" } else { "ASC" };

    let q = format!(
        "SELECT id, user_id, created_at
        FROM orders
        WHERE user_id = $3{filters}
        ORDER BY {order_by} {order_direction}
        LIMIT $1 OFFSET $2",
        filters = filters.build_where_clause(),
        order_by = order_by_field.as_str(),
    );

    let mut query = sqlx::query_as::<_, Order>(&q);
    query = filters.bind_to_query(query, auth.user_id.0);

    let orders = query.fetch_all(db).await.change_context(Error::Db)?;

    let order_ids = orders.iter().map(|o| o.id).collect::<Vec<_>>();
    let mut tickets = load_tickets(db, &order_ids).await?;

    let results = orders
        .into_iter()
        .map(|order| OrderWithTickets {
            id: order.id,
            created_at: order.created_at,
            tickets: tickets.remove(&order.id).unwrap_or_default(),
        })
        .collect();

    Ok(results)
}

/// Create an order with its tickets for the calling user, all in one transaction. Every
/// ticket is validated against the flight's airplane dimensions and the already-sold
/// seats; any failure rolls the whole order back.
#[instrument(skip(db))]
pub async fn create(
    db: &mut PgConnection,
    auth: &AuthInfo,
    payload: OrderCreatePayload,
) -> Result<OrderWithTickets, Report<Error>> {
    if payload.tickets.is_empty() {
        return Err(Error::Validation("an order must contain at least one ticket".into()).into());
    }

    let id = OrderId::new();

    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, user_id) VALUES ($1, $2)
        RETURNING id, user_id, created_at",
    )
    .bind(id.as_uuid())
    .bind(auth.user_id.as_uuid())
    .fetch_one(&mut *db)
    .await
    .change_context(Error::Db)?;

    // Airplane dimensions per flight, fetched once per distinct flight in the order.
    let mut dimensions: HashMap<FlightId, (i32, i32)> = HashMap::new();

    for ticket in &payload.tickets {
        let (rows, seats_in_row) = match dimensions.get(&ticket.flight_id) {
            Some(dims) => *dims,
            None => {
                let dims = sqlx::query_as::<_, (i32, i32)>(
                    r#"SELECT a."rows", a.seats_in_row
                    FROM flights f
                    JOIN airplanes a ON a.id = f.airplane_id
                    WHERE f.id = $1"#,
                )
                .bind(ticket.flight_id.as_uuid())
                .fetch_optional(&mut *db)
                .await
                .change_context(Error::Db)?
                .ok_or(Error::InvalidReference("flight"))?;

                dimensions.insert(ticket.flight_id, dims);
                dims
            }
        };

        ticket::validate_seat(ticket.row, ticket.seat, rows, seats_in_row)?;

        insert_ticket(&mut *db, order.id, ticket).await?;
    }

    let mut tickets = load_tickets(&mut *db, &[order.id]).await?;

    Ok(OrderWithTickets {
        id: order.id,
        created_at: order.created_at,
        tickets: tickets.remove(&order.id).unwrap_or_default(),
    })
}

async fn insert_ticket(
    db: &mut PgConnection,
    order_id: OrderId,
    ticket: &TicketCreatePayload,
) -> Result<(), Report<Error>> {
    sqlx::query(
        r#"INSERT INTO tickets (id, order_id, flight_id, "row", seat)
        VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(TicketId::new().0)
    .bind(order_id.as_uuid())
    .bind(ticket.flight_id.as_uuid())
    .bind(ticket.row)
    .bind(ticket.seat)
    .execute(db)
    .await
    .map_err(|e| match violated_constraint(&e) {
        Some("tickets_flight_seat_key") => Report::new(e).change_context(Error::Validation(
            format!(
                "seat {} in row {} is already taken on this flight",
                ticket.seat, ticket.row
            )
            .into(),
        )),
        Some("tickets_flight_id_fkey") => {
            Report::new(e).change_context(Error::InvalidReference("flight"))
        }
        _ => Report::new(e).change_context(Error::Db),
    })?;

    Ok(())
}

/// Delete one of the calling user's orders. Tickets cascade.
#[instrument(skip(db))]
pub async fn delete(
    db: impl PgExecutor<'_>,
    auth: &AuthInfo,
    id: OrderId,
) -> Result<bool, Report<Error>> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND user_id = $2")
        .bind(id.as_uuid())
        .bind(auth.user_id.as_uuid())
        .execute(db)
        .await
        .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}
