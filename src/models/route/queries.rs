use std::str::FromStr;

use error_stack::{Report, ResultExt};
use serde::Deserialize;
use sqlx::{PgConnection, PgExecutor};
use tracing::{event, instrument, Level};

use super::{types::*, RouteId};
use crate::{
    error::violated_constraint,
    models::airport::AirportId,
    sql::{self, BindingOperator, FilterBuilder, OrderByError, QueryAs},
    Error,
};

const SELECT_FIELDS: &str = "id, source_id, destination_id, distance, created_at, updated_at";

fn reference_error(e: sqlx::Error) -> Report<Error> {
    match violated_constraint(&e) {
        Some("routes_source_id_fkey") => {
            Report::new(e).change_context(Error::InvalidReference("source airport"))
        }
        Some("routes_destination_id_fkey") => {
            Report::new(e).change_context(Error::InvalidReference("destination airport"))
        }
        _ => Report::new(e).change_context(Error::Db),
    }
}

#[instrument(skip(db))]
pub async fn get(db: impl PgExecutor<'_>, id: RouteId) -> Result<Route, Report<Error>> {
    let object = sqlx::query_as::<_, Route>(&format!(
        "SELECT {SELECT_FIELDS} FROM routes WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(db)
    .await
    .change_context(Error::Db)?
    .ok_or(Error::NotFound("Route"))?;

    Ok(object)
}

#[derive(Debug, Default)]
enum OrderByField {
    Distance,
    #[default]
    UpdatedAt,
    CreatedAt,
}

impl OrderByField {
    fn as_str(&self) -> &str {
        match self {
            Self::Distance => "r.distance",
            Self::UpdatedAt => "r.updated_at",
            Self::CreatedAt => "r.created_at",
        }
    }
}

impl FromStr for OrderByField {
    type Err = OrderByError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s {
            "distance" => OrderByField::Distance,
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
    pub id: Vec<RouteId>,
    #[serde(default)]
    pub source_id: Vec<AirportId>,
    #[serde(default)]
    pub destination_id: Vec<AirportId>,
    pub updated_at_lte: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at_gte: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at_lte: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at_gte: Option<chrono::DateTime<chrono::Utc>>,
}

impl ListQueryFilters {
    fn build_where_clause(&self) -> String {
        let mut bindings = FilterBuilder::new(3);

        bindings.add_vec("r.id", &self.id);
        bindings.add_vec("r.source_id", &self.source_id);
        bindings.add_vec("r.destination_id", &self.destination_id);
        bindings.add_option("r.updated_at", &self.updated_at_lte, BindingOperator::Lte);
        bindings.add_option("r.updated_at", &self.updated_at_gte, BindingOperator::Gte);
        bindings.add_option("r.created_at", &self.created_at_lte, BindingOperator::Lte);
        bindings.add_option("r.created_at", &self.created_at_gte, BindingOperator::Gte);

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

        if !self.source_id.is_empty() {
            query = query.bind(self.source_id.iter().map(|id| id.0).collect::<Vec<_>>());
        }

        if !self.destination_id.is_empty() {
            query = query.bind(
                self.destination_id
                    .iter()
                    .map(|id| id.0)
                    .collect::<Vec<_>>(),
            );
        }

        if self.updated_at_lte.is_some() {
            query = query.bind(self.updated_at_lte);
        }

        if self.updated_at_gte.is_some() {
            query = query.bind(self.updated_at_gte);
        }

        if self.created_at_lte.is_some() {
            query = query.bind(self.created_at_lte);
        }

        if self.created_at_gte.is_some() {
            query = query.bind(self.created_at_gte);
        }

        query
    }
}

/// List routes with both airports joined in, so each row carries the airport names.
#[instrument(skip(db))]
pub async fn list(
    db: impl PgExecutor<'_>,
    filters: &ListQueryFilters,
) -> Result<Vec<RouteListResult>, Report<Error>> {
    let (descending, order_by_field) =
        sql::parse_order_by::<OrderByField>(filters.order_by.as_deref().unwrap_or("-updated_at"))
            .change_context(Error::Filter)?;
    let order_direction = if descending { "DESC" } else { "ASC" };

    let q = format!(
        "SELECT r.id,
            src.name AS source,
            dst.name AS destination,
            r.distance, r.created_at, r.updated_at
        FROM routes r
        JOIN airports src ON src.id = r.source_id
        JOIN airports dst ON dst.id = r.destination_id
        WHERE true{filters}
        ORDER BY {order_by} {order_direction}
        LIMIT $1 OFFSET $2",
        filters = filters.build_where_clause(),
        order_by = order_by_field.as_str(),
    );

    let mut query = sqlx::query_as::<_, RouteListResult>(&q);
    query = filters.bind_to_query(query);

    let results = query.fetch_all(db).await.change_context(Error::Db)?;

    Ok(results)
}

pub async fn create(
    db: &mut PgConnection,
    payload: RouteCreatePayload,
) -> Result<RouteCreateResult, Report<Error>> {
    let id = RouteId::new();

    create_raw(&mut *db, id, payload).await
}

#[instrument(skip(db))]
pub async fn create_raw(
    db: &mut PgConnection,
    id: RouteId,
    payload: RouteCreatePayload,
) -> Result<RouteCreateResult, Report<Error>> {
    validate(&payload)?;

    let result = sqlx::query_as::<_, Route>(&format!(
        "INSERT INTO routes (id, source_id, destination_id, distance)
        VALUES ($1, $2, $3, $4)
        RETURNING {SELECT_FIELDS}"
    ))
    .bind(id.as_uuid())
    .bind(payload.source_id.as_uuid())
    .bind(payload.destination_id.as_uuid())
    .bind(payload.distance)
    .fetch_one(&mut *db)
    .await
    .map_err(reference_error)?;

    Ok(result)
}

#[instrument(skip(db))]
pub async fn update(
    db: impl PgExecutor<'_>,
    id: RouteId,
    payload: RouteUpdatePayload,
) -> Result<bool, Report<Error>> {
    validate(&payload)?;

    let result = sqlx::query(
        "UPDATE routes
        SET source_id = $2, destination_id = $3, distance = $4, updated_at = now()
        WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(payload.source_id.as_uuid())
    .bind(payload.destination_id.as_uuid())
    .bind(payload.distance)
    .execute(db)
    .await
    .map_err(reference_error)?;

    Ok(result.rows_affected() > 0)
}

#[instrument(skip(db))]
pub async fn delete(db: impl PgExecutor<'_>, id: RouteId) -> Result<bool, Report<Error>> {
    let result = sqlx::query("DELETE FROM routes WHERE id = $1")
        .bind(id.as_uuid())
        .execute(db)
        .await
        .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}

fn validate(payload: &RouteCreatePayload) -> Result<(), Error> {
    if payload.source_id == payload.destination_id {
        return Err(Error::Validation(
            "source and destination must be different airports".into(),
        ));
    }
    if payload.distance < 1 {
        return Err(Error::Validation("distance must be at least 1".into()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_self_route() {
        let airport = AirportId::new();
        let payload = RouteCreatePayload {
            source_id: airport,
            destination_id: airport,
            distance: 100,
        };
        assert!(validate(&payload).is_err());
    }

    #[test]
    fn rejects_nonpositive_distance() {
        let payload = RouteCreatePayload {
            source_id: AirportId::new(),
            destination_id: AirportId::new(),
            distance: 0,
        };
        assert!(validate(&payload).is_err());
    }
}
