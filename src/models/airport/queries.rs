use std::str::FromStr;

use error_stack::{Report, ResultExt};
use serde::Deserialize;
use sqlx::{PgConnection, PgExecutor};
use tracing::{event, instrument, Level};

use super::{types::*, AirportId};
use crate::{
    sql::{self, BindingOperator, FilterBuilder, OrderByError, QueryAs},
    Error,
};

const SELECT_FIELDS: &str = "id, name, closest_big_city, created_at, updated_at";

/// Get an Airport from the database
#[instrument(skip(db))]
pub async fn get(db: impl PgExecutor<'_>, id: AirportId) -> Result<Airport, Report<Error>> {
    let object = sqlx::query_as::<_, Airport>(&format!(
        "SELECT {SELECT_FIELDS} FROM airports WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(db)
    .await
    .change_context(Error::Db)?
    .ok_or(Error::NotFound("Airport"))?;

    Ok(object)
}

#[derive(Debug, Default)]
enum OrderByField {
    Name,
    #[default]
    UpdatedAt,
    CreatedAt,
}

impl OrderByField {
    fn as_str(&self) -> &str {
        match self {
            Self::Name => "name",
            Self::UpdatedAt => "updated_at",
            Self::CreatedAt => "created_at",
        }
    }
}

impl FromStr for OrderByField {
    type Err = OrderByError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s {
            "name" => OrderByField::Name,
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
    pub id: Vec<AirportId>,
    pub updated_at_lte: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at_gte: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at_lte: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at_gte: Option<chrono::DateTime<chrono::Utc>>,
}

impl ListQueryFilters {
    fn build_where_clause(&self) -> String {
        let mut bindings = FilterBuilder::new(3);

        bindings.add_vec("id", &self.id);
        bindings.add_option("updated_at", &self.updated_at_lte, BindingOperator::Lte);
        bindings.add_option("updated_at", &self.updated_at_gte, BindingOperator::Gte);
        bindings.add_option("created_at", &self.created_at_lte, BindingOperator::Lte);
        bindings.add_option("created_at", &self.created_at_gte, BindingOperator::Gte);

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

#[instrument(skip(db))]
pub async fn list(
    db: impl PgExecutor<'_>,
    filters: &ListQueryFilters,
) -> Result<Vec<AirportListResult>, Report<Error>> {
    let (descending, order_by_field) =
        sql::parse_order_by::<OrderByField>(filters.order_by.as_deref().unwrap_or("-updated_at"))
            .change_context(Error::Filter)?;
    let order_direction = if descending { "DESC" } else { "ASC" };

    let q = format!(
        "SELECT {SELECT_FIELDS}
        FROM airports
        WHERE true{filters}
        ORDER BY {order_by} {order_direction}
        LIMIT $1 OFFSET $2",
        filters = filters.build_where_clause(),
        order_by = order_by_field.as_str(),
    );

    let mut query = sqlx::query_as::<_, AirportListResult>(&q);
    query = filters.bind_to_query(query);

    let results = query.fetch_all(db).await.change_context(Error::Db)?;

    Ok(results)
}

/// Create a new Airport in the database.
pub async fn create(
    db: &mut PgConnection,
    payload: AirportCreatePayload,
) -> Result<AirportCreateResult, Report<Error>> {
    let id = AirportId::new();

    create_raw(&mut *db, id, payload).await
}

/// Create a new Airport in the database, with the ID explicitly specified.
#[instrument(skip(db))]
pub async fn create_raw(
    db: &mut PgConnection,
    id: AirportId,
    payload: AirportCreatePayload,
) -> Result<AirportCreateResult, Report<Error>> {
    let result = sqlx::query_as::<_, Airport>(&format!(
        "INSERT INTO airports (id, name, closest_big_city)
        VALUES ($1, $2, $3)
        RETURNING {SELECT_FIELDS}"
    ))
    .bind(id.as_uuid())
    .bind(&payload.name)
    .bind(&payload.closest_big_city)
    .fetch_one(&mut *db)
    .await
    .change_context(Error::Db)?;

    Ok(result)
}

#[instrument(skip(db))]
pub async fn update(
    db: impl PgExecutor<'_>,
    id: AirportId,
    payload: AirportUpdatePayload,
) -> Result<bool, Report<Error>> {
    let result = sqlx::query(
        "UPDATE airports
        SET name = $2, closest_big_city = $3, updated_at = now()
        WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(&payload.name)
    .bind(&payload.closest_big_city)
    .execute(db)
    .await
    .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}

#[instrument(skip(db))]
pub async fn delete(db: impl PgExecutor<'_>, id: AirportId) -> Result<bool, Report<Error>> {
    let result = sqlx::query("DELETE FROM airports WHERE id = $1")
        .bind(id.as_uuid())
        .execute(db)
        .await
        .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_by_fields() {
        assert!(sql::parse_order_by::<OrderByField>("name").is_ok());
        assert!(sql::parse_order_by::<OrderByField>("-created_at").is_ok());
        assert!(sql::parse_order_by::<OrderByField>("closest_big_city").is_err());
    }

    #[test]
    fn filters_number_bindings_after_pagination() {
        let filters = ListQueryFilters {
            id: vec![AirportId::new()],
            created_at_gte: Some(chrono::Utc::now()),
            ..Default::default()
        };

        assert_eq!(
            filters.build_where_clause(),
            " AND id = ANY($3) AND created_at >= $4"
        );
    }
}
