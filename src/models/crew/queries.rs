use std::str::FromStr;

use error_stack::{Report, ResultExt};
use serde::Deserialize;
use sqlx::{PgConnection, PgExecutor};
use tracing::{event, instrument, Level};

use super::{types::*, CrewId};
use crate::{
    sql::{self, BindingOperator, FilterBuilder, OrderByError, QueryAs},
    Error,
};

const SELECT_FIELDS: &str = "id, first_name, last_name, created_at, updated_at";

#[instrument(skip(db))]
pub async fn get(db: impl PgExecutor<'_>, id: CrewId) -> Result<Crew, Report<Error>> {
    let object =
        sqlx::query_as::<_, Crew>(&format!("SELECT {SELECT_FIELDS} FROM crews WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(db)
            .await
            .change_context(Error::Db)?
            .ok_or(Error::NotFound("Crew"))?;

    Ok(object)
}

#[derive(Debug, Default)]
enum OrderByField {
    LastName,
    #[default]
    UpdatedAt,
    CreatedAt,
}

impl OrderByField {
    fn as_str(&self) -> &str {
        match self {
            Self::LastName => "last_name",
            Self::UpdatedAt => "updated_at",
            Self::CreatedAt => "created_at",
        }
    }
}

impl FromStr for OrderByField {
    type Err = OrderByError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s {
            "last_name" => OrderByField::LastName,
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
    pub id: Vec<CrewId>,
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
) -> Result<Vec<CrewListResult>, Report<Error>> {
    let (descending, order_by_field) =
        sql::parse_order_by::<OrderByField>(filters.order_by.as_deref().unwrap_or("-updated_at"))
            .change_context(Error::Filter)?;
    let order_direction = if descending { "DESC" } else { "ASC" };

    let q = format!(
        "SELECT {SELECT_FIELDS}
        FROM crews
        WHERE true{filters}
        ORDER BY {order_by} {order_direction}
        LIMIT $1 OFFSET $2",
        filters = filters.build_where_clause(),
        order_by = order_by_field.as_str(),
    );

    let mut query = sqlx::query_as::<_, CrewListResult>(&q);
    query = filters.bind_to_query(query);

    let results = query.fetch_all(db).await.change_context(Error::Db)?;

    Ok(results)
}

pub async fn create(
    db: &mut PgConnection,
    payload: CrewCreatePayload,
) -> Result<CrewCreateResult, Report<Error>> {
    let id = CrewId::new();

    create_raw(&mut *db, id, payload).await
}

#[instrument(skip(db))]
pub async fn create_raw(
    db: &mut PgConnection,
    id: CrewId,
    payload: CrewCreatePayload,
) -> Result<CrewCreateResult, Report<Error>> {
    let result = sqlx::query_as::<_, Crew>(&format!(
        "INSERT INTO crews (id, first_name, last_name)
        VALUES ($1, $2, $3)
        RETURNING {SELECT_FIELDS}"
    ))
    .bind(id.as_uuid())
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .fetch_one(&mut *db)
    .await
    .change_context(Error::Db)?;

    Ok(result)
}

#[instrument(skip(db))]
pub async fn update(
    db: impl PgExecutor<'_>,
    id: CrewId,
    payload: CrewUpdatePayload,
) -> Result<bool, Report<Error>> {
    let result = sqlx::query(
        "UPDATE crews
        SET first_name = $2, last_name = $3, updated_at = now()
        WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .execute(db)
    .await
    .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}

#[instrument(skip(db))]
pub async fn delete(db: impl PgExecutor<'_>, id: CrewId) -> Result<bool, Report<Error>> {
    let result = sqlx::query("DELETE FROM crews WHERE id = $1")
        .bind(id.as_uuid())
        .execute(db)
        .await
        .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}
