use std::str::FromStr;

use error_stack::{Report, ResultExt};
use serde::Deserialize;
use sqlx::{PgConnection, PgExecutor};
use tracing::{event, instrument, Level};

use super::{types::*, AirplaneId};
use crate::{
    error::violated_constraint,
    models::airplane_type::AirplaneTypeId,
    sql::{self, BindingOperator, FilterBuilder, OrderByError, QueryAs},
    Error,
};

const SELECT_FIELDS: &str =
    r#"id, name, "rows", seats_in_row, airplane_type_id, created_at, updated_at"#;

fn reference_error(e: sqlx::Error) -> Report<Error> {
    match violated_constraint(&e) {
        Some("airplanes_airplane_type_id_fkey") => {
            Report::new(e).change_context(Error::InvalidReference("airplane type"))
        }
        _ => Report::new(e).change_context(Error::Db),
    }
}

#[instrument(skip(db))]
pub async fn get(db: impl PgExecutor<'_>, id: AirplaneId) -> Result<Airplane, Report<Error>> {
    let object = sqlx::query_as::<_, Airplane>(&format!(
        "SELECT {SELECT_FIELDS} FROM airplanes WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(db)
    .await
    .change_context(Error::Db)?
    .ok_or(Error::NotFound("Airplane"))?;

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
            Self::Name => "a.name",
            Self::UpdatedAt => "a.updated_at",
            Self::CreatedAt => "a.created_at",
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
    pub id: Vec<AirplaneId>,
    #[serde(default)]
    pub airplane_type_id: Vec<AirplaneTypeId>,
    pub updated_at_lte: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at_gte: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at_lte: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at_gte: Option<chrono::DateTime<chrono::Utc>>,
}

impl ListQueryFilters {
    fn build_where_clause(&self) -> String {
        let mut bindings = FilterBuilder::new(3);

        bindings.add_vec("a.id", &self.id);
        bindings.add_vec("a.airplane_type_id", &self.airplane_type_id);
        bindings.add_option("a.updated_at", &self.updated_at_lte, BindingOperator::Lte);
        bindings.add_option("a.updated_at", &self.updated_at_gte, BindingOperator::Gte);
        bindings.add_option("a.created_at", &self.created_at_lte, BindingOperator::Lte);
        bindings.add_option("a.created_at", &self.created_at_gte, BindingOperator::Gte);

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

        if !self.airplane_type_id.is_empty() {
            query = query.bind(
                self.airplane_type_id
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

/// List airplanes, with the airplane type joined in so each row carries the type name.
#[instrument(skip(db))]
pub async fn list(
    db: impl PgExecutor<'_>,
    filters: &ListQueryFilters,
) -> Result<Vec<AirplaneListResult>, Report<Error>> {
    let (descending, order_by_field) =
        sql::parse_order_by::<OrderByField>(filters.order_by.as_deref().unwrap_or("-updated_at"))
            .change_context(Error::Filter)?;
    let order_direction = if descending { "DESC" } else { "ASC" };

    let q = format!(
        r#"SELECT a.id, a.name, a."rows", a.seats_in_row,
            t.name AS airplane_type,
            a.created_at, a.updated_at
        FROM airplanes a
        JOIN airplane_types t ON t.id = a.airplane_type_id
        WHERE true{filters}
        ORDER BY {order_by} {order_direction}
        LIMIT $1 OFFSET $2"#,
        filters = filters.build_where_clause(),
        order_by = order_by_field.as_str(),
    );

    let mut query = sqlx::query_as::<_, AirplaneListResult>(&q);
    query = filters.bind_to_query(query);

    let results = query.fetch_all(db).await.change_context(Error::Db)?;

    Ok(results)
}

pub async fn create(
    db: &mut PgConnection,
    payload: AirplaneCreatePayload,
) -> Result<AirplaneCreateResult, Report<Error>> {
    let id = AirplaneId::new();

    create_raw(&mut *db, id, payload).await
}

#[instrument(skip(db))]
pub async fn create_raw(
    db: &mut PgConnection,
    id: AirplaneId,
    payload: AirplaneCreatePayload,
) -> Result<AirplaneCreateResult, Report<Error>> {
    validate(&payload)?;

    let result = sqlx::query_as::<_, Airplane>(&format!(
        r#"INSERT INTO airplanes (id, name, "rows", seats_in_row, airplane_type_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {SELECT_FIELDS}"#
    ))
    .bind(id.as_uuid())
    .bind(&payload.name)
    .bind(payload.rows)
    .bind(payload.seats_in_row)
    .bind(payload.airplane_type_id.as_uuid())
    .fetch_one(&mut *db)
    .await
    .map_err(reference_error)?;

    Ok(result)
}

#[instrument(skip(db))]
pub async fn update(
    db: impl PgExecutor<'_>,
    id: AirplaneId,
    payload: AirplaneUpdatePayload,
) -> Result<bool, Report<Error>> {
    validate(&payload)?;

    let result = sqlx::query(
        r#"UPDATE airplanes
        SET name = $2, "rows" = $3, seats_in_row = $4, airplane_type_id = $5, updated_at = now()
        WHERE id = $1"#,
    )
    .bind(id.as_uuid())
    .bind(&payload.name)
    .bind(payload.rows)
    .bind(payload.seats_in_row)
    .bind(payload.airplane_type_id.as_uuid())
    .execute(db)
    .await
    .map_err(reference_error)?;

    Ok(result.rows_affected() > 0)
}

#[instrument(skip(db))]
pub async fn delete(db: impl PgExecutor<'_>, id: AirplaneId) -> Result<bool, Report<Error>> {
    let result = sqlx::query("DELETE FROM airplanes WHERE id = $1")
        .bind(id.as_uuid())
        .execute(db)
        .await
        .change_context(Error::Db)?;

    Ok(result.rows_affected() > 0)
}

fn validate(payload: &AirplaneCreatePayload) -> Result<(), Error> {
    if payload.rows < 1 {
        return Err(Error::Validation("rows must be at least 1".into()));
    }
    if payload.seats_in_row < 1 {
        return Err(Error::Validation("seats_in_row must be at least 1".into()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::airplane_type::AirplaneTypeId;

    #[test]
    fn rejects_nonpositive_dimensions() {
        let mut payload = AirplaneCreatePayload {
            name: "plane".into(),
            rows: 0,
            seats_in_row: 6,
            airplane_type_id: AirplaneTypeId::new(),
        };
        assert!(validate(&payload).is_err());

        payload.rows = 10;
        payload.seats_in_row = 0;
        assert!(validate(&payload).is_err());

        payload.seats_in_row = 4;
        assert!(validate(&payload).is_ok());
    }
}
