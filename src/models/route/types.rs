use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::RouteId;
use crate::models::airport::AirportId;

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct Route {
    pub id: RouteId,
    pub source_id: AirportId,
    pub destination_id: AirportId,
    pub distance: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub type RouteCreateResult = Route;

/// The list view joins both airports and shows their names.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct RouteListResult {
    pub id: RouteId,
    pub source: String,
    pub destination: String,
    pub distance: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct RouteCreatePayload {
    pub source_id: AirportId,
    pub destination_id: AirportId,
    pub distance: i32,
}

pub type RouteUpdatePayload = RouteCreatePayload;
