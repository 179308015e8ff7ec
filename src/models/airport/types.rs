use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::AirportId;

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct Airport {
    pub id: AirportId,
    pub name: String,
    pub closest_big_city: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub type AirportListResult = Airport;

pub type AirportCreateResult = Airport;

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct AirportCreatePayload {
    pub name: String,
    pub closest_big_city: String,
}

pub type AirportUpdatePayload = AirportCreatePayload;
