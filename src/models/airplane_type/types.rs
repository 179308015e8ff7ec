use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::AirplaneTypeId;

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct AirplaneType {
    pub id: AirplaneTypeId,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub type AirplaneTypeListResult = AirplaneType;

pub type AirplaneTypeCreateResult = AirplaneType;

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct AirplaneTypeCreatePayload {
    pub name: String,
}

pub type AirplaneTypeUpdatePayload = AirplaneTypeCreatePayload;
