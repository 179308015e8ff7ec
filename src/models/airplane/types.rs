use schemars::JsonSchema;
use serde::{
    ser::{SerializeStruct, Serializer},
    Deserialize, Serialize,
};

use super::AirplaneId;
use crate::models::airplane_type::AirplaneTypeId;

#[derive(Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct Airplane {
    pub id: AirplaneId,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub airplane_type_id: AirplaneTypeId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub type AirplaneCreateResult = Airplane;

impl Airplane {
    pub fn capacity(&self) -> i32 {
        self.rows * self.seats_in_row
    }
}

impl Serialize for Airplane {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Airplane", 8)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("rows", &self.rows)?;
        state.serialize_field("seats_in_row", &self.seats_in_row)?;
        state.serialize_field("capacity", &self.capacity())?;
        state.serialize_field("airplane_type_id", &self.airplane_type_id)?;
        state.serialize_field("created_at", &self.created_at)?;
        state.serialize_field("updated_at", &self.updated_at)?;
        state.end()
    }
}

/// The list view joins the airplane type and shows its name instead of the id.
#[derive(Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct AirplaneListResult {
    pub id: AirplaneId,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub airplane_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl AirplaneListResult {
    pub fn capacity(&self) -> i32 {
        self.rows * self.seats_in_row
    }
}

impl Serialize for AirplaneListResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("AirplaneListResult", 8)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("rows", &self.rows)?;
        state.serialize_field("seats_in_row", &self.seats_in_row)?;
        state.serialize_field("capacity", &self.capacity())?;
        state.serialize_field("airplane_type", &self.airplane_type)?;
        state.serialize_field("created_at", &self.created_at)?;
        state.serialize_field("updated_at", &self.updated_at)?;
        state.end()
    }
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct AirplaneCreatePayload {
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub airplane_type_id: AirplaneTypeId,
}

pub type AirplaneUpdatePayload = AirplaneCreatePayload;
