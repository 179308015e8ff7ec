use schemars::JsonSchema;
use serde::{
    ser::{SerializeStruct, Serializer},
    Deserialize, Serialize,
};

use super::CrewId;

#[derive(Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct Crew {
    pub id: CrewId,
    pub first_name: String,
    pub last_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub type CrewListResult = Crew;

pub type CrewCreateResult = Crew;

impl Crew {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Serialize for Crew {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Crew", 6)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("first_name", &self.first_name)?;
        state.serialize_field("last_name", &self.last_name)?;
        state.serialize_field("full_name", &self.full_name())?;
        state.serialize_field("created_at", &self.created_at)?;
        state.serialize_field("updated_at", &self.updated_at)?;
        state.end()
    }
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct CrewCreatePayload {
    pub first_name: String,
    pub last_name: String,
}

pub type CrewUpdatePayload = CrewCreatePayload;
