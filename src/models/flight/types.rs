use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::FlightId;
use crate::models::{
    airplane::{AirplaneId, AirplaneListResult},
    crew::{Crew, CrewId},
    route::{RouteId, RouteListResult},
};

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct Flight {
    pub id: FlightId,
    pub route_id: RouteId,
    pub airplane_id: AirplaneId,
    pub departure_time: chrono::DateTime<chrono::Utc>,
    pub arrival_time: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// The list view joins the route (with both airports) and the airplane, and counts sold
/// tickets, all in a single query.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct FlightListResult {
    pub id: FlightId,
    /// "<source airport> - <destination airport>"
    pub route: String,
    pub airplane_name: String,
    pub airplane_capacity: i32,
    pub departure_time: chrono::DateTime<chrono::Utc>,
    pub arrival_time: chrono::DateTime<chrono::Utc>,
    pub tickets_available: i32,
}

/// A sold seat on a flight.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema, sqlx::FromRow)]
pub struct SeatRef {
    pub seat: i32,
    pub row: i32,
}

/// The retrieve view: the flight with its route, airplane, crew, and the seats that are
/// already taken.
#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct FlightPopulatedGetResult {
    pub id: FlightId,
    pub route_id: RouteId,
    pub airplane_id: AirplaneId,
    pub departure_time: chrono::DateTime<chrono::Utc>,
    pub arrival_time: chrono::DateTime<chrono::Utc>,
    pub route: RouteListResult,
    pub airplane: AirplaneListResult,
    pub crew: Vec<Crew>,
    pub taken_seats: Vec<SeatRef>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct FlightCreatePayload {
    pub route_id: RouteId,
    pub airplane_id: AirplaneId,
    pub departure_time: chrono::DateTime<chrono::Utc>,
    pub arrival_time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub crew_ids: Vec<CrewId>,
}

pub type FlightUpdatePayload = FlightCreatePayload;

/// The create/update result carries the crew assignment back to the caller.
#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct FlightCreateResult {
    #[serde(flatten)]
    pub flight: Flight,
    pub crew_ids: Vec<CrewId>,
}
