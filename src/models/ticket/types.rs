use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::TicketId;
use crate::{models::flight::FlightId, Error};

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct Ticket {
    pub id: TicketId,
    pub flight_id: FlightId,
    pub seat: i32,
    pub row: i32,
}

/// The short flight description embedded in order views.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
pub struct TicketFlightSummary {
    pub id: FlightId,
    /// "<source airport> - <destination airport>"
    pub route: String,
    pub departure_time: chrono::DateTime<chrono::Utc>,
    pub arrival_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
pub struct TicketWithFlight {
    pub id: TicketId,
    pub row: i32,
    pub seat: i32,
    pub flight: TicketFlightSummary,
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct TicketCreatePayload {
    pub flight_id: FlightId,
    pub row: i32,
    pub seat: i32,
}

/// Check a requested seat against the airplane's dimensions.
pub fn validate_seat(row: i32, seat: i32, rows: i32, seats_in_row: i32) -> Result<(), Error> {
    if row < 1 || row > rows {
        return Err(Error::Validation(
            format!("row must be in the range 1..={rows}, got {row}").into(),
        ));
    }
    if seat < 1 || seat > seats_in_row {
        return Err(Error::Validation(
            format!("seat must be in the range 1..={seats_in_row}, got {seat}").into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_seats_inside_the_airplane() {
        assert!(validate_seat(1, 1, 20, 6).is_ok());
        assert!(validate_seat(20, 6, 20, 6).is_ok());
        assert!(validate_seat(10, 3, 20, 6).is_ok());
    }

    #[test]
    fn rejects_seats_outside_the_airplane() {
        assert!(validate_seat(0, 1, 20, 6).is_err());
        assert!(validate_seat(21, 1, 20, 6).is_err());
        assert!(validate_seat(1, 0, 20, 6).is_err());
        assert!(validate_seat(1, 7, 20, 6).is_err());
        assert!(validate_seat(-1, -1, 20, 6).is_err());
    }
}
