use super::AirportCreatePayload;

/// Generate an AirportCreatePayload for testing.
/// Parameter `i` controls the value of some of the fields, just to make sure that the
/// objects don't all look identical.
pub fn make_create_payload(i: usize) -> AirportCreatePayload {
    AirportCreatePayload {
        name: format!("Airport {i}"),
        closest_big_city: format!("City {i}"),
    }
}
