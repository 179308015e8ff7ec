use super::AirplaneTypeCreatePayload;

/// Generate an AirplaneTypeCreatePayload for testing.
pub fn make_create_payload(i: usize) -> AirplaneTypeCreatePayload {
    AirplaneTypeCreatePayload {
        name: format!("Type {i}"),
    }
}
