use super::CrewCreatePayload;

/// Generate a CrewCreatePayload for testing.
pub fn make_create_payload(i: usize) -> CrewCreatePayload {
    CrewCreatePayload {
        first_name: format!("First{i}"),
        last_name: format!("Last{i}"),
    }
}
