use super::{queries, Airplane, AirplaneCreatePayload, AirplaneId};
use crate::models::airplane_type::{
    self, testing::make_create_payload as make_type_payload, AirplaneType, AirplaneTypeId,
};

pub fn make_create_payload(i: usize, airplane_type_id: AirplaneTypeId) -> AirplaneCreatePayload {
    AirplaneCreatePayload {
        name: format!("Airplane {i}"),
        rows: 10 + i as i32,
        seats_in_row: 4 + (i % 3) as i32,
        airplane_type_id,
    }
}

/// Insert an airplane type and an airplane that uses it.
pub async fn setup_airplane(db: &sqlx::PgPool, i: usize) -> (AirplaneType, Airplane) {
    let mut tx = db.begin().await.unwrap();

    let airplane_type =
        airplane_type::queries::create_raw(&mut tx, AirplaneTypeId::new(), make_type_payload(i))
            .await
            .expect("Creating test airplane type failed");

    let airplane = queries::create_raw(
        &mut tx,
        AirplaneId::new(),
        make_create_payload(i, airplane_type.id),
    )
    .await
    .expect("Creating test airplane failed");

    tx.commit().await.unwrap();

    (airplane_type, airplane)
}
