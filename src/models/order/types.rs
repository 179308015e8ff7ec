use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::OrderId;
use crate::{
    models::ticket::{TicketCreatePayload, TicketWithFlight},
    users::UserId,
};

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Orders always serialize with their tickets, and each ticket embeds a flight summary.
#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct OrderWithTickets {
    pub id: OrderId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub tickets: Vec<TicketWithFlight>,
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct OrderCreatePayload {
    pub tickets: Vec<TicketCreatePayload>,
}
