//! Tickets are created and serialized through orders; they have no routes of their own.

pub mod types;

pub use types::*;

crate::make_object_id!(TicketId);
