pub mod airplane;
pub mod airplane_type;
pub mod airport;
pub mod crew;
pub mod flight;
pub mod order;
pub mod route;
pub mod ticket;

use axum::Router;

use crate::server::ServerState;

pub fn create_routes() -> Router<ServerState> {
    Router::new()
        .merge(airport::endpoints::create_routes())
        .merge(crew::endpoints::create_routes())
        .merge(airplane_type::endpoints::create_routes())
        .merge(airplane::endpoints::create_routes())
        .merge(route::endpoints::create_routes())
        .merge(flight::endpoints::create_routes())
        .merge(order::endpoints::create_routes())
}
