pub mod auth;
pub mod cmd;
pub mod db;
pub mod error;
pub mod models;
pub mod object_id;
pub mod server;
pub mod sql;
#[cfg(test)]
pub mod tests;
pub mod tracing_config;
pub mod users;

pub use error::Error;
