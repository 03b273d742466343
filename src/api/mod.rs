//! HTTP API surface

pub mod handlers;
pub mod health;
pub mod models;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::{AppState, Services};
