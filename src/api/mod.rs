//! HTTP surface of the relay: router, middleware and route handlers.

pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{build_router, start_server, AppState};
