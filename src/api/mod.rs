//! HTTP API for webhook registration, event dispatch and one-time codes

pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::{AppState, SharedState};
pub use server::{build_router, default_state, ApiServer};
