//! Protea API crate - axum HTTP server and route handlers.
//!
//! Serves the protein CRUD endpoints, the processed profile view, and the
//! chat endpoints backed by the query dispatcher.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
