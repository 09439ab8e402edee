//! API Read Layer (component G): an `axum` router over pure cache reads,
//! per spec.md §4.7.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::ApiState;
