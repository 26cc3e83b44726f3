//! HTTP server module for the checkout service.
//!
//! - Application state and dependency wiring
//! - Router configuration

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::{AppState, Dependencies};
