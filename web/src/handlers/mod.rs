//! HTTP request handlers shared by every service.

pub mod health;

pub use health::{Readiness, health_check, readiness_check};
