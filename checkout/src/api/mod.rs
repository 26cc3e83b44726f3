//! HTTP API endpoints.
//!
//! - `POST /api/purchases` - start a purchase (authenticated)
//! - `GET /api/reservations/:id` - poll a reservation (owner only)
//! - `POST /webhooks/razorpay` - provider callbacks (signature authenticated)

pub mod purchases;
pub mod reservations;
pub mod webhooks;
