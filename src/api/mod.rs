//! API Module
//!
//! Admin HTTP surface for inspecting and resetting the shared instances.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Stats of every cache and the batcher
//! - `GET /stats/caches/:name` - Stats of one cache
//! - `DELETE /caches/:name` - Clear one cache

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
