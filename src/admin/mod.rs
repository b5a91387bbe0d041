//! Admin dashboard and management endpoints.

pub mod routes;

pub use routes::admin_routes;
