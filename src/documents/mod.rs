//! Generated documents and their REST endpoints.

pub mod model;
pub mod routes;

pub use model::{Document, DocumentStatus, TemplateType};
pub use routes::document_routes;
