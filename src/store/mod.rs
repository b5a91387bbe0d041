//! Persistence layer: backend-agnostic `Database` trait + libSQL backend.

pub mod libsql_backend;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, InteractionStats, LogQuery, Page, UserQuery};
