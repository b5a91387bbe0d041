//! Phone-verification signup, JWT sessions, and the auth extractors.

pub mod phone;
pub mod routes;
pub mod token;
pub mod user;

pub use routes::auth_routes;
pub use token::{AdminUser, AuthUser, TokenService};
pub use user::User;
