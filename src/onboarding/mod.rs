//! Onboarding sessions and their REST endpoints.

pub mod routes;
pub mod session;

pub use routes::onboarding_routes;
pub use session::{OnboardingSession, PlanType, SessionStatus};
