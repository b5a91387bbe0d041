//! OnboardIQ — multi-channel customer onboarding backend.

pub mod admin;
pub mod ai;
pub mod audit;
pub mod auth;
pub mod comms;
pub mod config;
pub mod documents;
pub mod error;
pub mod foxit;
pub mod llm;
pub mod onboarding;
pub mod router;
pub mod state;
pub mod store;
pub mod vonage;
