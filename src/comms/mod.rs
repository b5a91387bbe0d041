//! Communication records and outbound email.

pub mod email;
pub mod model;

pub use email::EmailSender;
pub use model::{Communication, CommunicationKind, CommunicationStatus};
