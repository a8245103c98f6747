//! Outbound provider clients for the Courier engine.
//!
//! This crate owns the HTTP edges of the system: delivering email and chat
//! messages to external provider APIs. Each client is constructed from an
//! explicit configuration struct and exposes its capability through a trait
//! (`Mailer`, `ChatPoster`) so the engine and its tests never depend on a
//! live network.

pub mod chat;
pub mod email;
pub mod error;

pub use chat::{ChatApiClient, ChatPoster, ChatProviderConfig};
pub use email::{EmailMessage, EmailProviderConfig, HttpMailer, Mailer};
pub use error::ProviderError;
