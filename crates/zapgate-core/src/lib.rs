//! # zapgate-core
//!
//! Core types, traits, configuration, and error handling for the Zapgate
//! multi-session WhatsApp gateway.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod jid;
pub mod media;
pub mod message;
pub mod outbound;
pub mod session;
pub mod traits;
pub mod webhook;

pub use error::{GatewayError, Result};
pub use jid::Jid;
