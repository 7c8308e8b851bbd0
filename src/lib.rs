//! # zapgate
//!
//! Multi-session WhatsApp gateway core. This crate wires the workspace
//! together: [`Gateway`] builds the store, the session manager, the media
//! pipeline, and the webhook dispatcher from one [`Config`], and owns
//! startup and shutdown. The wire protocol itself lives behind the
//! [`ClientFactory`](zapgate_core::traits::ClientFactory) trait — embedders
//! supply an adapter over an actual WhatsApp client library.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # async fn run(factory: Arc<dyn zapgate_core::traits::ClientFactory>) -> zapgate_core::Result<()> {
//! let config = zapgate_core::config::load("config.toml")?;
//! let gateway = zapgate::Gateway::new(config, factory).await?;
//! gateway.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod gateway;
pub mod logging;

pub use gateway::Gateway;
pub use zapgate_core::config::{self, Config};
pub use zapgate_core::{GatewayError, Result};
