//! Session lifecycle, event ingestion, and the media pipeline.
//!
//! A [`SessionManager`] owns every live connection: it claims the single
//! per-session slot in the [`SessionRegistry`], drives connect/pair/teardown,
//! and spawns the per-session event pump and health supervisor. Events flow
//! from the protocol client through the [`router`] into the ingestion
//! handlers, which persist through the repository traits and fan out to the
//! webhook notifier.

pub mod ingest;
pub mod manager;
pub mod media;
pub mod qr;
pub mod registry;
pub mod router;
pub mod send;
pub mod supervisor;

pub use manager::{SessionManager, StartupReport};
pub use media::MediaPipeline;
pub use registry::{Phase, SessionRegistry};
pub use send::MessageSender;
