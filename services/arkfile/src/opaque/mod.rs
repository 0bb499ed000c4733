//! `OPAQUE` protocol driver and session-key binding.

pub mod engine;
pub mod session;

pub use engine::{ExportKey, OpaqueEngine, PakeError};
pub use session::SessionKey;
