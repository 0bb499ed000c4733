pub mod crypto;
pub mod models;
pub mod repo;
pub mod service;

pub use models::{TotpSetup, TotpState};
pub use service::{TotpError, TotpService};
