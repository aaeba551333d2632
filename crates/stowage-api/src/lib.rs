//! Stowage API Library
//!
//! HTTP surface of the explorer services: route setup, identity resolution, signed
//! link verification and the translation of service replies into responses.

pub mod constants;
pub mod error;
mod handlers;
pub mod identity;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::HttpAppError;
pub use state::AppState;
