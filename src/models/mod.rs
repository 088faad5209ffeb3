//! Data models for the pool registry.
//!
//! This module re-exports the engine descriptor and the credentials value.

pub mod credentials;
pub mod engine;

// Re-export commonly used types
pub use credentials::{Credentials, CredentialsBuilder, DEFAULT_HOST, DEFAULT_PORT};
pub use engine::Engine;
