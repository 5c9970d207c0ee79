//! Wasiq Core Library
//!
//! Shared types for the Wasiq cluster bootstrap layer: the cluster
//! topology description a node is started with, and the snapshot form
//! of it that nodes exchange to confirm they agree.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// Wasiq version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
