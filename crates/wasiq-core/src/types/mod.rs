//! Core types for Wasiq

mod snapshot;
mod topology;

pub use snapshot::*;
pub use topology::*;
