//! Shared API types and validation helpers

pub mod types;

pub use types::*;
