//! Shared types for OpenCafe

pub mod error;

pub use error::{CafeError, Result};
