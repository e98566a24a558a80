//! Models Module - Data Structures & Configuration
//!
//! Single source of truth for entry metadata, open modes, connection
//! options, and the coded error type.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
