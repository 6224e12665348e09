//! Core: API error type and logger.

pub mod error;
pub mod logger;

pub use error::{ApiError, Result};
pub use logger::init_tracing;
