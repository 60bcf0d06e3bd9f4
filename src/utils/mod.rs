// src/utils/mod.rs
pub mod error;
pub mod logging;
pub mod scan;

pub use error::{AppError, Warning}; // Re-export main error types for convenience
