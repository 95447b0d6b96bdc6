//! Askwell Core Library
//!
//! Foundational pieces shared by every askwell crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging setup
//! - Layered configuration (defaults, YAML, environment, CLI flags)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
