//! Core error types for infrascan-core

use thiserror::Error;

/// Errors that abort a whole run
///
/// Everything that only affects one host, hub or guest is recorded in the
/// run's `ErrorLog` instead.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Configuration could not be loaded or is unusable
    #[error("configuration error: {0}")]
    Config(String),

    /// The result sink rejected an operation
    #[error("result sink error: {0}")]
    Sink(String),
}
