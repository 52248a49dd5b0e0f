// src/error.rs

use thiserror::Error;

pub type AdsResult<T> = Result<T, AdsError>;

/// Exceptional failures of the mediation layer.
///
/// Ad conditions (no fill, capped placement, show already running) are not
/// errors: they come back as a `ShowResult` with `error = true`.
#[derive(Error, Debug)]
pub enum AdsError {
    #[error("Placement not found: {0}")]
    PlacementNotFound(String),

    #[error("No provider selected, check placement availability before showing")]
    NoProviderSelected,

    #[error("Ads operation cancelled")]
    Cancelled,

    #[error("Ads service disposed")]
    Disposed,

    #[error("Provider {sdk} error: {message}")]
    Provider { sdk: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
