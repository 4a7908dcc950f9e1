//! Common types and utilities shared across the ofertas crates.
//!
//! This crate holds the shared error type and the observability helpers used
//! by every binary and adapter in the workspace. It stays small so the pure
//! `ofertas-core` crate can depend on it without pulling in HTTP or HTML
//! parsing.
//!
//! # Overview
//!
//! - [`OfertasError`] and [`Result`]: shared error handling
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use ofertas_common::OfertasError;
//!
//! let err = OfertasError::source("IBSAL", "listing page had no anchors");
//! assert_eq!(err.to_string(), "Source error (IBSAL): listing page had no anchors");
//! ```

pub mod observability;

/// Error types used across the ofertas workspace.
#[derive(thiserror::Error, Debug)]
pub enum OfertasError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A site adapter could not produce raw offers for its institute.
    #[error("Source error ({institute}): {message}")]
    Source { institute: String, message: String },

    /// Fetching a page failed after the retry budget was spent.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Reading or writing a snapshot failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be encoded.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OfertasError {
    /// Shorthand for [`OfertasError::Source`].
    pub fn source(institute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            institute: institute.into(),
            message: message.into(),
        }
    }
}

/// Convenient alias for results that use [`OfertasError`].
pub type Result<T> = std::result::Result<T, OfertasError>;
