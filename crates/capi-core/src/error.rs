//! Error types for capi-extract

use thiserror::Error;

/// capi-extract error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The header itself failed to compile. `diagnostics` is the compiler's
    /// stderr, unmodified.
    #[error("Failed to compile {header}")]
    Compilation { header: String, diagnostics: String },

    #[error("Unrecognized type kind {kind} for `{spelling}`")]
    UnrecognizedType { kind: String, spelling: String },

    #[error("Type `{spelling}` has no declaration")]
    MissingDeclaration { spelling: String },

    #[error("Frontend error: {0}")]
    Frontend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for capi-extract
pub type Result<T> = std::result::Result<T, Error>;
