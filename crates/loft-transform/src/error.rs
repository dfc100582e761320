//! Transformer error types.

use thiserror::Error;

/// Errors produced while transforming a module.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The source file could not be read from the virtual filesystem
    #[error(transparent)]
    Fs(#[from] loft_fs::FsError),

    /// The emitted or source code could not be parsed
    #[error("Parse error in {file}: {message}")]
    Parse {
        /// File being transformed
        file: String,
        /// Parser diagnostics, joined
        message: String,
    },

    /// The transform backend rejected the module
    #[error("Transform failed for {file}: {message}")]
    Backend {
        /// File being transformed
        file: String,
        /// Backend-reported reason
        message: String,
    },
}

/// Result type alias for transformer operations.
pub type TransformResult<T, E = TransformError> = std::result::Result<T, E>;
