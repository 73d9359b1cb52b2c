//! Error types shared by the resolver, the sketch merger and the build pipeline.

use std::path::{Path, PathBuf};

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cyclic or runaway placeholder expansion, or a malformed properties source.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A programmer was requested but neither the owning nor the referenced
    /// platform declares it.
    #[error("programmer '{0}' not found")]
    ProgrammerNotFound(String),

    /// The resolved configuration lacks a mandatory key for the operation.
    #[error("{operation} not supported for board {board}")]
    UnsupportedOperation { operation: String, board: String },

    /// Board or platform resolution failure, surfaced verbatim.
    #[error("{0}")]
    Resolution(String),

    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be expressed relative to the sketch root.
    #[error("unable to compute relative path of {} to the sketch at {}", path.display(), root.display())]
    PathComputation { path: PathBuf, root: PathBuf },

    /// A single translation unit failed to compile; fatal to the build pass.
    #[error("compiling {}: {message}", file.display())]
    Compile { file: PathBuf, message: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn io(op: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error means "not available for this target" rather than a fault.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedOperation { .. })
    }
}
