//! Error types for the engine binding.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while driving the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A call was made before `load` succeeded.
    #[error("FFmpeg is not loaded")]
    NotLoaded,

    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    BinaryNotFound { path: PathBuf },

    /// Loading the engine failed.
    #[error("{reason}")]
    LoadFailed { reason: String },

    /// A virtual file name escapes the virtual file system.
    #[error("Invalid virtual file name: {name:?}")]
    InvalidName { name: String },

    /// The virtual file does not exist.
    #[error("No such file in FFmpeg file system: {name}")]
    FileNotFound { name: String },

    /// Only the root of the virtual file system can be listed.
    #[error("Unsupported directory: {path}")]
    UnsupportedPath { path: String },

    /// The engine command could not be run.
    #[error("FFmpeg execution failed: {reason}")]
    ExecFailed { reason: String },

    /// I/O error inside the virtual file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a new load failed error.
    pub fn load_failed(reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            reason: reason.into(),
        }
    }

    /// Creates a new execution failed error.
    pub fn exec_failed(reason: impl Into<String>) -> Self {
        Self::ExecFailed {
            reason: reason.into(),
        }
    }
}
