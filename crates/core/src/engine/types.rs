//! Types for the engine binding.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::EngineError;

/// Locations of the two engine assets handed to [`super::Engine::load`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Engine bootstrap script.
    pub core_url: String,
    /// Engine execution image.
    pub wasm_url: String,
}

impl LoadOptions {
    pub fn new(core_url: impl Into<String>, wasm_url: impl Into<String>) -> Self {
        Self {
            core_url: core_url.into(),
            wasm_url: wasm_url.into(),
        }
    }
}

/// Notification pushed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Fractional progress of the running command (0.0 - 1.0).
    Progress { ratio: f64 },
    /// One internal log line.
    Log { message: String },
}

/// Listener invoked for every engine event.
pub type EventListener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// An entry of the engine's virtual file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Checks that `name` addresses a file directly inside the virtual file system.
pub fn validate_file_name(name: &str) -> Result<(), EngineError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');

    if invalid {
        return Err(EngineError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
