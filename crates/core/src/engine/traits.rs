//! Trait definitions for the engine binding.

use async_trait::async_trait;

use super::error::EngineError;
use super::types::{DirEntry, EventListener, LoadOptions};

/// A transcoding engine with a private virtual file system.
///
/// Every call is fallible and is never retried by the engine itself.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Registers a listener for progress and log events.
    ///
    /// Listeners are called synchronously from the engine's reader, so they
    /// must not block.
    fn on_event(&self, listener: EventListener);

    /// Whether `load` has succeeded.
    fn is_loaded(&self) -> bool;

    /// Brings the engine from unloaded to ready. May take arbitrarily long.
    async fn load(&self, options: &LoadOptions) -> Result<(), EngineError>;

    /// Writes `data` to the virtual file `name`, replacing any existing file.
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Lists a directory of the virtual file system.
    async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, EngineError>;

    /// Runs a command against the virtual file system and returns its exit code.
    async fn exec(&self, args: &[String]) -> Result<i32, EngineError>;

    /// Reads the virtual file `name`.
    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    /// Deletes the virtual file `name`.
    async fn delete_file(&self, name: &str) -> Result<(), EngineError>;
}
