//! Engine binding for the transcoding engine.
//!
//! The engine is a black box driven through a small asynchronous call surface:
//! it is loaded once, then files are staged into its private virtual file
//! system, a command is executed against them and the results are read back.
//! Progress and diagnostic log lines are pushed to listeners registered with
//! [`Engine::on_event`].
//!
//! # Example
//!
//! ```ignore
//! use stillfade_core::engine::{Engine, EngineConfig, FfmpegEngine, LoadOptions};
//!
//! let engine = FfmpegEngine::new(EngineConfig::default());
//! engine.on_event(Arc::new(|event| println!("{:?}", event)));
//! engine.load(&LoadOptions::new("/ffmpeg/ffmpeg-core.js", "/ffmpeg/ffmpeg-core.wasm")).await?;
//!
//! engine.write_file("input.png", &bytes).await?;
//! let code = engine.exec(&args).await?;
//! let video = engine.read_file("output.mp4").await?;
//! engine.delete_file("input.png").await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::EngineConfig;
pub use error::EngineError;
pub use ffmpeg::FfmpegEngine;
pub use traits::Engine;
pub use types::{validate_file_name, DirEntry, EngineEvent, EventListener, LoadOptions};
