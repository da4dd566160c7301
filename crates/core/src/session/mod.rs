//! The fade session: engine lifecycle, source image, and single-flight
//! transcoding into a published clip.
//!
//! - **Initialize**: once per process, terminal on failure
//! - **Upload**: validation only, no engine calls
//! - **Generate**: one transcode at a time, staged files always cleaned up

mod guard;
mod runner;
mod types;

pub use runner::Session;
pub use types::{
    EngineStatus, GenerateError, OutputVideo, SessionEvent, SessionSnapshot,
    SessionUpdateCallback, DOWNLOAD_FILE_NAME,
};
