//! Types for the fade session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::engine::EngineError;
use crate::objects::ObjectRef;
use crate::upload::{DataUriError, SourceSummary};

/// File name offered when the produced clip is downloaded.
pub const DOWNLOAD_FILE_NAME: &str = "fade-video.mp4";

/// Lifecycle of the engine as seen by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineStatus {
    Unloaded,
    Loading,
    Ready,
    /// Load failed. Terminal.
    Failed { reason: String },
}

impl EngineStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineStatus::Ready)
    }
}

/// Errors that can occur while generating a clip.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// No source image, or the engine is not ready.
    #[error("No image or FFmpeg not loaded. Please upload an image and try again.")]
    NotReady,

    /// Another transcode is in flight.
    #[error("A video is already being generated. Please wait for it to finish.")]
    Busy,

    #[error("Invalid image data: File size is 0.")]
    InvalidImageData,

    #[error("Invalid image data: {0}")]
    MalformedImage(#[from] DataUriError),

    #[error("Failed to stage the input image: {0}")]
    Stage(#[source] EngineError),

    #[error("Failed to list the engine file system: {0}")]
    ListDir(#[source] EngineError),

    #[error("{0}")]
    Exec(#[source] EngineError),

    #[error("FFmpeg exited with code {code}")]
    ExitStatus { code: i32 },

    #[error("Output video file not created by FFmpeg.")]
    OutputMissing,

    #[error("Failed to read the output video: {0}")]
    ReadOutput(#[source] EngineError),

    #[error("Output video is empty.")]
    OutputEmpty,

    /// The attempt's task ended without a result (runtime shutdown).
    #[error("Video generation was interrupted.")]
    Interrupted,
}

impl GenerateError {
    /// Whether the attempt was refused before touching the engine.
    pub fn is_refusal(&self) -> bool {
        matches!(self, GenerateError::NotReady | GenerateError::Busy)
    }

    /// The message stored on the session for this error.
    pub fn user_message(&self) -> String {
        if self.is_refusal() {
            return self.to_string();
        }
        format!(
            "Failed to generate video: {}. Please try a different image.",
            self.to_string().trim_end_matches('.')
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerateError::NotReady => "not_ready",
            GenerateError::Busy => "busy",
            GenerateError::InvalidImageData | GenerateError::MalformedImage(_) => "invalid_image",
            GenerateError::Stage(_) => "stage",
            GenerateError::ListDir(_) => "list_dir",
            GenerateError::Exec(_) | GenerateError::ExitStatus { .. } => "exec",
            GenerateError::OutputMissing => "output_missing",
            GenerateError::ReadOutput(_) => "read_output",
            GenerateError::OutputEmpty => "output_empty",
            GenerateError::Interrupted => "interrupted",
        }
    }
}

/// The published clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputVideo {
    pub object: ObjectRef,
    pub content_type: String,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
    /// Wall time of the whole attempt.
    pub elapsed_ms: u64,
}

/// State change pushed to the update callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    EngineStatus { status: EngineStatus },
    Generating { active: bool },
    Progress { percent: u8 },
    SourceChanged { source: SourceSummary },
    OutputReady { output: OutputVideo },
    Error { message: String },
}

/// Callback invoked for every session event.
pub type SessionUpdateCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Point-in-time view of the session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub engine: EngineStatus,
    pub ready: bool,
    pub generating: bool,
    pub progress: u8,
    pub source: Option<SourceSummary>,
    pub output: Option<OutputVideo>,
    pub error: Option<String>,
}
