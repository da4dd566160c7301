//! The fixed fade-in command and per-invocation file naming.

use chrono::Utc;

/// Fade from black starting at 0 s over 2 s.
pub const FADE_FILTER: &str = "fade=t=in:st=0:d=2";
/// Total output duration in seconds.
pub const OUTPUT_DURATION_SECS: &str = "10";
pub const VIDEO_CODEC: &str = "libx264";
pub const PIXEL_FORMAT: &str = "yuv420p";
/// Media type of the produced clip.
pub const OUTPUT_MEDIA_TYPE: &str = "video/mp4";

/// Builder for the engine argument list that turns one still frame into a
/// fade-in clip.
///
/// Argument order and flag spelling are part of the engine contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FadeCommand {
    input: String,
    output: String,
}

impl FadeCommand {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    pub fn for_names(names: &StagedNames) -> Self {
        Self::new(&names.input, &names.output)
    }

    pub fn args(&self) -> Vec<String> {
        [
            "-loop",
            "1",
            "-i",
            self.input.as_str(),
            "-vf",
            FADE_FILTER,
            "-t",
            OUTPUT_DURATION_SECS,
            "-c:v",
            VIDEO_CODEC,
            "-pix_fmt",
            PIXEL_FORMAT,
            self.output.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Virtual file names for one transcode invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedNames {
    pub input: String,
    pub output: String,
}

impl StagedNames {
    /// Timestamp-qualified names; `seq` disambiguates calls within the same
    /// millisecond.
    pub fn new(seq: u64, media_type: &str) -> Self {
        Self::at(Utc::now().timestamp_millis(), seq, media_type)
    }

    pub fn at(timestamp_ms: i64, seq: u64, media_type: &str) -> Self {
        Self {
            input: format!(
                "input_{}_{}.{}",
                timestamp_ms,
                seq,
                image_extension(media_type)
            ),
            output: format!("output_{}_{}.mp4", timestamp_ms, seq),
        }
    }
}

/// File extension the engine should see for an image media type.
pub fn image_extension(media_type: &str) -> &'static str {
    match media_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "jpg",
    }
}
