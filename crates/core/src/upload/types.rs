//! Types for the upload stage.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::data_uri::{decode_data_uri, encode_data_uri, DataUriError};

/// Declared media types accepted for upload start with this prefix.
pub const IMAGE_MEDIA_PREFIX: &str = "image/";

/// Errors raised while accepting an upload.
///
/// The display strings are the user-facing messages.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file selected. Please choose an image.")]
    NoFile,

    #[error("Invalid file type. Please upload an image (JPEG/PNG).")]
    InvalidType { media_type: String },

    #[error("Failed to read the image file. Please try another image.")]
    Read { reason: String },

    #[error("FFmpeg is not loaded yet. Uploads are available once it is ready.")]
    EngineNotReady,

    #[error("A video is being generated. Please wait for it to finish.")]
    Busy,
}

/// A file handed over by the file picker.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    /// Declared media type, e.g. `image/png`.
    pub media_type: String,
    content: Result<Vec<u8>, String>,
}

impl UploadedFile {
    pub fn new(file_name: Option<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name,
            media_type: media_type.into(),
            content: Ok(data),
        }
    }

    /// A file whose metadata arrived but whose content could not be read.
    pub fn unreadable(
        file_name: Option<String>,
        media_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            file_name,
            media_type: media_type.into(),
            content: Err(reason.into()),
        }
    }

    /// Reads the file content into a [`SourceImage`].
    pub fn read_as_source(self) -> Result<SourceImage, UploadError> {
        let data = self
            .content
            .map_err(|reason| UploadError::Read { reason })?;

        Ok(SourceImage {
            data_uri: encode_data_uri(&self.media_type, &data),
            media_type: self.media_type,
            file_name: self.file_name,
            size_bytes: data.len(),
            uploaded_at: Utc::now(),
        })
    }
}

/// Checks presence first, then the declared media type.
pub fn validate_upload(file: Option<UploadedFile>) -> Result<UploadedFile, UploadError> {
    let file = file.ok_or(UploadError::NoFile)?;

    if !file.media_type.starts_with(IMAGE_MEDIA_PREFIX) {
        return Err(UploadError::InvalidType {
            media_type: file.media_type,
        });
    }

    Ok(file)
}

/// The staged source image, held as a data URI.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub data_uri: String,
    pub media_type: String,
    pub file_name: Option<String>,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl SourceImage {
    /// Decodes the data URI back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, DataUriError> {
        decode_data_uri(&self.data_uri).map(|(_, bytes)| bytes)
    }

    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            file_name: self.file_name.clone(),
            media_type: self.media_type.clone(),
            size_bytes: self.size_bytes,
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Serializable view of a [`SourceImage`] without its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub file_name: Option<String>,
    pub media_type: String,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}
