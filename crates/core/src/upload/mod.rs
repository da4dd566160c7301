//! Upload stage: validation of a single selected file and its in-memory,
//! re-readable representation as a data URI.

mod data_uri;
mod types;

pub use data_uri::{decode_data_uri, encode_data_uri, DataUriError};
pub use types::{
    validate_upload, SourceImage, SourceSummary, UploadError, UploadedFile, IMAGE_MEDIA_PREFIX,
};
