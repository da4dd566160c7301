//! `data:` URI encoding for staged source images.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataUriError {
    #[error("not a data URI")]
    MissingScheme,

    #[error("data URI has no payload separator")]
    MissingPayload,

    #[error("only base64 data URIs are supported")]
    UnsupportedEncoding,

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Encodes `bytes` as `data:<media_type>;base64,<payload>`.
pub fn encode_data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Decodes a base64 data URI into its media type and raw bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), DataUriError> {
    let rest = uri.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingPayload)?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or(DataUriError::UnsupportedEncoding)?;

    let bytes = STANDARD.decode(payload)?;
    Ok((media_type.to_string(), bytes))
}
