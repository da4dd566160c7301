//! Testing utilities and a mock engine for session and HTTP tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use stillfade_core::testing::{fixtures, MockEngine};
//!
//! let engine = Arc::new(MockEngine::new());
//! engine.set_load_error("missing core").await;
//!
//! let file = UploadedFile::new(None, "image/jpeg", fixtures::jpeg_bytes(10 * 1024));
//! ```

mod mock_engine;

pub use fixtures::{jpeg_bytes, mp4_bytes};
pub use mock_engine::{MockCall, MockEngine, MockOp};

/// Test fixtures and helper functions.
pub mod fixtures {
    /// A buffer of `len` bytes that starts like a JPEG file.
    pub fn jpeg_bytes(len: usize) -> Vec<u8> {
        with_header(&[0xFF, 0xD8, 0xFF, 0xE0], len)
    }

    /// A buffer of `len` bytes that starts like an MP4 file.
    pub fn mp4_bytes(len: usize) -> Vec<u8> {
        with_header(b"\x00\x00\x00\x18ftypmp42", len)
    }

    fn with_header(header: &[u8], len: usize) -> Vec<u8> {
        let mut data: Vec<u8> = header.iter().copied().take(len).collect();
        data.extend((data.len()..len).map(|i| (i % 251) as u8));
        data
    }

}
