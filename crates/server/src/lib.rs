//! HTTP surface of the fade service.

pub mod api;
pub mod metrics;
pub mod state;
