//! HTTP middleware, one module per pipeline stage.
//!
//! Modules are listed in request order; [`crate::pipeline::Stage::ORDER`] is the
//! authoritative sequence.

pub mod static_assets;
pub mod cors;
pub mod security_headers;
pub mod tracing;
pub mod rate_limit;
pub mod webhook;
pub mod body;
pub mod cookies;
pub mod sanitize;
pub mod hpp;
pub mod compression;
pub mod request_time;
pub mod errors;
