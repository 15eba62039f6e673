//! Infrastructure layer: process-local stores the pipeline stages depend on.
//!
//! # Modules
//!
//! - [`assets`] - Public asset lookup under the static root
//! - [`rate_limiter`] - Fixed-window request counters per client

pub mod assets;
pub mod rate_limiter;

pub use assets::{AssetStore, DirAssetStore, ResolveError};
pub use rate_limiter::{Decision, RateLimiter};
