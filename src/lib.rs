//! # Natours request pipeline
//!
//! The HTTP front of the Natours tour booking service, built with Axum.
//!
//! This crate owns the ordered middleware pipeline every request passes
//! through: static assets, CORS, security headers, rate limiting, the raw-body
//! payment webhook, body and cookie parsing, input sanitization, compression,
//! route dispatch, the not-found fallback and the terminal error handler.
//! Route handlers for tours, users, reviews and bookings are collaborators
//! mounted through [`routes::Collaborators`].
//!
//! ## Architecture
//!
//! - **Pipeline** ([`pipeline`]) - Explicit stage order and router assembly
//! - **Stages** ([`api::middleware`]) - One module per stage
//! - **Context** ([`context`]) - Per-request annotations shared between stages
//! - **Infrastructure** ([`infrastructure`]) - Asset store and rate-limit counters
//! - **Web** ([`web`]) - HTML error page
//!
//! ## Quick Start
//!
//! ```bash
//! export APP_ENV=development
//! export STATIC_ROOT=public
//!
//! cargo run -- serve
//! cargo run -- stages      # print the pipeline order
//! ```
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod context;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod pipeline;
pub mod server;

pub mod routes;
pub mod web;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for collaborators and integration tests.
pub mod prelude {
    pub use crate::config::{Environment, PipelineConfig};
    pub use crate::context::RequestContext;
    pub use crate::error::AppError;
    pub use crate::pipeline::{Stage, build};
    pub use crate::routes::Collaborators;
    pub use crate::state::AppState;
}
