//! HTTP layer: pipeline stages and the system routes the pipeline owns.
//!
//! # Modules
//!
//! - [`dto`] - Response bodies for system routes
//! - [`handlers`] - System route handlers (health)
//! - [`middleware`] - One module per pipeline stage

pub mod dto;
pub mod handlers;
pub mod middleware;
