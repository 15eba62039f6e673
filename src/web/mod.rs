//! Browser-facing rendering owned by the pipeline.
//!
//! Site pages are rendered by the views collaborator; the pipeline only renders
//! the error page for non-API requests, using Askama templates.

pub mod error_page;
