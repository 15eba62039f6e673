//! System route handlers owned by the pipeline itself.
//!
//! Domain handlers (tours, users, reviews, bookings) are collaborators and
//! live outside this crate; see [`crate::routes::Collaborators`].

pub mod health;

pub use health::health_handler;
