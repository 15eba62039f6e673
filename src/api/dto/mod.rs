//! Data Transfer Objects for system responses.

pub mod health;
