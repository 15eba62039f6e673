//! Parsing helpers shared by several stages.

pub mod query;
