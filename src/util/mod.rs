//! Utility types and functions

pub mod diag;
pub mod logger;
pub mod span;
