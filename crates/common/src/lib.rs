//! Admission review wire types and errors shared across `auto-seal-webhook` crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
