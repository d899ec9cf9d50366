//! Shared error plumbing used across the edulift crates.

pub mod error;

pub use error::FromMessage;
