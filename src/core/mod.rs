//! PRISM - Core constants and error types.
//!
//! Everything in here is dependency-light and shared by the crypto and
//! transport layers.

mod constants;
mod error;

pub use constants::*;
pub use error::*;
