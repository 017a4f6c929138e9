//! Kiln Core
//!
//! Core domain types, traits, and error handling for kiln.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the scheduler, runner, storage, event and API crates.

pub mod build;
pub mod error;
pub mod events;
pub mod ids;
pub mod ports;
pub mod task;

pub use error::{Error, Result};
pub use ids::*;
