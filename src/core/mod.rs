//! Core types for FrameNet: constants, errors, and collaborator traits.
//!
//! This module is always available, independent of feature flags.

pub mod constants;
mod error;
mod traits;

pub use error::*;
pub use traits::*;
