//! # Pathlock Development Tools
//!
//! Command-line tools for level authors:
//! - Level file validation
//! - Pre-flight collision prediction for hand-written paths

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod preflight;
pub mod validate;
