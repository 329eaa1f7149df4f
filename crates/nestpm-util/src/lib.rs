#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared utilities for nestpm.
//!
//! Pure helper functions with no logging/tracing dependencies.
//! Logging is emitted by `nestpm-core` and configured by the CLI.

pub mod fs;
pub mod hash;
