//! Common functionality for the Hive telemetry client.
//!
//! This crate contains the types shared across the workspace that have no dependencies on the
//! aggregation pipeline itself: timestamps and the unit tokens attached to measurements.

#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod time;
pub mod unit;

pub use crate::time::*;
pub use crate::unit::*;
