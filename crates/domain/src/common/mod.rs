//! Common utility functions shared across the Storyforge crates.
//!
//! Pure functions only: no side effects, no I/O.

pub mod datetime;

pub use datetime::{format_storage_time, format_wire_time, parse_datetime};
