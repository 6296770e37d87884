//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod clock;
pub mod config;
pub mod image_host;
pub mod ports;
pub mod rate_limit;
pub mod sqlite;
pub mod upload_dir;
