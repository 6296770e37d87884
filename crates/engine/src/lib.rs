//! Storyforge Engine library.
//!
//! This crate contains all server-side code for Storyforge.
//!
//! ## Structure
//!
//! - `use_cases/` - Library, import, images, backup and community orchestration
//! - `infrastructure/` - External dependency implementations (ports + adapters)
//! - `api/` - HTTP entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
