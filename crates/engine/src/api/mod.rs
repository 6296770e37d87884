//! API layer - HTTP entry points.

pub mod admin;
pub mod auth;
pub mod community;
pub mod http;
pub mod images;
pub mod library;

#[cfg(test)]
pub(crate) mod test_support;
