//! Caller identity for community routes.
//!
//! The session layer in front of the engine forwards the signed-in user's
//! email in `X-User-Email`. Resolving the email to a user (and rejecting
//! unknown ones) is the community use case's job.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Email of the caller, if the request carried one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerEmail(pub Option<String>);

impl CallerEmail {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for CallerEmail
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(CallerEmail(email))
    }
}
