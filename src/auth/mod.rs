//! # Auth Module
//!
//! Pluggable request authentication.
//!
//! The dispatcher invokes a single [`AuthHandler`] per process. The handler
//! is entered when an endpoint requires auth, or opportunistically when a
//! request carries credentials the handler recognizes. On success it
//! produces an [`AuthContext`] that is attached to every handler request -
//! including on endpoints that never asked for auth - so business logic can
//! always inspect who is calling. On failure, auth-required endpoints are
//! rejected with 401 before binding; optional-auth endpoints proceed with an
//! empty context.
//!
//! Two providers ship with the crate:
//!
//! - [`ApiKeyAuth`] - a static key read from a header, query parameter, or
//!   cookie.
//! - [`BearerAuth`] - `header.payload.signature` bearer tokens with a
//!   pre-shared signature and claims extraction from the payload. Suitable
//!   for tests and internal services; production deployments should plug in
//!   their own [`AuthHandler`].

mod api_key;
mod bearer;
mod context;

pub use api_key::ApiKeyAuth;
pub use bearer::BearerAuth;
pub use context::AuthContext;

use crate::dispatcher::HeaderVec;
use crate::router::ParamVec;
use thiserror::Error;

/// Authentication failures surfaced as 401 responses on auth-required
/// endpoints and tolerated on optional-auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no credentials presented")]
    MissingCredentials,
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Credential material extracted from a request, borrowed from the parsed
/// request so providers never copy it.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub headers: &'a HeaderVec,
    pub query: &'a ParamVec,
    pub cookies: &'a HeaderVec,
}

impl<'a> AuthRequest<'a> {
    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Token from an `Authorization: Bearer ...` header, if present.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.get_header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
    }
}

/// External collaborator that authenticates requests.
///
/// Implementations must be cheap to call concurrently; one instance serves
/// all in-flight requests.
pub trait AuthHandler: Send + Sync {
    /// Cheap probe: does the request carry credentials this handler
    /// understands? Used to decide whether optional-auth endpoints enter the
    /// authenticating stage at all.
    fn credentials_present(&self, req: &AuthRequest<'_>) -> bool;

    /// Validate the credentials and produce the request's auth context.
    fn authenticate(&self, req: &AuthRequest<'_>) -> Result<AuthContext, AuthError>;
}
