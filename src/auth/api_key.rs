use super::{AuthContext, AuthError, AuthHandler, AuthRequest};
use serde_json::json;
use tracing::debug;

/// Static API-key authentication.
///
/// The key is read from a header (default `x-api-key`), and optionally from
/// a query parameter or cookie when those sources are enabled. Intended for
/// service-to-service traffic and tests; the produced context carries only
/// the scheme marker, there is no per-key identity.
pub struct ApiKeyAuth {
    key: String,
    header_name: String,
    query_name: Option<String>,
    cookie_name: Option<String>,
}

impl ApiKeyAuth {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            header_name: "x-api-key".to_string(),
            query_name: None,
            cookie_name: None,
        }
    }

    /// Override the header the key is read from.
    #[must_use]
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Also accept the key as a query parameter.
    #[must_use]
    pub fn allow_query(mut self, name: impl Into<String>) -> Self {
        self.query_name = Some(name.into());
        self
    }

    /// Also accept the key from a cookie.
    #[must_use]
    pub fn allow_cookie(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    fn extract<'a>(&self, req: &'a AuthRequest<'_>) -> Option<&'a str> {
        if let Some(v) = req.get_header(&self.header_name) {
            return Some(v);
        }
        if let Some(name) = &self.query_name {
            if let Some(v) = req.get_query(name) {
                return Some(v);
            }
        }
        if let Some(name) = &self.cookie_name {
            if let Some(v) = req.get_cookie(name) {
                return Some(v);
            }
        }
        None
    }
}

impl AuthHandler for ApiKeyAuth {
    fn credentials_present(&self, req: &AuthRequest<'_>) -> bool {
        self.extract(req).is_some()
    }

    fn authenticate(&self, req: &AuthRequest<'_>) -> Result<AuthContext, AuthError> {
        let presented = self.extract(req).ok_or(AuthError::MissingCredentials)?;
        if presented != self.key {
            debug!("API key rejected");
            return Err(AuthError::InvalidCredentials("unknown API key".to_string()));
        }
        Ok(AuthContext::from_claims(json!({ "scheme": "api_key" })))
    }
}
