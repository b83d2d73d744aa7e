use super::{AuthContext, AuthError, AuthHandler, AuthRequest};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use tracing::debug;

/// Bearer-token authentication with a pre-shared signature.
///
/// Tokens have the form `header.payload.signature`; the signature part must
/// match the configured value, and the base64 payload is decoded into the
/// claims of the resulting [`AuthContext`]. The token is read from the
/// `Authorization` header or, when configured, a cookie.
///
/// This validates possession of a shared secret, not a real cryptographic
/// signature. Deployments facing external clients should supply their own
/// [`AuthHandler`] backed by a JWT library.
pub struct BearerAuth {
    signature: String,
    cookie_name: Option<String>,
}

impl BearerAuth {
    #[must_use]
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            cookie_name: None,
        }
    }

    /// Configure the cookie name used to read the token.
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    fn extract_token<'a>(&self, req: &'a AuthRequest<'_>) -> Option<&'a str> {
        if let Some(name) = &self.cookie_name {
            if let Some(t) = req.get_cookie(name) {
                return Some(t);
            }
        }
        req.bearer_token()
    }

    fn decode_claims(&self, token: &str) -> Result<Value, AuthError> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(sig), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidCredentials(
                "malformed bearer token".to_string(),
            ));
        };
        if sig != self.signature {
            debug!("bearer token rejected: signature mismatch");
            return Err(AuthError::InvalidCredentials(
                "invalid token signature".to_string(),
            ));
        }
        let payload_bytes = general_purpose::STANDARD.decode(payload).map_err(|_| {
            AuthError::InvalidCredentials("token payload is not base64".to_string())
        })?;
        serde_json::from_slice(&payload_bytes).map_err(|_| {
            AuthError::InvalidCredentials("token payload is not JSON".to_string())
        })
    }
}

impl AuthHandler for BearerAuth {
    fn credentials_present(&self, req: &AuthRequest<'_>) -> bool {
        self.extract_token(req).is_some()
    }

    fn authenticate(&self, req: &AuthRequest<'_>) -> Result<AuthContext, AuthError> {
        let token = self.extract_token(req).ok_or(AuthError::MissingCredentials)?;
        let claims = self.decode_claims(token)?;
        Ok(AuthContext::from_claims(claims))
    }
}
