use serde_json::Value;

/// Opaque per-request authentication data.
///
/// Produced by an [`AuthHandler`](super::AuthHandler) (or supplied by an
/// internal caller) and attached to every handler request. An empty context
/// means the request was not authenticated; handlers on optional-auth
/// endpoints must be prepared for either.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    claims: Option<Value>,
}

impl AuthContext {
    /// The unauthenticated context.
    #[must_use]
    pub fn empty() -> Self {
        Self { claims: None }
    }

    #[must_use]
    pub fn from_claims(claims: Value) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }

    /// The raw claims object, `Null` when unauthenticated.
    #[must_use]
    pub fn claims(&self) -> &Value {
        self.claims.as_ref().unwrap_or(&Value::Null)
    }

    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.as_ref().and_then(|c| c.get(name))
    }

    /// The `sub` claim, when the provider supplied one.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claim("sub").and_then(Value::as_str)
    }
}
