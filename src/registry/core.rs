use super::descriptor::EndpointDescriptor;
use crate::binder::BindingPlan;
use crate::router::{parse_template, RouteTable, Segment};
use http::Method;
use jsonschema::JSONSchema;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Registration-time failures. All of these are fatal: a service that cannot
/// register its endpoints must not start serving.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate endpoint `{0}`")]
    DuplicateEndpoint(String),
    #[error("invalid path template `{path}` on `{id}`: {reason}")]
    InvalidPath {
        id: String,
        path: String,
        reason: String,
    },
    #[error("path parameter `:{name}` on `{id}` has no matching schema field")]
    UnboundPathParam { id: String, name: String },
    #[error("field `{name}` on `{id}` matches a path parameter but carries a query/header marker")]
    ConflictingField { id: String, name: String },
    #[error("path parameter field `{name}` on `{id}` cannot be optional")]
    OptionalPathParam { id: String, name: String },
    #[error("body field `{name}` on `{id}` is not allowed: {method} requests carry no body")]
    BodyFieldNotAllowed {
        id: String,
        name: String,
        method: Method,
    },
    #[error("duplicate schema field `{name}` on `{id}`")]
    DuplicateField { id: String, name: String },
    #[error("raw endpoint `{0}` cannot declare a request schema")]
    RawEndpointSchema(String),
    #[error("invalid body schema on `{id}`: {reason}")]
    InvalidBodySchema { id: String, reason: String },
    #[error("invalid response schema on `{id}`: {reason}")]
    InvalidResponseSchema { id: String, reason: String },
}

/// A registered endpoint: the descriptor plus everything derived from it at
/// registration time, so the serving path never re-parses templates or
/// re-classifies fields.
pub struct Endpoint {
    pub descriptor: EndpointDescriptor,
    /// Field classification computed once from schema + path template.
    pub plan: BindingPlan,
    /// Parsed path template segments, shared by routing and path rendering.
    pub(crate) segments: Vec<Segment>,
    handler_id: String,
    pub(crate) body_validator: Option<JSONSchema>,
    pub(crate) response_validator: Option<JSONSchema>,
}

impl Endpoint {
    /// Dispatcher key, `service.endpoint`.
    #[must_use]
    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("descriptor", &self.descriptor)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

/// Process-wide endpoint table, populated during startup and then frozen.
///
/// `register` collects descriptors keyed by `(service, endpoint)`;
/// [`EndpointRegistry::freeze`] consumes the registry and produces the
/// read-only [`RouteTable`] the dispatcher serves from. There is no way to
/// register an endpoint after freezing, which is what makes concurrent
/// lock-free reads during serving sound.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: Vec<Arc<Endpoint>>,
    keys: HashSet<String>,
}

impl EndpointRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a descriptor.
    ///
    /// Fails with [`RegistryError::DuplicateEndpoint`] when the
    /// `(service, endpoint)` pair is already taken, and with the other
    /// variants when the descriptor violates a structural invariant
    /// (unbound path parameter, body field on a bodyless method, ...).
    pub fn register(&mut self, descriptor: EndpointDescriptor) -> Result<(), RegistryError> {
        let id = descriptor.handler_id();
        if self.keys.contains(&id) {
            return Err(RegistryError::DuplicateEndpoint(id));
        }

        let segments =
            parse_template(&descriptor.path).map_err(|reason| RegistryError::InvalidPath {
                id: id.clone(),
                path: descriptor.path.clone(),
                reason,
            })?;

        if descriptor.raw && descriptor.schema.is_some() {
            return Err(RegistryError::RawEndpointSchema(id));
        }

        let plan = BindingPlan::for_descriptor(&descriptor, &segments)?;

        let body_validator = match descriptor.schema.as_ref().and_then(|s| s.body_schema.as_ref()) {
            Some(schema) => Some(JSONSchema::compile(schema).map_err(|e| {
                RegistryError::InvalidBodySchema {
                    id: id.clone(),
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };
        let response_validator = match descriptor.response_schema.as_ref() {
            Some(schema) => Some(JSONSchema::compile(schema).map_err(|e| {
                RegistryError::InvalidResponseSchema {
                    id: id.clone(),
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        info!(
            endpoint = %id,
            method = %descriptor.method,
            path = %descriptor.path,
            exposure = ?descriptor.exposure,
            auth_required = descriptor.auth_required,
            "Endpoint registered"
        );

        self.keys.insert(id.clone());
        self.endpoints.push(Arc::new(Endpoint {
            descriptor,
            plan,
            segments,
            handler_id: id,
            body_validator,
            response_validator,
        }));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Freeze the registry into the read-only route table.
    ///
    /// Consuming `self` is the write-then-freeze barrier: once a
    /// [`RouteTable`] exists, the set of endpoints can no longer change.
    #[must_use]
    pub fn freeze(self) -> Arc<RouteTable> {
        info!(endpoints = self.endpoints.len(), "Endpoint registry frozen");
        RouteTable::build(self.endpoints)
    }
}
