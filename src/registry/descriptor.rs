use http::Method;
use serde_json::Value;
use std::sync::Arc;

/// Whether an endpoint is reachable from outside the deployed process group.
///
/// Private endpoints can still be invoked through the in-process
/// [`ServiceClient`](crate::client::ServiceClient); requests arriving over
/// the HTTP boundary are rejected with 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    Public,
    Private,
}

/// Primitive type a declared field coerces into.
///
/// Path, query, and header values arrive as strings and are parsed into the
/// declared type; body values must already carry the matching JSON type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
}

impl FieldType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Marker overriding where a schema field is read from.
///
/// Unmarked fields are path parameters when their name matches a `:name`
/// placeholder in the path template, and body fields otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMarker {
    Query,
    Header,
}

/// One field of a request schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: Arc<str>,
    pub ty: FieldType,
    pub required: bool,
    pub marker: Option<FieldMarker>,
}

impl FieldSpec {
    /// A required field, classified by name against the path template
    /// (path parameter if it matches a placeholder, body field otherwise).
    #[must_use]
    pub fn new(name: &str, ty: FieldType) -> Self {
        Self {
            name: Arc::from(name),
            ty,
            required: true,
            marker: None,
        }
    }

    /// Read this field from the query string.
    #[must_use]
    pub fn query(mut self) -> Self {
        self.marker = Some(FieldMarker::Query);
        self
    }

    /// Read this field from a request header of the same name.
    #[must_use]
    pub fn header(mut self) -> Self {
        self.marker = Some(FieldMarker::Header);
        self
    }

    /// Absent values are tolerated and omitted from the bound parameters.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Structural request schema: the set of fields a handler declares.
///
/// The schema is classified into a [`BindingPlan`](crate::binder::BindingPlan)
/// once, when the descriptor is registered.
#[derive(Debug, Clone, Default)]
pub struct ApiSchema {
    pub fields: Vec<FieldSpec>,
    /// Optional raw JSON Schema applied to the request body on top of the
    /// structural field checks.
    pub body_schema: Option<Value>,
}

impl ApiSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn body_schema(mut self, schema: Value) -> Self {
        self.body_schema = Some(schema);
        self
    }
}

/// Immutable metadata record describing one endpoint's contract.
///
/// Descriptors are produced by [`EndpointDescriptor::builder`] and handed to
/// [`EndpointRegistry::register`](crate::registry::EndpointRegistry::register);
/// they are never mutated after registration.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    /// Service the endpoint belongs to.
    pub service: Arc<str>,
    /// Endpoint name, unique within the service.
    pub name: Arc<str>,
    pub method: Method,
    /// Path template with `:name` placeholders, e.g. `/blog/:id`.
    pub path: String,
    pub exposure: Exposure,
    pub auth_required: bool,
    /// Declared request schema; `None` means the endpoint takes no parameters.
    pub schema: Option<ApiSchema>,
    /// Optional JSON Schema the handler's response body must satisfy.
    pub response_schema: Option<Value>,
    /// Raw-mode endpoints bypass binding entirely and receive the unparsed body.
    pub raw: bool,
}

impl EndpointDescriptor {
    #[must_use]
    pub fn builder(service: &str, name: &str) -> EndpointBuilder {
        EndpointBuilder {
            descriptor: EndpointDescriptor {
                service: Arc::from(service),
                name: Arc::from(name),
                method: Method::GET,
                path: String::new(),
                exposure: Exposure::Private,
                auth_required: false,
                schema: None,
                response_schema: None,
                raw: false,
            },
        }
    }

    /// Dispatcher key, `service.endpoint`.
    #[must_use]
    pub fn handler_id(&self) -> String {
        format!("{}.{}", self.service, self.name)
    }

    /// Whether the HTTP method carries a request body.
    #[must_use]
    pub fn allows_body(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }
}

/// Builder producing an immutable [`EndpointDescriptor`].
///
/// Endpoints default to `Private` exposure and no auth requirement; both are
/// opted into explicitly. Structural validation happens at registration, not
/// here.
#[derive(Debug, Clone)]
pub struct EndpointBuilder {
    descriptor: EndpointDescriptor,
}

impl EndpointBuilder {
    #[must_use]
    pub fn route(mut self, method: Method, path: &str) -> Self {
        self.descriptor.method = method;
        self.descriptor.path = path.to_string();
        self
    }

    #[must_use]
    pub fn get(self, path: &str) -> Self {
        self.route(Method::GET, path)
    }

    #[must_use]
    pub fn post(self, path: &str) -> Self {
        self.route(Method::POST, path)
    }

    #[must_use]
    pub fn put(self, path: &str) -> Self {
        self.route(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(self, path: &str) -> Self {
        self.route(Method::DELETE, path)
    }

    /// Make the endpoint reachable from outside the process group.
    #[must_use]
    pub fn expose(mut self) -> Self {
        self.descriptor.exposure = Exposure::Public;
        self
    }

    /// Require a successful authentication before the request is bound.
    #[must_use]
    pub fn require_auth(mut self) -> Self {
        self.descriptor.auth_required = true;
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: ApiSchema) -> Self {
        self.descriptor.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn response_schema(mut self, schema: Value) -> Self {
        self.descriptor.response_schema = Some(schema);
        self
    }

    /// Bypass binding; the handler receives the unparsed request.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.descriptor.raw = true;
        self
    }

    #[must_use]
    pub fn build(self) -> EndpointDescriptor {
        self.descriptor
    }
}
