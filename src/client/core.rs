use crate::auth::AuthContext;
use crate::binder::{scalar_to_string, BindError, ParamLocation};
use crate::dispatcher::{DispatchInput, Dispatcher, HeaderVec, RequestOrigin};
use crate::ids::RequestId;
use crate::registry::Endpoint;
use crate::router::{ParamVec, RouteTable, Segment};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

/// Failures of an in-process endpoint call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("unknown endpoint `{service}.{endpoint}`")]
    UnknownEndpoint { service: String, endpoint: String },
    #[error("authentication required for `{service}.{endpoint}`")]
    Unauthorized { service: String, endpoint: String },
    #[error(transparent)]
    Binding(#[from] BindError),
    #[error("endpoint returned {status} {code}: {message}")]
    Endpoint {
        status: u16,
        code: String,
        message: String,
    },
    #[error("arguments could not be serialized: {0}")]
    Encode(String),
    #[error("response could not be deserialized: {0}")]
    Decode(String),
}

/// In-process façade over registered endpoints of other services.
///
/// Calls look up the target by `(service, endpoint)` name and run the same
/// dispatch pipeline as the HTTP boundary - binding, auth-context
/// enforcement, the lot - but skip serialization and network transport
/// entirely. The origin is `Internal`, so private endpoints are reachable;
/// an auth-required endpoint still rejects a call made without an
/// authenticated context.
#[derive(Clone)]
pub struct ServiceClient {
    table: Arc<RouteTable>,
    dispatcher: Arc<RwLock<Dispatcher>>,
}

impl ServiceClient {
    #[must_use]
    pub fn new(table: Arc<RouteTable>, dispatcher: Arc<RwLock<Dispatcher>>) -> Self {
        Self { table, dispatcher }
    }

    /// Call an endpoint with a JSON argument object and an auth context to
    /// propagate. Pass [`AuthContext::empty`] for unauthenticated calls.
    ///
    /// The argument object carries every declared field by name, regardless
    /// of whether HTTP would transport it in the path, query string, a
    /// header, or the body.
    pub fn call(
        &self,
        service: &str,
        endpoint: &str,
        args: Value,
        auth: AuthContext,
    ) -> Result<Value, CallError> {
        let endpoint_arc = self
            .table
            .endpoint(service, endpoint)
            .map(Arc::clone)
            .ok_or_else(|| CallError::UnknownEndpoint {
                service: service.to_string(),
                endpoint: endpoint.to_string(),
            })?;

        let (path_params, query_params, headers, body) = lower_args(&endpoint_arc, args)?;
        let path = render_path(&endpoint_arc, &path_params);

        debug!(
            endpoint = %endpoint_arc.handler_id(),
            path = %path,
            authenticated = auth.is_authenticated(),
            "Internal call"
        );

        let input = DispatchInput {
            origin: RequestOrigin::Internal,
            request_id: RequestId::new(),
            path,
            path_params,
            query_params,
            headers,
            cookies: HeaderVec::new(),
            body,
            auth: Some(auth),
        };

        let response = {
            let dispatcher = self.dispatcher.read().unwrap();
            dispatcher.dispatch(&endpoint_arc, input)
        };

        if response.status < 400 {
            return Ok(response.body);
        }
        if response.status == 401 {
            return Err(CallError::Unauthorized {
                service: service.to_string(),
                endpoint: endpoint.to_string(),
            });
        }
        let code = response
            .body
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("error")
            .to_string();
        let message = response
            .body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("endpoint call failed")
            .to_string();
        Err(CallError::Endpoint {
            status: response.status,
            code,
            message,
        })
    }

    /// Typed variant of [`ServiceClient::call`]: the request struct is
    /// serialized into the argument object and the response body is
    /// deserialized into `Resp`.
    pub fn call_typed<Req, Resp>(
        &self,
        service: &str,
        endpoint: &str,
        request: &Req,
        auth: AuthContext,
    ) -> Result<Resp, CallError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let args = serde_json::to_value(request).map_err(|e| CallError::Encode(e.to_string()))?;
        let body = self.call(service, endpoint, args, auth)?;
        serde_json::from_value(body).map_err(|e| CallError::Decode(e.to_string()))
    }
}

/// Lower a call's argument object into the request parts the shared dispatch
/// pipeline consumes: declared path/query/header fields move into their
/// slots (stringified, to be re-coerced by the binder exactly as HTTP values
/// are), everything left over becomes the body object.
fn lower_args(
    endpoint: &Endpoint,
    args: Value,
) -> Result<(ParamVec, ParamVec, HeaderVec, Option<Value>), CallError> {
    if endpoint.descriptor.raw {
        let body = if args.is_null() { None } else { Some(args) };
        return Ok((ParamVec::new(), ParamVec::new(), HeaderVec::new(), body));
    }

    let mut rest = match args {
        Value::Null => serde_json::Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(BindError::SchemaValidation(format!(
                "arguments must be a JSON object, got {}",
                json_kind(&other)
            ))
            .into());
        }
    };

    let plan = &endpoint.plan;
    let mut path_params = ParamVec::new();
    let mut query_params = ParamVec::new();
    let mut headers = HeaderVec::new();

    for field in &plan.path {
        let value = rest.remove(field.name.as_ref()).ok_or_else(|| {
            BindError::PathMismatch(format!("missing path parameter `{}`", field.name))
        })?;
        path_params.push((Arc::clone(&field.name), lower_scalar(&value, field.name.as_ref(), ParamLocation::Path, field.ty.name())?));
    }
    for field in &plan.query {
        if let Some(value) = rest.remove(field.name.as_ref()) {
            query_params.push((
                Arc::clone(&field.name),
                lower_scalar(&value, field.name.as_ref(), ParamLocation::Query, field.ty.name())?,
            ));
        }
    }
    for field in &plan.header {
        if let Some(value) = rest.remove(field.name.as_ref()) {
            headers.push((
                Arc::clone(&field.name),
                lower_scalar(&value, field.name.as_ref(), ParamLocation::Header, field.ty.name())?,
            ));
        }
    }

    // Unknown argument fields stay in `rest` and are rejected by the binder
    // the same way an unknown HTTP body field would be.
    let body = if rest.is_empty() {
        None
    } else {
        Some(Value::Object(rest))
    };
    Ok((path_params, query_params, headers, body))
}

fn lower_scalar(
    value: &Value,
    field: &str,
    location: ParamLocation,
    expected: &'static str,
) -> Result<String, CallError> {
    scalar_to_string(value).ok_or_else(|| {
        BindError::TypeCoercion {
            field: field.to_string(),
            location,
            value: value.to_string(),
            expected,
        }
        .into()
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Substitute the lowered path parameters back into the template, giving the
/// dispatch a concrete path for logging parity with HTTP traffic.
fn render_path(endpoint: &Endpoint, path_params: &ParamVec) -> String {
    if endpoint.segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in &endpoint.segments {
        out.push('/');
        match segment {
            Segment::Literal(lit) => out.push_str(lit),
            Segment::Param(name) => {
                let value = path_params
                    .iter()
                    .find(|(k, _)| k.as_ref() == name.as_ref())
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("-");
                out.push_str(value);
            }
        }
    }
    out
}
