use crate::dispatcher::HeaderVec;
use crate::registry::{
    Endpoint, EndpointDescriptor, FieldMarker, FieldType, RegistryError,
};
use crate::router::{ParamVec, Segment};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Where a bound field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

impl std::fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Body => "body",
        };
        f.write_str(s)
    }
}

/// One classified schema field.
#[derive(Debug, Clone)]
pub struct PlanField {
    pub name: Arc<str>,
    pub ty: FieldType,
    pub required: bool,
}

/// Classification of every schema field into exactly one source, computed
/// once per descriptor at registration time.
///
/// A field is a path parameter iff its name matches a `:name` placeholder in
/// the template; fields carrying a query/header marker come from those
/// sources; everything else is a body field, which is only legal on methods
/// that carry a body.
#[derive(Debug, Clone, Default)]
pub struct BindingPlan {
    pub path: Vec<PlanField>,
    pub query: Vec<PlanField>,
    pub header: Vec<PlanField>,
    pub body: Vec<PlanField>,
}

impl BindingPlan {
    pub(crate) fn for_descriptor(
        descriptor: &EndpointDescriptor,
        segments: &[Segment],
    ) -> Result<Self, RegistryError> {
        let id = descriptor.handler_id();
        let placeholders: Vec<&Arc<str>> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name),
                Segment::Literal(_) => None,
            })
            .collect();

        let mut plan = BindingPlan::default();
        let fields = descriptor
            .schema
            .as_ref()
            .map(|s| s.fields.as_slice())
            .unwrap_or_default();

        let mut seen = std::collections::HashSet::new();
        for field in fields {
            if !seen.insert(field.name.to_string()) {
                return Err(RegistryError::DuplicateField {
                    id,
                    name: field.name.to_string(),
                });
            }
            let plan_field = PlanField {
                name: Arc::clone(&field.name),
                ty: field.ty,
                required: field.required,
            };
            if placeholders.iter().any(|p| p.as_ref() == field.name.as_ref()) {
                if field.marker.is_some() {
                    return Err(RegistryError::ConflictingField {
                        id,
                        name: field.name.to_string(),
                    });
                }
                if !field.required {
                    return Err(RegistryError::OptionalPathParam {
                        id,
                        name: field.name.to_string(),
                    });
                }
                plan.path.push(plan_field);
            } else {
                match field.marker {
                    Some(FieldMarker::Query) => plan.query.push(plan_field),
                    Some(FieldMarker::Header) => plan.header.push(plan_field),
                    None => {
                        if !descriptor.allows_body() {
                            return Err(RegistryError::BodyFieldNotAllowed {
                                id,
                                name: field.name.to_string(),
                                method: descriptor.method.clone(),
                            });
                        }
                        plan.body.push(plan_field);
                    }
                }
            }
        }

        // Placeholders and path-bound fields must correspond one-to-one.
        // Raw endpoints are exempt: they read path params unbound.
        if !descriptor.raw {
            for placeholder in &placeholders {
                if !plan.path.iter().any(|f| f.name.as_ref() == placeholder.as_ref()) {
                    return Err(RegistryError::UnboundPathParam {
                        id,
                        name: placeholder.to_string(),
                    });
                }
            }
        }

        Ok(plan)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
            && self.query.is_empty()
            && self.header.is_empty()
            && self.body.is_empty()
    }
}

/// Binding failures. All surface as 400-class responses at the dispatcher
/// boundary and never reach a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("path does not match template: {0}")]
    PathMismatch(String),
    #[error("cannot coerce {location} parameter `{field}` value `{value}` to {expected}")]
    TypeCoercion {
        field: String,
        location: ParamLocation,
        value: String,
        expected: &'static str,
    },
    #[error("request does not match the declared schema: {0}")]
    SchemaValidation(String),
}

impl BindError {
    #[must_use]
    pub fn status(&self) -> u16 {
        400
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            BindError::PathMismatch(_) => "path_mismatch",
            BindError::TypeCoercion { .. } => "type_coercion",
            BindError::SchemaValidation(_) => "schema_validation",
        }
    }
}

/// The raw material binding works from, borrowed from the parsed request.
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    pub path_params: &'a ParamVec,
    pub query_params: &'a ParamVec,
    pub headers: &'a HeaderVec,
    pub body: Option<&'a Value>,
}

/// Bind a raw request to the endpoint's typed parameter object.
///
/// Binding is all-or-nothing: on success every declared field is present
/// (or deliberately omitted as optional) with its declared type; on failure
/// nothing is produced. The function is pure, so binding the same parts
/// twice yields equal values.
pub fn bind(endpoint: &Endpoint, parts: &RequestParts<'_>) -> Result<Value, BindError> {
    let plan = &endpoint.plan;
    let mut out = Map::new();

    for field in &plan.path {
        let raw = parts
            .path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == field.name.as_ref())
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| {
                BindError::PathMismatch(format!("missing path parameter `{}`", field.name))
            })?;
        out.insert(
            field.name.to_string(),
            coerce_scalar(raw, field, ParamLocation::Path)?,
        );
    }

    for field in &plan.query {
        let raw = parts
            .query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == field.name.as_ref())
            .map(|(_, v)| v.as_str());
        match raw {
            Some(raw) => {
                out.insert(
                    field.name.to_string(),
                    coerce_scalar(raw, field, ParamLocation::Query)?,
                );
            }
            None if field.required => {
                return Err(BindError::SchemaValidation(format!(
                    "missing required query parameter `{}`",
                    field.name
                )));
            }
            None => {}
        }
    }

    for field in &plan.header {
        let raw = parts
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&field.name))
            .map(|(_, v)| v.as_str());
        match raw {
            Some(raw) => {
                out.insert(
                    field.name.to_string(),
                    coerce_scalar(raw, field, ParamLocation::Header)?,
                );
            }
            None if field.required => {
                return Err(BindError::SchemaValidation(format!(
                    "missing required header `{}`",
                    field.name
                )));
            }
            None => {}
        }
    }

    bind_body(endpoint, parts.body, &mut out)?;

    if let Some(validator) = &endpoint.body_validator {
        let body = parts.body.unwrap_or(&Value::Null);
        if let Err(errors) = validator.validate(body) {
            let details: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(BindError::SchemaValidation(details.join("; ")));
        }
    }

    Ok(Value::Object(out))
}

fn bind_body(
    endpoint: &Endpoint,
    body: Option<&Value>,
    out: &mut Map<String, Value>,
) -> Result<(), BindError> {
    let plan = &endpoint.plan;
    if plan.body.is_empty() {
        // Strict contract: a body nobody declared is a schema violation.
        if body.is_some_and(|b| !b.is_null()) {
            return Err(BindError::SchemaValidation(
                "unexpected request body".to_string(),
            ));
        }
        return Ok(());
    }

    let body = match body {
        Some(value) if !value.is_null() => value,
        _ => {
            if let Some(missing) = plan.body.iter().find(|f| f.required) {
                return Err(BindError::SchemaValidation(format!(
                    "missing request body (required field `{}`)",
                    missing.name
                )));
            }
            return Ok(());
        }
    };

    let obj = body.as_object().ok_or_else(|| {
        BindError::SchemaValidation("request body must be a JSON object".to_string())
    })?;

    for key in obj.keys() {
        if !plan.body.iter().any(|f| f.name.as_ref() == key.as_str()) {
            return Err(BindError::SchemaValidation(format!(
                "unknown body field `{key}`"
            )));
        }
    }

    for field in &plan.body {
        match obj.get(field.name.as_ref()) {
            Some(value) => {
                if !json_type_matches(value, field.ty) {
                    return Err(BindError::SchemaValidation(format!(
                        "body field `{}` must be a {}",
                        field.name, field.ty
                    )));
                }
                out.insert(field.name.to_string(), value.clone());
            }
            None if field.required => {
                return Err(BindError::SchemaValidation(format!(
                    "missing required body field `{}`",
                    field.name
                )));
            }
            None => {}
        }
    }
    Ok(())
}

/// Coerce a string-sourced parameter into its declared type.
///
/// Unlike permissive decoders that fall back to the raw string, a parse
/// failure here is a hard `TypeCoercion` error: binding guarantees handlers
/// never see a mistyped field.
fn coerce_scalar(
    raw: &str,
    field: &PlanField,
    location: ParamLocation,
) -> Result<Value, BindError> {
    let mismatch = || BindError::TypeCoercion {
        field: field.name.to_string(),
        location,
        value: raw.to_string(),
        expected: field.ty.name(),
    };
    match field.ty {
        FieldType::String => Ok(Value::String(raw.to_string())),
        FieldType::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| mismatch()),
        FieldType::Number => raw
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| mismatch()),
        FieldType::Boolean => raw
            .parse::<bool>()
            .map(Value::from)
            .map_err(|_| mismatch()),
    }
}

fn json_type_matches(value: &Value, ty: FieldType) -> bool {
    match ty {
        FieldType::String => value.is_string(),
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
    }
}

/// Render a value back into the string form a path/query/header slot carries.
///
/// Used by the internal client to lower an argument object into request
/// parts; only scalars have a string form.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
