use crate::registry::Endpoint;
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of path/query parameters before heap allocation.
/// Most APIs have well under 8 params per route.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names are `Arc<str>` because they come from the static route table
/// and are cloned per request; values are per-request strings from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One segment of a parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Param(Arc<str>),
}

/// Parse a `:name`-style path template into segments.
///
/// Rejects templates that do not start with `/`, contain empty segments, or
/// declare the same parameter twice.
pub(crate) fn parse_template(path: &str) -> Result<Vec<Segment>, String> {
    if !path.starts_with('/') {
        return Err("path template must start with `/`".to_string());
    }
    if path == "/" {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for raw in path.split('/').skip(1) {
        if raw.is_empty() {
            return Err("empty path segment".to_string());
        }
        if let Some(name) = raw.strip_prefix(':') {
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(format!("invalid path parameter `{raw}`"));
            }
            if !seen.insert(name.to_string()) {
                return Err(format!("duplicate path parameter `:{name}`"));
            }
            segments.push(Segment::Param(Arc::from(name)));
        } else {
            segments.push(Segment::Literal(raw.to_string()));
        }
    }
    Ok(segments)
}

/// Compile parsed template segments into a matching regex plus the ordered
/// parameter names captured by it.
pub(crate) fn template_to_regex(segments: &[Segment]) -> (Regex, Vec<Arc<str>>) {
    if segments.is_empty() {
        #[allow(clippy::expect_used)]
        return (Regex::new("^/$").expect("static regex"), Vec::new());
    }
    let mut pattern = String::with_capacity(segments.len() * 12 + 2);
    pattern.push('^');
    let mut names = Vec::new();
    for segment in segments {
        match segment {
            Segment::Literal(lit) => {
                pattern.push('/');
                pattern.push_str(&regex::escape(lit));
            }
            Segment::Param(name) => {
                pattern.push_str("/([^/]+)");
                names.push(Arc::clone(name));
            }
        }
    }
    pattern.push('$');
    #[allow(clippy::expect_used)]
    let regex = Regex::new(&pattern).expect("template segments compile to a valid regex");
    (regex, names)
}

/// Result of matching an incoming request path against the route table.
#[derive(Debug, Clone)]
pub struct EndpointMatch {
    pub endpoint: Arc<Endpoint>,
    /// Path parameters extracted from the URL, still as raw strings;
    /// coercion happens in the binder.
    pub path_params: ParamVec,
}

/// Read-only routing table produced by
/// [`EndpointRegistry::freeze`](crate::registry::EndpointRegistry::freeze).
///
/// Safe for unsynchronized concurrent reads: it is immutable after
/// construction and registration is strictly ordered before serving.
pub struct RouteTable {
    routes: Vec<(Method, Regex, Arc<Endpoint>, Vec<Arc<str>>)>,
    by_name: HashMap<String, Arc<Endpoint>>,
}

impl RouteTable {
    pub(crate) fn build(endpoints: Vec<Arc<Endpoint>>) -> Arc<Self> {
        let mut routes = Vec::with_capacity(endpoints.len());
        let mut by_name = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let (regex, names) = template_to_regex(&endpoint.segments);
            by_name.insert(endpoint.handler_id().to_string(), Arc::clone(&endpoint));
            routes.push((
                endpoint.descriptor.method.clone(),
                regex,
                endpoint,
                names,
            ));
        }
        info!(routes = routes.len(), "Routing table compiled");
        Arc::new(Self { routes, by_name })
    }

    /// Match an HTTP request against the table.
    ///
    /// Returns `None` when no route matches (a 404 at the HTTP boundary).
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<EndpointMatch> {
        for (route_method, regex, endpoint, names) in &self.routes {
            if route_method != method {
                continue;
            }
            let Some(captures) = regex.captures(path) else {
                continue;
            };
            let mut path_params = ParamVec::new();
            for (idx, name) in names.iter().enumerate() {
                if let Some(value) = captures.get(idx + 1) {
                    path_params.push((Arc::clone(name), value.as_str().to_string()));
                }
            }
            debug!(
                method = %method,
                path = %path,
                endpoint = %endpoint.handler_id(),
                path_params = ?path_params,
                "Route matched"
            );
            return Some(EndpointMatch {
                endpoint: Arc::clone(endpoint),
                path_params,
            });
        }
        warn!(method = %method, path = %path, "No route matched");
        None
    }

    /// Look up an endpoint by `(service, endpoint)` name, as the internal
    /// client does.
    #[must_use]
    pub fn endpoint(&self, service: &str, name: &str) -> Option<&Arc<Endpoint>> {
        self.by_name.get(&format!("{service}.{name}"))
    }

    /// All registered endpoints, in registration order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.routes.iter().map(|(_, _, endpoint, _)| endpoint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Print the routing table, useful at startup.
    pub fn dump_routes(&self) {
        println!("[routes] count={}", self.routes.len());
        for (method, _, endpoint, _) in &self.routes {
            println!(
                "[route] {method} {} -> {}",
                endpoint.descriptor.path,
                endpoint.handler_id()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_root_template() {
        assert!(parse_template("/").unwrap().is_empty());
    }

    #[test]
    fn parses_parameterized_template() {
        let segments = parse_template("/blog/:id/comments").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("blog".into()),
                Segment::Param(Arc::from("id")),
                Segment::Literal("comments".into()),
            ]
        );
    }

    #[test]
    fn rejects_bad_templates() {
        assert!(parse_template("blog/:id").is_err());
        assert!(parse_template("/blog//x").is_err());
        assert!(parse_template("/a/:").is_err());
        assert!(parse_template("/a/:id/b/:id").is_err());
    }

    #[test]
    fn regex_matches_and_captures() {
        let segments = parse_template("/blog/:id").unwrap();
        let (regex, names) = template_to_regex(&segments);
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].as_ref(), "id");
        let caps = regex.captures("/blog/42").unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "42");
        assert!(regex.captures("/blog/42/extra").is_none());
        assert!(regex.captures("/blag/42").is_none());
    }
}
