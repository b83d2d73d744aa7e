use crate::dispatcher::HeaderVec;
use crate::router::ParamVec;
use may_minihttp::Request;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Parsed HTTP request data used by [`AppService`](super::AppService).
#[derive(Debug)]
pub struct ParsedRequest {
    /// HTTP method as received.
    pub method: String,
    /// Request path without the query string.
    pub path: String,
    /// Headers with lowercase names.
    pub headers: HeaderVec,
    /// Cookies parsed from the `Cookie` header.
    pub cookies: HeaderVec,
    /// Decoded query string parameters.
    pub query_params: ParamVec,
    /// Request body parsed as JSON, when present and parseable.
    pub body: Option<serde_json::Value>,
}

impl ParsedRequest {
    /// Get a header by name (names are stored lowercase).
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Split the `Cookie` header into name/value pairs.
pub fn parse_cookies(headers: &HeaderVec) -> HeaderVec {
    let mut cookies = HeaderVec::new();
    let Some(raw) = headers
        .iter()
        .find(|(k, _)| k.as_ref() == "cookie")
        .map(|(_, v)| v.as_str())
    else {
        return cookies;
    };
    for pair in raw.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let Some(name) = parts.next().filter(|n| !n.is_empty()) else {
            continue;
        };
        let value = parts.next().unwrap_or("").trim().to_string();
        cookies.push((Arc::from(name.trim()), value));
    }
    cookies
}

/// Decode the query string portion of a request path.
pub fn parse_query_params(raw_path: &str) -> ParamVec {
    let mut params = ParamVec::new();
    if let Some(pos) = raw_path.find('?') {
        let query_str = &raw_path[pos + 1..];
        for (k, v) in url::form_urlencoded::parse(query_str.as_bytes()) {
            params.push((Arc::from(k.as_ref()), v.to_string()));
        }
    }
    params
}

/// Extract method, path, headers, cookies, query parameters, and JSON body
/// from a raw `may_minihttp` request.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let mut headers = HeaderVec::new();
    for h in req.headers() {
        headers.push((
            Arc::from(h.name.to_ascii_lowercase().as_str()),
            String::from_utf8_lossy(h.value).to_string(),
        ));
    }

    let cookies = parse_cookies(&headers);
    let query_params = parse_query_params(&raw_path);

    let body = {
        let mut body_str = String::new();
        match req.body().read_to_string(&mut body_str) {
            Ok(size) if size > 0 => match serde_json::from_str(&body_str) {
                Ok(json) => Some(json),
                Err(e) => {
                    debug!(error = %e, size, "Request body is not valid JSON");
                    None
                }
            },
            _ => None,
        }
    };

    debug!(
        method = %method,
        path = %path,
        headers = headers.len(),
        cookies = cookies.len(),
        query_params = query_params.len(),
        has_body = body.is_some(),
        "HTTP request parsed"
    );

    ParsedRequest {
        method,
        path,
        headers,
        cookies,
        query_params,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cookie_header() {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("cookie"), "a=b; session=xyz".to_string()));
        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].0.as_ref(), "a");
        assert_eq!(cookies[0].1, "b");
        assert_eq!(cookies[1].0.as_ref(), "session");
        assert_eq!(cookies[1].1, "xyz");
    }

    #[test]
    fn parses_and_decodes_query_params() {
        let params = parse_query_params("/posts?limit=10&tag=a%20b");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].1, "10");
        assert_eq!(params[1].1, "a b");
    }

    #[test]
    fn no_query_string_yields_empty_params() {
        assert!(parse_query_params("/posts").is_empty());
    }
}
