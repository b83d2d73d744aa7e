use crate::dispatcher::HandlerResponse;
use may_minihttp::Response;
use serde_json::Value;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// Serialize a handler response onto the wire.
pub fn write_handler_response(res: &mut Response, hr: &HandlerResponse) {
    res.status_code(hr.status as usize, status_reason(hr.status));
    let mut has_content_type = false;
    for (name, value) in &hr.headers {
        if name.eq_ignore_ascii_case("content-type") {
            has_content_type = true;
        }
        let header = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(header));
    }
    if !has_content_type {
        res.header("Content-Type: application/json");
    }
    match &hr.body {
        Value::Null => {}
        body => {
            res.body_vec(serde_json::to_vec(body).unwrap_or_default());
        }
    }
}

/// Write a structured error body directly, for failures that happen before
/// or after dispatch.
pub fn write_json_error(res: &mut Response, status: u16, code: &str, message: &str) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: application/json");
    let body = serde_json::json!({ "code": code, "message": message });
    res.body_vec(body.to_string().into_bytes());
}
