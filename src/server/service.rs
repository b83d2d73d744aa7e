use super::request::parse_request;
use super::response::{write_handler_response, write_json_error};
use crate::dispatcher::{DispatchInput, Dispatcher, RequestOrigin};
use crate::ids::RequestId;
use crate::router::RouteTable;
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::{Arc, RwLock};
use tracing::error;

/// The HTTP boundary: glues request parsing, route lookup, dispatch, and
/// response serialization together.
///
/// Every request arriving here is `External` by definition; private
/// endpoints are unreachable through this service no matter what
/// credentials the caller presents.
#[derive(Clone)]
pub struct AppService {
    pub table: Arc<RouteTable>,
    pub dispatcher: Arc<RwLock<Dispatcher>>,
}

impl AppService {
    #[must_use]
    pub fn new(table: Arc<RouteTable>, dispatcher: Arc<RwLock<Dispatcher>>) -> Self {
        Self { table, dispatcher }
    }
}

/// Basic health check endpoint returning `{ "status": "ok" }`.
pub fn health_endpoint(res: &mut Response) -> io::Result<()> {
    res.status_code(200, "OK");
    res.header("Content-Type: application/json");
    res.body_vec(br#"{"status":"ok"}"#.to_vec());
    Ok(())
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = parse_request(req);

        if parsed.method == "GET" && parsed.path == "/health" {
            return health_endpoint(res);
        }

        let method: Method = match parsed.method.parse() {
            Ok(m) => m,
            Err(_) => {
                write_json_error(res, 400, "bad_request", "unrecognized HTTP method");
                return Ok(());
            }
        };

        let Some(matched) = self.table.lookup(&method, &parsed.path) else {
            write_json_error(
                res,
                404,
                "not_found",
                &format!("no endpoint matches {} {}", parsed.method, parsed.path),
            );
            return Ok(());
        };

        let request_id = RequestId::from_header_or_new(parsed.get_header("x-request-id"));
        let input = DispatchInput {
            origin: RequestOrigin::External,
            request_id,
            path: parsed.path,
            path_params: matched.path_params,
            query_params: parsed.query_params,
            headers: parsed.headers,
            cookies: parsed.cookies,
            body: parsed.body,
            auth: None,
        };

        let response = {
            let dispatcher = self.dispatcher.read().unwrap();
            dispatcher.dispatch(&matched.endpoint, input)
        };

        // A successful response must honor the endpoint's declared response
        // schema; a violation is the server's fault, not the client's.
        if response.status < 400 {
            if let Some(validator) = &matched.endpoint.response_validator {
                if let Err(errors) = validator.validate(&response.body) {
                    let details: Vec<String> = errors.map(|e| e.to_string()).collect();
                    error!(
                        request_id = %request_id,
                        endpoint = %matched.endpoint.handler_id(),
                        details = ?details,
                        "Response violates declared schema"
                    );
                    write_json_error(res, 500, "internal", "response validation failed");
                    return Ok(());
                }
            }
        }

        write_handler_response(res, &response);
        Ok(())
    }
}
