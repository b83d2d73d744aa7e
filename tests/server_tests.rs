//! End-to-end HTTP tests
//!
//! Starts the real `may_minihttp` server on an ephemeral port and talks to
//! it over raw TCP, asserting on status codes and JSON bodies for the happy
//! path, binding failures, exposure enforcement, and authentication.

mod common;
mod tracing_util;

use apilane::server::{AppService, HttpServer, ServerHandle};
use common::{bearer_token, demo_service};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tracing_util::TestTracing;

struct TestServer {
    _tracing: TestTracing,
    handle: Option<ServerHandle>,
    addr: SocketAddr,
}

impl TestServer {
    fn start(with_auth: bool) -> Self {
        let tracing = TestTracing::init();
        let demo = demo_service(with_auth);
        let service = AppService::new(Arc::clone(&demo.table), Arc::clone(&demo.dispatcher));

        // Reserve an ephemeral port, then hand it to the server.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
        let addr = listener.local_addr().expect("probe addr");
        drop(listener);

        let handle = HttpServer(service).start(addr).expect("start server");
        handle.wait_ready().expect("server ready");
        Self {
            _tracing: tracing,
            handle: Some(handle),
            addr,
        }
    }

    fn request(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> (u16, Value) {
        let mut stream = TcpStream::connect(self.addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set timeout");

        let mut request = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n");
        for (name, value) in headers {
            request.push_str(&format!("{name}: {value}\r\n"));
        }
        if let Some(body) = body {
            request.push_str(&format!(
                "Content-Type: application/json\r\nContent-Length: {}\r\n",
                body.len()
            ));
        }
        request.push_str("Connection: close\r\n\r\n");
        if let Some(body) = body {
            request.push_str(body);
        }
        stream.write_all(request.as_bytes()).expect("write request");

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    if response_complete(&buf) {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        parse_response(&buf)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0)
}

fn response_complete(buf: &[u8]) -> bool {
    let Some(body_start) = header_end(buf) else {
        return false;
    };
    let head = String::from_utf8_lossy(&buf[..body_start]);
    buf.len() >= body_start + content_length(&head)
}

fn parse_response(buf: &[u8]) -> (u16, Value) {
    let body_start = header_end(buf).expect("complete response headers");
    let head = String::from_utf8_lossy(&buf[..body_start]);
    let status: u16 = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .expect("status line");
    let length = content_length(&head);
    let body_bytes = &buf[body_start..body_start + length.min(buf.len() - body_start)];
    let body = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body_bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[test]
fn health_endpoint_responds() {
    let server = TestServer::start(false);
    let (status, body) = server.request("GET", "/health", &[], None);
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[test]
fn hello_scenario_over_http() {
    let server = TestServer::start(false);
    let (status, body) = server.request("POST", "/hello", &[], Some(r#"{"name":"World"}"#));
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "message": "Hello World!" }));
}

#[test]
fn path_params_bind_and_coerce_over_http() {
    let server = TestServer::start(false);

    let (status, body) = server.request("GET", "/blog/42", &[], None);
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "id": 42, "title": "Post #42" }));

    let (status, body) = server.request("GET", "/blog/abc", &[], None);
    assert_eq!(status, 400);
    assert_eq!(body["code"], "type_coercion");
}

#[test]
fn query_params_bind_over_http() {
    let server = TestServer::start(false);
    let (status, body) = server.request("GET", "/blog?limit=4", &[], None);
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "count": 4 }));
}

#[test]
fn unknown_routes_are_404() {
    let server = TestServer::start(false);
    let (status, body) = server.request("GET", "/does/not/exist", &[], None);
    assert_eq!(status, 404);
    assert_eq!(body["code"], "not_found");
}

#[test]
fn private_endpoints_are_403_over_http() {
    let server = TestServer::start(true);
    let token = bearer_token(&json!({ "sub": "admin" }));
    let auth = format!("Bearer {token}");
    let (status, body) = server.request(
        "GET",
        "/vault/secret",
        &[("Authorization", auth.as_str())],
        None,
    );
    assert_eq!(status, 403);
    assert_eq!(body["code"], "forbidden");
}

#[test]
fn auth_is_enforced_over_http() {
    let server = TestServer::start(true);

    let (status, _) = server.request("GET", "/whoami", &[], None);
    assert_eq!(status, 401);

    let token = bearer_token(&json!({ "sub": "u_1" }));
    let auth = format!("Bearer {token}");
    let (status, body) =
        server.request("GET", "/whoami", &[("Authorization", auth.as_str())], None);
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "subject": "u_1" }));
}

#[test]
fn raw_endpoint_echoes_over_http() {
    let server = TestServer::start(false);
    let (status, body) = server.request("POST", "/echo", &[], Some(r#"{"k":[1,2]}"#));
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "received": { "k": [1, 2] } }));
}
