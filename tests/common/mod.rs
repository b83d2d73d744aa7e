//! Shared fixture: a small multi-service API exercising every binding and
//! auth shape, registered the way a real service would do it at startup.
#![allow(dead_code)]

use apilane::auth::BearerAuth;
use apilane::dispatcher::{
    DispatchInput, Dispatcher, HandlerResponse, HeaderVec, RequestOrigin,
};
use apilane::ids::RequestId;
use apilane::registry::{
    ApiSchema, EndpointDescriptor, EndpointRegistry, FieldSpec, FieldType,
};
use apilane::router::RouteTable;
use apilane::server::request::parse_query_params;
use apilane::typed::{Handler, TypedRequest};
use base64::{engine::general_purpose, Engine as _};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};

/// Signature the fixture's [`BearerAuth`] handler accepts.
pub const BEARER_SIG: &str = "test_signature";

pub fn set_stack_size() {
    may::config().set_stack_size(0x8000);
}

/// Mint a bearer token the fixture auth handler will accept.
pub fn bearer_token(claims: &Value) -> String {
    let payload = general_purpose::STANDARD.encode(claims.to_string());
    format!("hdr.{payload}.{BEARER_SIG}")
}

/// A token with a wrong signature, rejected by the fixture auth handler.
pub fn bad_token() -> String {
    let payload = general_purpose::STANDARD.encode(json!({"sub": "intruder"}).to_string());
    format!("hdr.{payload}.wrong_signature")
}

#[derive(Debug, Deserialize)]
struct HelloRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct HelloResponse {
    message: String,
}

struct SayHello;

impl Handler for SayHello {
    type Request = HelloRequest;
    type Response = HelloResponse;

    fn handle(&self, req: TypedRequest<HelloRequest>) -> HelloResponse {
        HelloResponse {
            message: format!("Hello {}!", req.data.name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetPostRequest {
    id: i64,
}

#[derive(Debug, Serialize)]
struct PostResponse {
    id: i64,
    title: String,
}

struct GetPost;

impl Handler for GetPost {
    type Request = GetPostRequest;
    type Response = PostResponse;

    fn handle(&self, req: TypedRequest<GetPostRequest>) -> PostResponse {
        PostResponse {
            id: req.data.id,
            title: format!("Post #{}", req.data.id),
        }
    }
}

pub struct Demo {
    pub table: Arc<RouteTable>,
    pub dispatcher: Arc<RwLock<Dispatcher>>,
}

/// Build the fixture service.
///
/// | endpoint | route | shape |
/// |---|---|---|
/// | `hello.say_hello` | `POST /hello` | public, body field `name` |
/// | `blog.get_post` | `GET /blog/:id` | public, integer path param |
/// | `blog.list_posts` | `GET /blog` | public, optional integer query `limit` |
/// | `secure.whoami` | `GET /whoami` | public, auth required, no schema |
/// | `secure.update_profile` | `POST /profile` | public, auth required, body field `name` |
/// | `vault.read_secret` | `GET /vault/secret` | private |
/// | `echo.raw_echo` | `POST /echo` | public, raw mode |
/// | `boom.explode` | `GET /boom` | public, handler panics |
pub fn demo_service(with_auth: bool) -> Demo {
    set_stack_size();

    let mut registry = EndpointRegistry::new();
    registry
        .register(
            EndpointDescriptor::builder("hello", "say_hello")
                .post("/hello")
                .expose()
                .schema(ApiSchema::new().field(FieldSpec::new("name", FieldType::String)))
                .build(),
        )
        .expect("register hello.say_hello");
    registry
        .register(
            EndpointDescriptor::builder("blog", "get_post")
                .get("/blog/:id")
                .expose()
                .schema(ApiSchema::new().field(FieldSpec::new("id", FieldType::Integer)))
                .build(),
        )
        .expect("register blog.get_post");
    registry
        .register(
            EndpointDescriptor::builder("blog", "list_posts")
                .get("/blog")
                .expose()
                .schema(
                    ApiSchema::new()
                        .field(FieldSpec::new("limit", FieldType::Integer).query().optional()),
                )
                .build(),
        )
        .expect("register blog.list_posts");
    registry
        .register(
            EndpointDescriptor::builder("secure", "whoami")
                .get("/whoami")
                .expose()
                .require_auth()
                .build(),
        )
        .expect("register secure.whoami");
    registry
        .register(
            EndpointDescriptor::builder("secure", "update_profile")
                .post("/profile")
                .expose()
                .require_auth()
                .schema(ApiSchema::new().field(FieldSpec::new("name", FieldType::String)))
                .build(),
        )
        .expect("register secure.update_profile");
    registry
        .register(
            EndpointDescriptor::builder("vault", "read_secret")
                .get("/vault/secret")
                .build(),
        )
        .expect("register vault.read_secret");
    registry
        .register(
            EndpointDescriptor::builder("echo", "raw_echo")
                .post("/echo")
                .expose()
                .raw()
                .build(),
        )
        .expect("register echo.raw_echo");
    registry
        .register(
            EndpointDescriptor::builder("boom", "explode")
                .get("/boom")
                .expose()
                .build(),
        )
        .expect("register boom.explode");

    let table = registry.freeze();
    let mut dispatcher = Dispatcher::new();
    if with_auth {
        dispatcher.set_auth_handler(Arc::new(BearerAuth::new(BEARER_SIG)));
    }

    let endpoint = |service: &str, name: &str| {
        Arc::clone(table.endpoint(service, name).expect("endpoint registered"))
    };

    unsafe {
        dispatcher.register_typed(&endpoint("hello", "say_hello"), SayHello);
        dispatcher.register_typed(&endpoint("blog", "get_post"), GetPost);
        dispatcher.register_handler(&endpoint("blog", "list_posts"), |req| {
            let limit = req.params["limit"].as_i64().unwrap_or(10);
            req.reply_json(&json!({ "count": limit }));
        });
        dispatcher.register_handler(&endpoint("secure", "whoami"), |req| {
            req.reply_json(&json!({ "subject": req.auth.subject() }));
        });
        dispatcher.register_handler(&endpoint("secure", "update_profile"), |req| {
            req.reply_json(&json!({ "updated": req.params["name"] }));
        });
        dispatcher.register_handler(&endpoint("vault", "read_secret"), |req| {
            req.reply_json(&json!({ "secret": "s3cr3t" }));
        });
        dispatcher.register_handler(&endpoint("echo", "raw_echo"), |req| {
            req.reply_json(&json!({ "received": req.body }));
        });
        dispatcher.register_handler(&endpoint("boom", "explode"), |_req| {
            panic!("boom");
        });
    }

    Demo {
        table,
        dispatcher: Arc::new(RwLock::new(dispatcher)),
    }
}

/// Run one simulated external request through lookup + dispatch, the way the
/// HTTP boundary does. `None` means no route matched (a 404 on the wire).
pub fn dispatch_http(
    demo: &Demo,
    method: Method,
    path_and_query: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> Option<HandlerResponse> {
    let path = path_and_query
        .split('?')
        .next()
        .unwrap_or("/")
        .to_string();
    let matched = demo.table.lookup(&method, &path)?;

    let mut header_vec = HeaderVec::new();
    for (name, value) in headers {
        header_vec.push((Arc::from(name.to_ascii_lowercase().as_str()), value.to_string()));
    }

    let input = DispatchInput {
        origin: RequestOrigin::External,
        request_id: RequestId::new(),
        path,
        path_params: matched.path_params,
        query_params: parse_query_params(path_and_query),
        headers: header_vec,
        cookies: HeaderVec::new(),
        body,
        auth: None,
    };
    let dispatcher = demo.dispatcher.read().unwrap();
    Some(dispatcher.dispatch(&matched.endpoint, input))
}
