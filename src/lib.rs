//! # apilane
//!
//! **apilane** is a declarative endpoint registry and typed request
//! dispatcher for coroutine-based Rust services, built on the `may` runtime
//! and `may_minihttp`.
//!
//! ## Overview
//!
//! Endpoints are declared in code as immutable descriptors - service name,
//! endpoint name, method, `:name` path template, exposure, auth requirement,
//! and a structural request schema. Descriptors are collected into a
//! process-wide registry during an explicit initialization phase and frozen
//! into a read-only route table before the first request is served. From
//! then on, every request (HTTP or in-process) runs the same pipeline:
//! route match, exposure check, optional authentication, all-or-nothing
//! parameter binding, handler invocation, response serialization.
//!
//! ## Architecture
//!
//! - **[`registry`]** - descriptor builder, registration, write-then-freeze
//!   lifecycle
//! - **[`router`]** - path template matching over the frozen table
//! - **[`binder`]** - field classification and typed parameter binding
//! - **[`dispatcher`]** - coroutine-based dispatch with the per-request
//!   pipeline
//! - **[`auth`]** - pluggable authentication handler and bundled providers
//! - **[`typed`]** - type-safe handler trait over bound parameters
//! - **[`client`]** - in-process calls to registered endpoints of other
//!   services, bypassing transport but not semantics
//! - **[`server`]** - HTTP boundary on `may_minihttp`
//! - **[`worker_pool`]** - parallel handler execution per endpoint
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apilane::dispatcher::Dispatcher;
//! use apilane::registry::{ApiSchema, EndpointDescriptor, EndpointRegistry, FieldSpec, FieldType};
//! use apilane::server::{AppService, HttpServer};
//! use std::sync::{Arc, RwLock};
//!
//! let mut registry = EndpointRegistry::new();
//! registry.register(
//!     EndpointDescriptor::builder("hello", "say_hello")
//!         .post("/hello")
//!         .expose()
//!         .schema(ApiSchema::new().field(FieldSpec::new("name", FieldType::String)))
//!         .build(),
//! ).expect("register endpoint");
//! let table = registry.freeze();
//!
//! let mut dispatcher = Dispatcher::new();
//! let endpoint = table.endpoint("hello", "say_hello").expect("registered").clone();
//! unsafe {
//!     dispatcher.register_handler(&endpoint, |req| {
//!         let name = req.params["name"].as_str().unwrap_or("world").to_string();
//!         req.reply_json(&serde_json::json!({ "message": format!("Hello {name}!") }));
//!     });
//! }
//!
//! let service = AppService::new(table, Arc::new(RwLock::new(dispatcher)));
//! let handle = HttpServer(service).start("0.0.0.0:8080").expect("bind");
//! handle.join().expect("server");
//! ```
//!
//! ## Runtime Considerations
//!
//! apilane uses the `may` coroutine runtime, not tokio. Handlers run in
//! coroutines fed over channels; stack size is configured with
//! `APILANE_STACK_SIZE` and should be applied (via
//! [`runtime_config::RuntimeConfig::apply`]) before handlers are
//! registered. Blocking operations inside handlers should use `may`'s
//! blocking facilities.

pub mod auth;
pub mod binder;
pub mod client;
pub mod dispatcher;
pub mod ids;
pub mod registry;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod typed;
pub mod worker_pool;

pub use auth::{AuthContext, AuthError, AuthHandler, AuthRequest};
pub use binder::BindError;
pub use client::{CallError, ServiceClient};
pub use dispatcher::{Dispatcher, HandlerRequest, HandlerResponse, RequestOrigin};
pub use registry::{
    ApiSchema, EndpointDescriptor, EndpointRegistry, Exposure, FieldSpec, FieldType, RegistryError,
};
pub use router::RouteTable;
