//! # Server Module
//!
//! The HTTP boundary on top of `may_minihttp`: raw requests are parsed into
//! headers/cookies/query/body, matched against the frozen route table, and
//! pushed through the dispatcher; the handler response (or the pipeline's
//! error response) is serialized back onto the wire as JSON.
//!
//! Requests entering here are external by definition - exposure enforcement
//! for private endpoints happens in the dispatcher based on that origin.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, ParsedRequest};
pub use service::{health_endpoint, AppService};
