//! # Typed Module
//!
//! Type-safe handlers on top of the raw dispatch layer.
//!
//! A typed handler declares a request struct that deserializes from the
//! bound parameter object and a serializable response struct:
//!
//! ```rust
//! use apilane::typed::{Handler, TypedRequest};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct HelloRequest {
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct HelloResponse {
//!     message: String,
//! }
//!
//! struct SayHello;
//!
//! impl Handler for SayHello {
//!     type Request = HelloRequest;
//!     type Response = HelloResponse;
//!
//!     fn handle(&self, req: TypedRequest<HelloRequest>) -> HelloResponse {
//!         HelloResponse {
//!             message: format!("Hello {}!", req.data.name),
//!         }
//!     }
//! }
//! ```
//!
//! Because the binder runs first, the handler never sees a missing or
//! mistyped field; the deserialization here is a formality that also gives
//! handlers ordinary Rust structs to work with.

mod core;

pub use core::{spawn_typed, Handler, TypedRequest};
