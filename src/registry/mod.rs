//! # Registry Module
//!
//! Declarative endpoint registration: immutable [`EndpointDescriptor`]s are
//! produced by a builder, collected into a process-wide [`EndpointRegistry`]
//! during an explicit initialization phase, and frozen into the read-only
//! [`RouteTable`](crate::router::RouteTable) the dispatcher serves from.
//!
//! ## Lifecycle
//!
//! 1. **Declare** - each endpoint is described by a descriptor: service name,
//!    endpoint name, method, path template, exposure, auth requirement, and
//!    the structural request schema.
//! 2. **Register** - `register()` validates the descriptor (duplicate keys,
//!    unbound path parameters, body fields on bodyless methods) and computes
//!    its binding plan once.
//! 3. **Freeze** - `freeze()` consumes the registry and compiles the route
//!    table. Registration strictly precedes serving; there is no concurrent
//!    registration.
//!
//! ## Example
//!
//! ```rust
//! use apilane::registry::{ApiSchema, EndpointDescriptor, EndpointRegistry, FieldSpec, FieldType};
//!
//! let mut registry = EndpointRegistry::new();
//! registry.register(
//!     EndpointDescriptor::builder("blog", "get_post")
//!         .get("/blog/:id")
//!         .expose()
//!         .schema(ApiSchema::new().field(FieldSpec::new("id", FieldType::Integer)))
//!         .build(),
//! )?;
//! let table = registry.freeze();
//! # Ok::<(), apilane::registry::RegistryError>(())
//! ```

mod core;
mod descriptor;

pub use core::{Endpoint, EndpointRegistry, RegistryError};
pub use descriptor::{
    ApiSchema, EndpointBuilder, EndpointDescriptor, Exposure, FieldMarker, FieldSpec, FieldType,
};
