//! # Binder Module
//!
//! Converts raw requests into fully-typed parameter objects.
//!
//! Each registered endpoint carries a [`BindingPlan`]: every declared schema
//! field classified into exactly one of path / query / header / body, derived
//! once at registration time from the field markers and the path template.
//! [`bind`] then executes the plan per request:
//!
//! 1. path parameters are pulled from the matched route and coerced to their
//!    declared types;
//! 2. query and header fields are extracted by name, with absent optional
//!    fields omitted;
//! 3. the JSON body is validated structurally (unknown fields, missing
//!    required fields, type mismatches) and, when the descriptor attaches
//!    one, against a raw JSON Schema.
//!
//! Binding is all-or-nothing and pure: no partial parameter objects, and the
//! same request always binds to the same value. Failures surface as
//! [`BindError`]s that the dispatcher turns into 400-class responses before
//! any handler runs.

mod core;

pub use core::{bind, BindError, BindingPlan, ParamLocation, PlanField, RequestParts};
pub(crate) use core::scalar_to_string;
