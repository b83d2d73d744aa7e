//! # Router Module
//!
//! Path matching over the frozen route table. Templates use `:name`
//! placeholders (`/blog/:id`) and are compiled to regexes once, when
//! [`EndpointRegistry::freeze`](crate::registry::EndpointRegistry::freeze)
//! builds the table; matching a request is a scan over compiled patterns with
//! parameter capture.
//!
//! The table also serves name-based lookup (`service`, `endpoint`) for the
//! in-process client, which never touches paths.

mod core;

pub(crate) use core::{parse_template, Segment};
pub use core::{EndpointMatch, ParamVec, RouteTable, MAX_INLINE_PARAMS};
