//! # Client Module
//!
//! The in-process service client: registered endpoints of other services as
//! plain callable functions.
//!
//! When caller and callee are colocated in one process there is no reason to
//! pay for HTTP. [`ServiceClient`] resolves the target endpoint by name in
//! the frozen route table and pushes the call through the same dispatch
//! pipeline the HTTP boundary uses, so exposure, authentication, and binding
//! behave identically - only the transport and serialization are skipped.
//! The caller's [`AuthContext`](crate::auth::AuthContext) propagates to the
//! callee unchanged.
//!
//! ```rust,ignore
//! let client = ServiceClient::new(table, dispatcher);
//! let post: PostResponse =
//!     client.call_typed("blog", "get_post", &GetPost { id: 42 }, auth)?;
//! ```

mod core;

pub use core::{CallError, ServiceClient};
