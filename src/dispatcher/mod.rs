//! # Dispatcher Module
//!
//! Coroutine-based request dispatch.
//!
//! Every request, whether it arrived over HTTP or through the in-process
//! client, runs the same pipeline:
//!
//! ```text
//! received -> matched -> (authenticating) -> bound -> invoking -> responding
//! ```
//!
//! with short-circuits to an error response from any stage: 403 when a
//! private endpoint is hit externally, 401 when required authentication
//! fails (before binding is attempted), 400 when binding rejects the
//! request, and an opaque 500 when the handler itself faults. Recoverable
//! errors are converted to structured `{code, message}` responses at this
//! boundary and never reach a handler.
//!
//! Handlers run in `may` coroutines fed over MPSC channels: one coroutine
//! per endpoint via [`Dispatcher::register_handler`], or a worker pool via
//! [`Dispatcher::register_handler_with_pool`] when one endpoint needs
//! parallel execution. Handler panics are caught and answered with an
//! opaque 500; the process keeps serving.

mod core;

pub use core::{
    DispatchInput, Dispatcher, HandlerRequest, HandlerResponse, HandlerSender, HeaderVec,
    RequestOrigin, MAX_INLINE_HEADERS,
};
pub(crate) use core::run_handler;
