use crate::auth::{AuthContext, AuthHandler, AuthRequest};
use crate::binder::{self, RequestParts};
use crate::ids::RequestId;
use crate::registry::{Endpoint, Exposure};
use crate::router::ParamVec;
use crate::runtime_config;
use crate::worker_pool::{WorkerPool, WorkerPoolConfig};
use http::Method;
use may::coroutine;
use may::sync::mpsc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Maximum inline headers/cookies before heap allocation.
/// Most requests stay under 16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage for the hot path.
///
/// Header names are `Arc<str>` because they repeat across requests
/// (`content-type`, `authorization`, ...); values are per-request strings.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Where a dispatch entered the process.
///
/// Private endpoints reject `External` dispatches with 403 before anything
/// else runs; `Internal` dispatches come from the in-process client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    External,
    Internal,
}

/// Request data delivered to a handler coroutine.
///
/// For typed endpoints, `params` holds the bound parameter object the binder
/// produced; raw endpoints get `Value::Null` there and the unparsed body in
/// `body` instead. The auth context is always attached, empty when the
/// request was not authenticated.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub origin: RequestOrigin,
    pub method: Method,
    pub path: String,
    /// Service the dispatched endpoint belongs to.
    pub service: Arc<str>,
    /// Endpoint name within the service.
    pub endpoint: Arc<str>,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    /// Bound, fully-typed parameter object (`Null` on raw endpoints).
    pub params: Value,
    /// Unparsed JSON body, only populated for raw endpoints.
    pub body: Option<Value>,
    pub auth: AuthContext,
    /// Channel for sending the response back to the dispatcher.
    pub reply_tx: mpsc::Sender<HandlerResponse>,
}

impl HandlerRequest {
    /// Get a path parameter by name. Last write wins on duplicate names.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name. Last write wins on duplicate names.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Deserialize the bound parameter object into a typed struct.
    pub fn deserialize_params<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(self.params.clone())?)
    }

    /// Reply with a 200 JSON body serialized from `value`.
    pub fn reply_json<T: Serialize>(&self, value: &T) {
        let body = serde_json::to_value(value)
            .unwrap_or_else(|_| serde_json::json!({"code": "internal", "message": "serialization failed"}));
        let _ = self.reply_tx.send(HandlerResponse::json(200, body));
    }
}

/// Response data sent back from a handler coroutine.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A JSON response with the content type pre-set.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// A structured error response. Only the code and message reach the
    /// wire; anything else stays in the server logs.
    #[must_use]
    pub fn error(status: u16, code: &str, message: &str) -> Self {
        Self::json(
            status,
            serde_json::json!({ "code": code, "message": message }),
        )
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// Everything the dispatcher needs to run one request through the pipeline.
#[derive(Debug)]
pub struct DispatchInput {
    pub origin: RequestOrigin,
    pub request_id: RequestId,
    pub path: String,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub body: Option<Value>,
    /// Pre-established auth context (internal calls). `None` runs the
    /// authenticating stage against the configured [`AuthHandler`].
    pub auth: Option<AuthContext>,
}

/// Type alias for a channel sender that feeds a handler coroutine.
pub type HandlerSender = mpsc::Sender<HandlerRequest>;

/// Routes matched requests through the per-request pipeline and into handler
/// coroutines.
///
/// The pipeline per request is: exposure check, optional authentication,
/// parameter binding, handler invocation, response collection. Failures at
/// any stage short-circuit into a structured error response; binding and
/// auth errors never reach a handler.
///
/// Handlers run in `may` coroutines fed over MPSC channels, one coroutine
/// per endpoint by default or a [`WorkerPool`] when parallel execution of a
/// single endpoint is needed. The dispatcher itself keeps no per-request
/// state, so any number of requests can be in flight concurrently.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, HandlerSender>,
    pools: HashMap<String, Arc<WorkerPool>>,
    auth: Option<Arc<dyn AuthHandler>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the process-wide authentication handler.
    pub fn set_auth_handler(&mut self, handler: Arc<dyn AuthHandler>) {
        self.auth = Some(handler);
    }

    #[must_use]
    pub fn has_handler(&self, handler_id: &str) -> bool {
        self.handlers.contains_key(handler_id) || self.pools.contains_key(handler_id)
    }

    /// Install an already-spawned handler sender under an endpoint key,
    /// replacing (and thereby shutting down) any previous handler.
    pub(crate) fn install_handler(&mut self, handler_id: String, sender: HandlerSender) {
        if let Some(old) = self.handlers.remove(&handler_id) {
            drop(old);
            warn!(endpoint = %handler_id, "Replaced existing handler, old coroutine will exit");
        }
        info!(endpoint = %handler_id, "Handler registered");
        self.handlers.insert(handler_id, sender);
    }

    /// Register a handler coroutine for an endpoint.
    ///
    /// Spawns a coroutine that drains the endpoint's request channel. The
    /// handler is wrapped in panic recovery: a panicking handler produces an
    /// opaque 500 for that request and keeps serving the next one.
    ///
    /// Registering the same endpoint twice replaces the previous handler;
    /// its channel closes and the old coroutine exits.
    ///
    /// # Safety
    ///
    /// Spawning `may` coroutines is unsafe in the `may` runtime. The caller
    /// must ensure the runtime is initialized (stack size configured) before
    /// registration, and that registration happens before serving starts.
    pub unsafe fn register_handler<F>(&mut self, endpoint: &Endpoint, handler_fn: F)
    where
        F: Fn(HandlerRequest) + Send + 'static + Clone,
    {
        let handler_id = endpoint.handler_id().to_string();
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let stack_size = handler_stack_size();
        let loop_id = handler_id.clone();

        let spawn_result = coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                debug!(endpoint = %loop_id, stack_size, "Handler coroutine started");
                for req in rx.iter() {
                    run_handler(&handler_fn, req);
                }
            });

        match spawn_result {
            Ok(_) => self.install_handler(handler_id, tx),
            Err(e) => {
                error!(endpoint = %handler_id, error = %e, "Failed to spawn handler coroutine");
            }
        }
    }

    /// Register a handler backed by a worker pool for parallel processing of
    /// a single endpoint. Pool sizing comes from the environment, see
    /// [`WorkerPoolConfig::from_env`].
    ///
    /// # Safety
    ///
    /// Same requirements as [`Dispatcher::register_handler`].
    pub unsafe fn register_handler_with_pool<F>(&mut self, endpoint: &Endpoint, handler_fn: F)
    where
        F: Fn(HandlerRequest) + Send + 'static + Clone,
    {
        self.register_handler_with_pool_config(endpoint, handler_fn, WorkerPoolConfig::from_env());
    }

    /// # Safety
    ///
    /// Same requirements as [`Dispatcher::register_handler`].
    pub unsafe fn register_handler_with_pool_config<F>(
        &mut self,
        endpoint: &Endpoint,
        handler_fn: F,
        config: WorkerPoolConfig,
    ) where
        F: Fn(HandlerRequest) + Send + 'static + Clone,
    {
        let handler_id = endpoint.handler_id().to_string();
        self.handlers.remove(&handler_id);
        let pool = WorkerPool::spawn(handler_id.clone(), config, handler_fn);
        self.pools.insert(handler_id, Arc::new(pool));
    }

    /// Run one request through the pipeline and return its response.
    ///
    /// This is the single dispatch path shared by the HTTP boundary and the
    /// internal client, so both enforce identical exposure, auth, and
    /// binding semantics.
    #[must_use]
    pub fn dispatch(&self, endpoint: &Arc<Endpoint>, input: DispatchInput) -> HandlerResponse {
        let request_id = input.request_id;
        let handler_id = endpoint.handler_id();
        let descriptor = &endpoint.descriptor;

        debug!(
            request_id = %request_id,
            endpoint = %handler_id,
            origin = ?input.origin,
            "Dispatch started"
        );

        // Exposure is enforced first: a private endpoint is invisible to
        // external callers no matter what credentials they hold.
        if descriptor.exposure == Exposure::Private && input.origin == RequestOrigin::External {
            warn!(request_id = %request_id, endpoint = %handler_id, "Private endpoint hit externally");
            return HandlerResponse::error(403, "forbidden", "endpoint is not exposed");
        }

        let auth = match self.authenticate(endpoint, &input) {
            Ok(ctx) => ctx,
            Err(resp) => return *resp,
        };

        // Binding. Raw endpoints skip this stage and receive the unparsed
        // body directly.
        let (params, body) = if descriptor.raw {
            (Value::Null, input.body)
        } else {
            let parts = RequestParts {
                path_params: &input.path_params,
                query_params: &input.query_params,
                headers: &input.headers,
                body: input.body.as_ref(),
            };
            match binder::bind(endpoint, &parts) {
                Ok(params) => (params, None),
                Err(e) => {
                    info!(
                        request_id = %request_id,
                        endpoint = %handler_id,
                        error = %e,
                        "Binding rejected request"
                    );
                    return HandlerResponse::error(e.status(), e.code(), &e.to_string());
                }
            }
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        let request = HandlerRequest {
            request_id,
            origin: input.origin,
            method: descriptor.method.clone(),
            path: input.path,
            service: Arc::clone(&descriptor.service),
            endpoint: Arc::clone(&descriptor.name),
            path_params: input.path_params,
            query_params: input.query_params,
            headers: input.headers,
            cookies: input.cookies,
            params,
            body,
            auth,
            reply_tx,
        };

        let start = Instant::now();
        if let Some(pool) = self.pools.get(handler_id) {
            if let Err(backpressure) = pool.dispatch(request) {
                info!(
                    request_id = %request_id,
                    endpoint = %handler_id,
                    status = backpressure.status,
                    "Backpressure applied"
                );
                return backpressure;
            }
        } else if let Some(tx) = self.handlers.get(handler_id) {
            if tx.send(request).is_err() {
                error!(request_id = %request_id, endpoint = %handler_id, "Handler channel closed");
                return HandlerResponse::error(503, "handler_unavailable", "endpoint is not responding");
            }
        } else {
            error!(request_id = %request_id, endpoint = %handler_id, "No handler registered for endpoint");
            return HandlerResponse::error(500, "handler_unregistered", "endpoint has no handler");
        }

        match reply_rx.recv() {
            Ok(response) => {
                info!(
                    request_id = %request_id,
                    endpoint = %handler_id,
                    status = response.status,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Handler responded"
                );
                response
            }
            Err(_) => {
                error!(
                    request_id = %request_id,
                    endpoint = %handler_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Handler dropped reply channel"
                );
                HandlerResponse::error(503, "handler_unavailable", "endpoint is not responding")
            }
        }
    }

    /// The authenticating stage. Entered when the endpoint requires auth or
    /// when the request carries credentials the configured handler
    /// recognizes; skipped entirely when the caller supplied a context.
    fn authenticate(
        &self,
        endpoint: &Endpoint,
        input: &DispatchInput,
    ) -> Result<AuthContext, Box<HandlerResponse>> {
        let descriptor = &endpoint.descriptor;

        if let Some(ctx) = &input.auth {
            if descriptor.auth_required && !ctx.is_authenticated() {
                return Err(Box::new(HandlerResponse::error(
                    401,
                    "unauthorized",
                    "authentication required",
                )));
            }
            return Ok(ctx.clone());
        }

        let auth_req = AuthRequest {
            headers: &input.headers,
            query: &input.query_params,
            cookies: &input.cookies,
        };
        match &self.auth {
            Some(handler)
                if descriptor.auth_required || handler.credentials_present(&auth_req) =>
            {
                match handler.authenticate(&auth_req) {
                    Ok(ctx) => Ok(ctx),
                    Err(e) if descriptor.auth_required => {
                        info!(
                            request_id = %input.request_id,
                            endpoint = %endpoint.handler_id(),
                            error = %e,
                            "Authentication failed"
                        );
                        Err(Box::new(HandlerResponse::error(
                            401,
                            "unauthorized",
                            &e.to_string(),
                        )))
                    }
                    // Optional auth: a failed opportunistic attempt is
                    // tolerated and the request proceeds unauthenticated.
                    Err(e) => {
                        debug!(
                            request_id = %input.request_id,
                            error = %e,
                            "Optional authentication failed, continuing unauthenticated"
                        );
                        Ok(AuthContext::empty())
                    }
                }
            }
            None if descriptor.auth_required => Err(Box::new(HandlerResponse::error(
                401,
                "unauthorized",
                "authentication required",
            ))),
            _ => Ok(AuthContext::empty()),
        }
    }
}

/// Stack size for handler coroutines, `APILANE_STACK_SIZE` or 64 KB.
/// Handlers run business logic and need more room than the runtime default.
fn handler_stack_size() -> usize {
    runtime_config::parse_size(std::env::var("APILANE_STACK_SIZE").ok().as_deref())
        .unwrap_or(0x10000)
}

/// Execute one request inside a handler loop with panic recovery.
///
/// A panicking handler is logged with its payload and backtrace server-side;
/// the caller only ever sees an opaque 500.
pub(crate) fn run_handler<F>(handler_fn: &F, req: HandlerRequest)
where
    F: Fn(HandlerRequest),
{
    let reply_tx = req.reply_tx.clone();
    let request_id = req.request_id;
    let endpoint = format!("{}.{}", req.service, req.endpoint);
    let start = Instant::now();

    if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        handler_fn(req);
    })) {
        let backtrace = std::backtrace::Backtrace::capture();
        error!(
            request_id = %request_id,
            endpoint = %endpoint,
            panic = ?panic,
            backtrace = %backtrace,
            "Handler panicked"
        );
        let _ = reply_tx.send(HandlerResponse::error(
            500,
            "internal",
            "internal handler error",
        ));
    } else {
        debug!(
            request_id = %request_id,
            endpoint = %endpoint,
            execution_ms = start.elapsed().as_millis() as u64,
            "Handler execution complete"
        );
    }
}
