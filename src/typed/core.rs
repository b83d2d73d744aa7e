use crate::auth::AuthContext;
use crate::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse, HandlerSender};
use crate::ids::RequestId;
use crate::registry::Endpoint;
use http::Method;
use may::sync::mpsc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

/// Trait implemented by typed coroutine handlers.
///
/// The request type is deserialized from the bound parameter object the
/// binder produced, so by the time `handle` runs every field is present and
/// correctly typed. The response is serialized to the JSON body of a 200.
pub trait Handler: Send + 'static {
    type Request: DeserializeOwned + Send + 'static;
    type Response: Serialize + Send + 'static;

    fn handle(&self, req: TypedRequest<Self::Request>) -> Self::Response;
}

/// Typed request data passed to a [`Handler`].
#[derive(Debug, Clone)]
pub struct TypedRequest<T> {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    /// Auth context established for this request, empty when unauthenticated.
    pub auth: AuthContext,
    /// The deserialized parameter object.
    pub data: T,
}

/// Spawn a typed handler coroutine and return the sender that feeds it.
///
/// # Safety
///
/// Spawns a `may` coroutine; the caller must ensure the runtime is
/// initialized and that the sender is registered before serving starts.
pub unsafe fn spawn_typed<H>(handler: H) -> mpsc::Sender<HandlerRequest>
where
    H: Handler,
{
    let (tx, rx) = mpsc::channel::<HandlerRequest>();

    let spawn_result = may::coroutine::Builder::new()
        .stack_size(may::config().get_stack_size())
        .spawn(move || {
            for req in rx.iter() {
                let reply_tx = req.reply_tx.clone();
                let request_id = req.request_id;
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    handle_one(&handler, req);
                }));
                if let Err(panic) = result {
                    error!(request_id = %request_id, panic = ?panic, "Typed handler panicked");
                    let _ = reply_tx.send(HandlerResponse::error(
                        500,
                        "internal",
                        "internal handler error",
                    ));
                }
            }
        });

    if let Err(e) = spawn_result {
        error!(error = %e, "Failed to spawn typed handler coroutine");
    }

    tx
}

fn handle_one<H: Handler>(handler: &H, req: HandlerRequest) {
    let request_id = req.request_id;
    let reply_tx = req.reply_tx.clone();

    // The binder already validated the parameter object, so a conversion
    // failure here means the declared schema and the handler's request type
    // disagree.
    let data: H::Request = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(err) => {
            warn!(
                request_id = %request_id,
                error = %err,
                "Bound parameters do not fit the handler's request type"
            );
            let _ = reply_tx.send(HandlerResponse::error(
                400,
                "schema_validation",
                &err.to_string(),
            ));
            return;
        }
    };

    let typed = TypedRequest {
        request_id,
        method: req.method,
        path: req.path,
        auth: req.auth,
        data,
    };
    let response = handler.handle(typed);

    match serde_json::to_value(response) {
        Ok(body) => {
            let _ = reply_tx.send(HandlerResponse::json(200, body));
        }
        Err(err) => {
            error!(request_id = %request_id, error = %err, "Response serialization failed");
            let _ = reply_tx.send(HandlerResponse::error(
                500,
                "internal",
                "internal handler error",
            ));
        }
    }
}

impl Dispatcher {
    /// Register a typed handler for an endpoint.
    ///
    /// # Safety
    ///
    /// Same requirements as [`Dispatcher::register_handler`]: the `may`
    /// runtime must be initialized, and registration must precede serving.
    pub unsafe fn register_typed<H>(&mut self, endpoint: &Endpoint, handler: H)
    where
        H: Handler,
    {
        let sender: HandlerSender = spawn_typed(handler);
        self.install_handler(endpoint.handler_id().to_string(), sender);
    }
}
