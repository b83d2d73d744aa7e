use apilane::auth::ApiKeyAuth;
use apilane::client::ServiceClient;
use apilane::dispatcher::Dispatcher;
use apilane::registry::{ApiSchema, EndpointDescriptor, EndpointRegistry, FieldSpec, FieldType};
use apilane::router::RouteTable;
use apilane::runtime_config::RuntimeConfig;
use apilane::server::{AppService, HttpServer};
use apilane::typed::{Handler, TypedRequest};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, RwLock};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Demo service showing declarative endpoint registration: a public hello
/// endpoint, a blog service with path/query binding, an auth-protected
/// admin endpoint, a raw echo endpoint, and a private stats service invoked
/// through the in-process client.
#[derive(Parser, Debug)]
#[command(name = "apilane-demo")]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "0.0.0.0:8080", env = "APILANE_ADDR")]
    addr: String,
    /// Static API key protecting the auth-required endpoints. Auth is
    /// disabled when unset.
    #[arg(long, env = "APILANE_API_KEY")]
    api_key: Option<String>,
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct HelloRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct HelloResponse {
    message: String,
}

struct SayHello;

impl Handler for SayHello {
    type Request = HelloRequest;
    type Response = HelloResponse;

    fn handle(&self, req: TypedRequest<HelloRequest>) -> HelloResponse {
        HelloResponse {
            message: format!("Hello {}!", req.data.name),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GetPostRequest {
    id: i64,
}

#[derive(Debug, Serialize)]
struct PostResponse {
    id: i64,
    title: String,
    views: i64,
}

#[derive(Debug, Deserialize)]
struct PostViews {
    views: i64,
}

/// Public endpoint that fans into the private stats service in-process.
struct GetPost {
    stats: ServiceClient,
}

impl Handler for GetPost {
    type Request = GetPostRequest;
    type Response = PostResponse;

    fn handle(&self, req: TypedRequest<GetPostRequest>) -> PostResponse {
        let views = self
            .stats
            .call_typed::<_, PostViews>(
                "stats",
                "post_views",
                &GetPostRequest { id: req.data.id },
                req.auth.clone(),
            )
            .map(|v| v.views)
            .unwrap_or(0);
        PostResponse {
            id: req.data.id,
            title: format!("Post #{}", req.data.id),
            views,
        }
    }
}

fn build_table() -> anyhow::Result<Arc<RouteTable>> {
    let mut registry = EndpointRegistry::new();
    registry.register(
        EndpointDescriptor::builder("hello", "say_hello")
            .post("/hello")
            .expose()
            .schema(ApiSchema::new().field(FieldSpec::new("name", FieldType::String)))
            .build(),
    )?;
    registry.register(
        EndpointDescriptor::builder("blog", "get_post")
            .get("/blog/:id")
            .expose()
            .schema(ApiSchema::new().field(FieldSpec::new("id", FieldType::Integer)))
            .build(),
    )?;
    registry.register(
        EndpointDescriptor::builder("blog", "list_posts")
            .get("/blog")
            .expose()
            .schema(
                ApiSchema::new()
                    .field(FieldSpec::new("limit", FieldType::Integer).query().optional()),
            )
            .build(),
    )?;
    registry.register(
        EndpointDescriptor::builder("stats", "post_views")
            .get("/stats/posts/:id")
            .schema(ApiSchema::new().field(FieldSpec::new("id", FieldType::Integer)))
            .build(),
    )?;
    registry.register(
        EndpointDescriptor::builder("admin", "get_settings")
            .get("/admin/settings")
            .expose()
            .require_auth()
            .build(),
    )?;
    registry.register(
        EndpointDescriptor::builder("echo", "raw_echo")
            .post("/echo")
            .expose()
            .raw()
            .build(),
    )?;
    Ok(registry.freeze())
}

fn register_handlers(
    table: &Arc<RouteTable>,
    dispatcher: &Arc<RwLock<Dispatcher>>,
) -> anyhow::Result<()> {
    let endpoint = |service: &str, name: &str| {
        table
            .endpoint(service, name)
            .map(Arc::clone)
            .ok_or_else(|| anyhow::anyhow!("endpoint {service}.{name} missing from table"))
    };
    let stats_client = ServiceClient::new(Arc::clone(table), Arc::clone(dispatcher));
    let mut dispatcher = dispatcher.write().unwrap();

    // SAFETY: the may runtime is configured in main() before this runs, and
    // registration completes before the server starts.
    unsafe {
        dispatcher.register_typed(&*endpoint("hello", "say_hello")?, SayHello);
        dispatcher.register_typed(
            &*endpoint("blog", "get_post")?,
            GetPost {
                stats: stats_client,
            },
        );
        dispatcher.register_handler_with_pool(&*endpoint("blog", "list_posts")?, |req| {
            let limit = req.params["limit"].as_i64().unwrap_or(10).clamp(0, 100);
            let posts: Vec<_> = (1..=limit)
                .map(|id| json!({ "id": id, "title": format!("Post #{id}") }))
                .collect();
            req.reply_json(&json!({ "posts": posts }));
        });
        dispatcher.register_handler(&*endpoint("stats", "post_views")?, |req| {
            let id = req.params["id"].as_i64().unwrap_or(0);
            req.reply_json(&json!({ "views": id * 37 % 1000 }));
        });
        dispatcher.register_handler(&*endpoint("admin", "get_settings")?, |req| {
            req.reply_json(&json!({
                "maintenance": false,
                "operator": req.auth.subject().unwrap_or("api-key"),
            }));
        });
        dispatcher.register_handler(&*endpoint("echo", "raw_echo")?, |req| {
            req.reply_json(&json!({ "received": req.body }));
        });
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    RuntimeConfig::from_env().apply();

    let table = build_table()?;
    let dispatcher = Arc::new(RwLock::new(Dispatcher::new()));
    register_handlers(&table, &dispatcher)?;
    if let Some(key) = &args.api_key {
        dispatcher
            .write()
            .unwrap()
            .set_auth_handler(Arc::new(ApiKeyAuth::new(key.clone()).allow_query("api_key")));
    } else {
        info!("No API key configured; auth-required endpoints will reject all requests");
    }

    table.dump_routes();

    let service = AppService::new(Arc::clone(&table), Arc::clone(&dispatcher));
    let handle = HttpServer(service).start(&args.addr)?;
    info!(addr = %args.addr, endpoints = table.len(), "apilane demo listening");
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server exited abnormally: {e:?}"))
}
