use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskrelay::auth::RequestAuthenticator;
use taskrelay::broker::ApprovalBroker;
use taskrelay::notification::callback::RunTaskCallback;
use taskrelay::notification::teams::TeamsNotifier;
use taskrelay::store::{MemoryStore, RedisStore, TokenStore};
use taskrelay::{api, config, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "taskrelay=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let store = select_store(&cfg).await;

    let authenticator = RequestAuthenticator::new(cfg.hmac_key.clone());
    let notifier = Arc::new(TeamsNotifier::new(cfg.teams_webhook_url.clone()));
    let callback = Arc::new(RunTaskCallback::new());

    let broker = ApprovalBroker::new(
        store,
        notifier,
        callback,
        cfg.base_public_url.clone(),
        Duration::from_secs(cfg.token_ttl_secs),
        cfg.filter_speculative_plans_only,
    );

    let state = Arc::new(AppState {
        broker,
        authenticator,
    });

    let app = api::router()
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("taskrelay listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Pick the token store backend. Redis is preferred when configured;
/// a failed connection falls back to the in-process store so the relay
/// stays usable on a single instance.
async fn select_store(cfg: &config::Config) -> Arc<dyn TokenStore> {
    match &cfg.redis_url {
        Some(url) => match RedisStore::connect(url, cfg.redis_password.as_deref()).await {
            Ok(store) => {
                tracing::info!("Using Redis for token storage: {}", url);
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to connect to Redis ({}): {}. Falling back to in-memory storage.",
                    url,
                    e
                );
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            tracing::info!("Redis not configured. Using in-memory storage.");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Middleware: injects a unique X-Request-Id into every response so
/// callers can correlate errors with relay logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
