use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use sessioncrab::{Config, RedisStore, SessionError, Store, Value};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "🦀 sessioncrab";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = setup().await?;
    run(config).await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() -> Result<Config, Box<dyn std::error::Error>> {
    // Config first: the log level comes from it.
    let config = Config::load().await?;
    init_tracing(&config)?;
    Ok(config)
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_new(config.log_level.as_str())?;
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(RedisStore::from_config(&config.store));
    let worker = store.spawn();

    match store.ping().await {
        Ok(()) => info!("cache at {} is reachable", store.pool().address()),
        Err(e) => warn!("cache at {} is not answering yet: {e}", store.pool().address()),
    }
    let stats = store.pool().stats().await;
    info!(
        "cache pool: max={} idle={} in_use={}",
        stats.max, stats.idle, stats.in_use
    );

    let app = Router::new()
        .route("/", get(visit))
        .route("/logout", get(logout))
        .with_state(Arc::clone(&store));

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("{APP_NAME} listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("{APP_NAME} shutting down");
        })
        .await?;

    store.stop().await;
    if let Err(e) = worker.await {
        error!("session worker panicked: {e}");
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Handlers --------------------------------------------------------------

async fn visit(State(store): State<Arc<RedisStore>>, headers: HeaderMap) -> Response {
    let (mut session, lookup_error) = store.get(&headers, store.cookie_name()).await.into_parts();
    if let Some(e) = lookup_error.filter(|e| !e.is_new_session()) {
        error!("session lookup failed: {e}");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let visits = session.get("visits").and_then(Value::as_int).unwrap_or(0) + 1;
    session.insert("visits", visits);

    let mut response = format!("visit #{visits}\n").into_response();
    if let Err(e) = store.set(&mut response, &session).await {
        error!("session save failed: {e}");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    response
}

async fn logout(State(store): State<Arc<RedisStore>>, headers: HeaderMap) -> Response {
    let lookup = store.get(&headers, store.cookie_name()).await;
    match &lookup.error {
        Some(SessionError::CookieMissing { .. }) => return "bye\n".into_response(),
        Some(e) if !e.is_new_session() => {
            error!("session lookup failed: {e}");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        _ => {}
    }

    let mut response = "bye\n".into_response();
    if let Err(e) = store.delete(&mut response, &lookup.session).await {
        error!("session delete failed: {e}");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    response
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
