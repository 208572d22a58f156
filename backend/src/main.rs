//! Home Service - Medicine Cabinet Backend Server
//!
//! Household medicine inventory: items, expiry-dated batches, an
//! append-only stock ledger with first-expire-first-out consumption, and
//! low-stock / expiry alerts.

use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod handlers;
mod middleware;
mod routes;
mod services;
mod store;

pub use config::Config;

use error::AppError;
use services::{AlertScanner, InventoryService, Notifier, TracingNotifier, WebhookNotifier};
use store::LedgerStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub inventory: InventoryService,
    pub scanner: AlertScanner,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::load()?;

    init_tracing(config.logging.json);

    if config.jwt.secret.is_empty() {
        return Err(AppError::Configuration("jwt.secret must be set".to_string()).into());
    }
    if config.alerts.webhook_timeout_secs == 0 {
        return Err(AppError::Configuration(
            "alerts.webhook_timeout_secs must be at least 1".to_string(),
        )
        .into());
    }
    if config.alerts.enabled && config.alerts.scan_interval_hours == 0 {
        return Err(AppError::Configuration(
            "alerts.scan_interval_hours must be at least 1".to_string(),
        )
        .into());
    }

    tracing::info!("Starting Home Service medicine cabinet server");
    tracing::info!("Environment: {}", config.environment);

    // Open the ledger store; migrations run in development
    let store = store::connect(&config.database, config.environment == "development").await?;

    let inventory = InventoryService::new(store.clone(), config.inventory.atomic_consumption);
    if config.inventory.atomic_consumption {
        tracing::info!("Multi-batch consumption runs in a single transaction");
    }

    let notifier: Arc<dyn Notifier> = match &config.alerts.webhook_url {
        Some(url) if !url.is_empty() => {
            tracing::info!("Alert notifications posted to webhook");
            let timeout = Duration::from_secs(config.alerts.webhook_timeout_secs);
            Arc::new(WebhookNotifier::new(url.clone(), timeout)?)
        }
        _ => Arc::new(TracingNotifier),
    };
    let scanner = AlertScanner::new(inventory.clone(), store.clone(), notifier);

    if config.alerts.enabled {
        let hours = config.alerts.scan_interval_hours;
        scanner
            .clone()
            .spawn_periodic(Duration::from_secs(hours * 60 * 60));
    }

    // Create application state
    let state = AppState {
        store,
        inventory,
        scanner,
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Initialize tracing with an env filter and plain or JSON output
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "homeservice_server=debug,tower_http=debug,sqlx=warn".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Home Service Medicine Cabinet API v1.0"
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
