use anyhow::Result;
use axum::serve;
use relay_core::{
    cache::TtlStore,
    config::AppConfig,
    metrics::MetricsCollector,
    proxy::RouteTable,
    upstream::HttpClient,
};
use rustls::crypto::{ring::default_provider, CryptoProvider};
use server::{app, router::AppState};
use std::sync::Arc;
use tokio::{signal, sync::broadcast};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system based on the configuration.
///
/// `RUST_LOG=debug` and `RUST_LOG=trace` are shortcuts that raise only the relay's own crates;
/// any other `RUST_LOG` value is parsed as a full filter directive.
fn init_logging(config: &AppConfig) {
    let filter = if let Ok(env_filter) = std::env::var("RUST_LOG") {
        if env_filter == "debug" {
            EnvFilter::new("warn,relay_core=debug,server=debug,tests=debug")
        } else if env_filter == "trace" {
            EnvFilter::new("warn,relay_core=trace,server=trace,tests=trace")
        } else {
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
                EnvFilter::new("warn,relay_core=debug,server=debug,tests=debug")
            })
        }
    } else {
        let level = &config.logging.level;
        EnvFilter::try_new(format!("warn,relay_core={level},server={level},tests={level}"))
            .unwrap_or_else(|_| EnvFilter::new("warn,relay_core=info,server=info,tests=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(false),
            )
            .init();
    }
}

/// Store, routes and background tasks built from the configuration.
struct CoreServices {
    store: Arc<TtlStore>,
    routes: Arc<RouteTable>,
    sweeper: tokio::task::JoinHandle<()>,
}

fn init_core_services(
    config: &AppConfig,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<CoreServices> {
    let store = Arc::new(
        TtlStore::from_config(&config.cache)
            .map_err(|e| anyhow::anyhow!("Cache initialization failed: {e}"))?,
    );
    let sweeper = store.start_sweeper(config.cache.sweep_interval(), shutdown_tx.subscribe());

    let http = Arc::new(
        HttpClient::with_config(config.http_client.clone())
            .map_err(|e| anyhow::anyhow!("HTTP client initialization failed: {e}"))?,
    );

    let routes = Arc::new(
        RouteTable::from_config(&config.routes, &store, &http)
            .map_err(|e| anyhow::anyhow!("Route initialization failed: {e}"))?,
    );
    info!(routes_count = routes.len(), ttl_seconds = store.ttl().as_secs(), "Routes initialized");

    Ok(CoreServices { store, routes, sweeper })
}

#[tokio::main]
async fn main() -> Result<()> {
    CryptoProvider::install_default(default_provider())
        .map_err(|e| anyhow::anyhow!("Failed to install crypto provider: {e:?}"))?;

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Configuration failed: {e}"))?;

    init_logging(&config);
    info!("Starting chain relay");

    config.validate().map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;
    debug!(
        routes_count = config.routes.len(),
        bind_port = config.server.bind_port,
        metrics_enabled = config.metrics.enabled,
        "Configuration loaded"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let services = init_core_services(&config, &shutdown_tx)?;

    let mut state = AppState::new(services.routes, services.store);
    if config.metrics.enabled {
        state = state.with_metrics(MetricsCollector::new());
    }

    let app = app::create_app(state, &config.server);
    let addr = config.socket_addr().map_err(|e| anyhow::anyhow!(e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Relay listening");

    if let Err(e) = serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "Server error occurred");
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = services.sweeper.await {
        error!(error = %e, "Store sweeper ended abnormally");
    }
    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");

                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight requests");
}
