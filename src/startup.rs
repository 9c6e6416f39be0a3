//! Application startup and bootstrap logic.
//!
//! Kept out of `main.rs` so the wiring can be exercised from tests with the
//! feed disabled and small snapshot files.

use std::sync::Arc;

use axum::Router;
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::feed::{FeedListener, FeedSupervisor, TransportFactory, ZmqTransport};
use crate::index::SpatialIndex;
use crate::refresh::BulkRefresh;
use crate::server::routes::build_router;
use crate::server::AppState;

/// Resolve the configuration file path.
///
/// Priority:
/// 1. `STARPORT_CONFIG` environment variable
/// 2. `./starport.toml` if it exists
/// 3. None (use defaults)
pub fn resolve_config_path() -> Option<String> {
    std::env::var("STARPORT_CONFIG").ok().or_else(|| {
        let default = "starport.toml";
        std::path::Path::new(default)
            .exists()
            .then(|| default.to_string())
    })
}

/// Initialize tracing subscriber from logging config.
///
/// Supports JSON and plain text formats. Uses `RUST_LOG` env var if set,
/// otherwise falls back to `config.logging.level`.
pub fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

/// Long-lived components that outlive the router, for shutdown.
pub struct AppHandles {
    pub index: Arc<SpatialIndex>,
    pub refresh: Arc<BulkRefresh>,
    pub feed: Option<Arc<FeedSupervisor>>,
}

impl AppHandles {
    /// Stop the feed worker, if one was started.
    pub fn shutdown(&self) {
        if let Some(feed) = &self.feed {
            feed.stop();
        }
    }
}

/// Build the application router with the feed connecting to the configured relay.
pub async fn build_app(
    config: Config,
) -> Result<(Router, AppHandles), Box<dyn std::error::Error>> {
    let factory = ZmqTransport::factory(config.feed.endpoint());
    build_app_with_transport(config, factory).await
}

/// Build the application router and start background work.
///
/// - Initializes metrics
/// - Loads the module catalog (configured file or bundled data)
/// - Creates the spatial index and applies configured snapshot files
/// - Starts the feed supervisor when the feed is enabled
/// - Builds `AppState` and the axum `Router`
pub async fn build_app_with_transport(
    config: Config,
    factory: TransportFactory,
) -> Result<(Router, AppHandles), Box<dyn std::error::Error>> {
    tracing::info!("starport starting");
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        feed_enabled = config.feed.enabled,
        feed_endpoint = %config.feed.endpoint(),
        max_shell_radius = config.search.max_shell_radius,
        max_results = config.search.max_results,
        "configuration loaded"
    );

    crate::metrics::init();

    let catalog = match &config.catalog.path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::bundled()?,
    };
    let catalog = Arc::new(catalog);

    let index = Arc::new(SpatialIndex::new(config.search.clone()));
    let refresh = Arc::new(BulkRefresh::new(index.clone(), catalog.clone()));

    let snapshot = config.snapshot.clone();
    if snapshot.systems_path.is_some() || snapshot.stations_path.is_some() {
        let job = refresh.clone();
        let applied = tokio::task::spawn_blocking(move || job.refresh_configured(&snapshot)).await?;
        match applied {
            Ok(()) => tracing::info!(
                systems = index.system_count(),
                stations = index.station_count(),
                "snapshots applied"
            ),
            Err(e) => tracing::warn!(error = %e, "snapshot refresh failed, serving partial data"),
        }
    }

    let feed = if config.feed.enabled {
        let listener = Arc::new(FeedListener::new(
            catalog.clone(),
            index.clone(),
            config.feed.clone(),
        ));
        let supervisor = Arc::new(FeedSupervisor::new(listener, factory));
        supervisor.start()?;
        Some(supervisor)
    } else {
        tracing::info!("feed disabled");
        None
    };

    let state = AppState {
        index: index.clone(),
        catalog,
        refresh: refresh.clone(),
        feed: feed.clone(),
        config: Arc::new(config),
    };
    let app = build_router(state);

    Ok((
        app,
        AppHandles {
            index,
            refresh,
            feed,
        },
    ))
}
