use std::sync::Arc;

use tokio::net::TcpListener;

use starport::catalog::Catalog;
use starport::config::Config;
use starport::index::SpatialIndex;
use starport::refresh::BulkRefresh;
use starport::server::routes::build_router;
use starport::server::AppState;

/// Serve `index` on an ephemeral port with the feed disabled. Returns the base URL.
pub async fn start_test_server(catalog: Arc<Catalog>, index: Arc<SpatialIndex>) -> String {
    starport::metrics::init();

    let mut config = Config::default();
    config.feed.enabled = false;

    let state = AppState {
        refresh: Arc::new(BulkRefresh::new(index.clone(), catalog.clone())),
        index,
        catalog,
        feed: None,
        config: Arc::new(config),
    };

    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    base_url
}
