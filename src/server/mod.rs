pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::feed::FeedSupervisor;
use crate::index::SpatialIndex;
use crate::refresh::BulkRefresh;

/// Shared application state injected into all handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SpatialIndex>,
    pub catalog: Arc<Catalog>,
    pub refresh: Arc<BulkRefresh>,
    /// Absent when the feed is disabled in config.
    pub feed: Option<Arc<FeedSupervisor>>,
    pub config: Arc<Config>,
}
