use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::FeedConfig;
use crate::error::{Result, StarportError};
use crate::index::SpatialIndex;
use crate::metrics;

use super::decode::{decode_frame, FeedUpdate, Schema};
use super::transport::{FeedTransport, TransportError};
use super::FeedStats;

/// Connection state of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Listening,
    Terminated,
}

impl ListenerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ListenerState::Connecting,
            2 => ListenerState::Listening,
            3 => ListenerState::Terminated,
            _ => ListenerState::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ListenerState::Disconnected => 0,
            ListenerState::Connecting => 1,
            ListenerState::Listening => 2,
            ListenerState::Terminated => 3,
        }
    }
}

/// Why `FeedListener::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// Shutdown was requested.
    Stopped,
    /// The transport reported deliberate termination.
    Terminated,
}

enum SessionEnd {
    Stopped,
    Failed(TransportError),
}

/// Applies feed frames to the index. One instance is shared across restarts
/// so its counters and connection flag survive them.
pub struct FeedListener {
    catalog: Arc<Catalog>,
    index: Arc<SpatialIndex>,
    config: FeedConfig,
    stats: FeedStats,
    connected: AtomicBool,
    state: AtomicU8,
}

impl FeedListener {
    pub fn new(catalog: Arc<Catalog>, index: Arc<SpatialIndex>, config: FeedConfig) -> Self {
        Self {
            catalog,
            index,
            config,
            stats: FeedStats::default(),
            connected: AtomicBool::new(false),
            state: AtomicU8::new(ListenerState::Disconnected.as_u8()),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ListenerState {
        ListenerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: ListenerState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
        let connected = state == ListenerState::Listening;
        self.connected.store(connected, Ordering::SeqCst);
        metrics::FEED_CONNECTED.set(i64::from(connected));
    }

    /// Decode and apply one frame. Errors are counted here; the caller only
    /// uses the result to decide whether the backoff counter may reset.
    pub fn handle_frame(&self, frame: &[u8]) -> Result<()> {
        FeedStats::bump(&self.stats.frames_received, 1);

        let update = match decode_frame(&self.catalog, frame, self.config.max_frame_bytes) {
            Ok(update) => update,
            Err(e) => {
                let kind = match &e {
                    StarportError::Decompression(_) => {
                        FeedStats::bump(&self.stats.decompression_errors, 1);
                        "decompression"
                    }
                    _ => {
                        FeedStats::bump(&self.stats.parse_errors, 1);
                        "parse"
                    }
                };
                metrics::FEED_ERRORS_TOTAL.with_label_values(&[kind]).inc();
                warn!(error = %e, kind, "dropping feed frame");
                return Err(e);
            }
        };

        match update {
            FeedUpdate::Discarded => {
                FeedStats::bump(&self.stats.discarded, 1);
                metrics::FEED_DISCARDED_TOTAL.inc();
                debug!("discarding irrelevant message");
            }
            FeedUpdate::Shipyard {
                system,
                station,
                ships,
                unknown_ships,
            } => {
                if !unknown_ships.is_empty() {
                    FeedStats::bump(&self.stats.unknown_ships, unknown_ships.len() as u64);
                    metrics::FEED_ERRORS_TOTAL
                        .with_label_values(&["unknown_ship"])
                        .inc_by(unknown_ships.len() as u64);
                    warn!(system = %system, station = %station, ships = ?unknown_ships, "unknown ships in shipyard message");
                }
                let outcome = self.index.update_station_ships(&system, &station, ships);
                FeedStats::bump(&self.stats.shipyard_applied, 1);
                metrics::FEED_MESSAGES_TOTAL
                    .with_label_values(&[Schema::Shipyard.label()])
                    .inc();
                debug!(system = %system, station = %station, ?outcome, "shipyard update");
            }
            FeedUpdate::Outfitting {
                system,
                station,
                outfitting,
                unknown_modules,
                unknown_categories,
            } => {
                if !unknown_modules.is_empty() {
                    FeedStats::bump(&self.stats.unknown_modules, unknown_modules.len() as u64);
                    metrics::FEED_ERRORS_TOTAL
                        .with_label_values(&["unknown_module"])
                        .inc_by(unknown_modules.len() as u64);
                    warn!(system = %system, station = %station, modules = ?unknown_modules, "unknown modules in outfitting message");
                }
                if !unknown_categories.is_empty() {
                    warn!(categories = ?unknown_categories, "unrecognized module categories");
                }
                let outcome = self
                    .index
                    .update_station_outfitting(&system, &station, outfitting);
                FeedStats::bump(&self.stats.outfitting_applied, 1);
                metrics::FEED_MESSAGES_TOTAL
                    .with_label_values(&[Schema::Outfitting.label()])
                    .inc();
                debug!(system = %system, station = %station, ?outcome, "outfitting update");
            }
        }
        Ok(())
    }

    /// Sleep for the backoff of `attempt`. Returns `false` if shutdown arrived first.
    pub(crate) async fn backoff(&self, attempt: u32, shutdown: &mut watch::Receiver<bool>) -> bool {
        let wait = self.config.backoff(attempt);
        warn!(attempt, wait_secs = wait.as_secs(), "feed reconnect backoff");
        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = shutdown.changed() => false,
        }
    }

    async fn listen(
        &self,
        transport: &mut dyn FeedTransport,
        shutdown: &mut watch::Receiver<bool>,
        attempt: &mut u32,
    ) -> SessionEnd {
        let recv_timeout = self.config.recv_timeout();
        loop {
            let received = tokio::select! {
                _ = shutdown.changed() => return SessionEnd::Stopped,
                r = tokio::time::timeout(recv_timeout, transport.recv()) => r,
            };
            match received {
                Err(_elapsed) => {
                    FeedStats::bump(&self.stats.timeouts, 1);
                    metrics::FEED_RECONNECTS_TOTAL
                        .with_label_values(&["timeout"])
                        .inc();
                    debug!("no frames within receive timeout, reconnecting");
                    if let Err(e) = transport.reconnect().await {
                        return SessionEnd::Failed(e);
                    }
                }
                Ok(Err(e)) => return SessionEnd::Failed(e),
                Ok(Ok(frame)) => {
                    if self.handle_frame(&frame).is_ok() {
                        *attempt = 0;
                    }
                }
            }
        }
    }

    /// Drive one transport until shutdown or deliberate termination. Transport
    /// failures back off exponentially and reconnect on the same transport.
    pub async fn run(
        &self,
        mut transport: Box<dyn FeedTransport>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ListenerExit {
        let mut attempt: u32 = 0;

        let exit = loop {
            if *shutdown.borrow() {
                break ListenerExit::Stopped;
            }

            self.set_state(ListenerState::Connecting);
            info!(host = %self.config.host, port = self.config.port, "connecting to feed");
            let connected = tokio::select! {
                _ = shutdown.changed() => break ListenerExit::Stopped,
                r = transport.connect() => r,
            };

            let failure = match connected {
                Ok(()) => {
                    self.set_state(ListenerState::Listening);
                    info!("listening to feed");
                    match self.listen(transport.as_mut(), &mut shutdown, &mut attempt).await {
                        SessionEnd::Stopped => break ListenerExit::Stopped,
                        SessionEnd::Failed(e) => e,
                    }
                }
                Err(e) => e,
            };

            self.set_state(ListenerState::Disconnected);
            match failure {
                TransportError::Terminated => break ListenerExit::Terminated,
                TransportError::Io(msg) => {
                    FeedStats::bump(&self.stats.transport_errors, 1);
                    metrics::FEED_ERRORS_TOTAL
                        .with_label_values(&["transport"])
                        .inc();
                    metrics::FEED_RECONNECTS_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                    warn!(error = %msg, attempt, "feed transport error");
                    transport.close().await;
                    if !self.backoff(attempt, &mut shutdown).await {
                        break ListenerExit::Stopped;
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        };

        transport.close().await;
        let final_state = match exit {
            ListenerExit::Stopped => ListenerState::Disconnected,
            ListenerExit::Terminated => ListenerState::Terminated,
        };
        self.set_state(final_state);
        info!(?exit, "stopped listening to feed");
        exit
    }
}
