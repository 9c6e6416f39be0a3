//! Streaming market feed consumer.
//!
//! A supervisor owns a dedicated OS thread running its own tokio runtime. The
//! listener task on that runtime connects a transport, inflates and decodes
//! each frame, and applies the result to the spatial index. Decode and lookup
//! failures are counted and never leave the listener.

pub mod client;
pub mod decode;
pub mod supervisor;
pub mod transport;

pub use client::{FeedListener, ListenerExit, ListenerState};
pub use decode::{decode_frame, FeedUpdate};
pub use supervisor::FeedSupervisor;
pub use transport::{FeedContext, FeedTransport, TransportError, TransportFactory, ZmqTransport};

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-listener counters.
#[derive(Debug, Default)]
pub struct FeedStats {
    pub frames_received: AtomicU64,
    pub shipyard_applied: AtomicU64,
    pub outfitting_applied: AtomicU64,
    pub discarded: AtomicU64,
    pub decompression_errors: AtomicU64,
    pub parse_errors: AtomicU64,
    pub unknown_ships: AtomicU64,
    pub unknown_modules: AtomicU64,
    pub transport_errors: AtomicU64,
    pub timeouts: AtomicU64,
    pub panics: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStatsSnapshot {
    pub frames_received: u64,
    pub shipyard_applied: u64,
    pub outfitting_applied: u64,
    pub discarded: u64,
    pub decompression_errors: u64,
    pub parse_errors: u64,
    pub unknown_ships: u64,
    pub unknown_modules: u64,
    pub transport_errors: u64,
    pub timeouts: u64,
    pub panics: u64,
}

impl FeedStats {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FeedStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        FeedStatsSnapshot {
            frames_received: load(&self.frames_received),
            shipyard_applied: load(&self.shipyard_applied),
            outfitting_applied: load(&self.outfitting_applied),
            discarded: load(&self.discarded),
            decompression_errors: load(&self.decompression_errors),
            parse_errors: load(&self.parse_errors),
            unknown_ships: load(&self.unknown_ships),
            unknown_modules: load(&self.unknown_modules),
            transport_errors: load(&self.transport_errors),
            timeouts: load(&self.timeouts),
            panics: load(&self.panics),
        }
    }
}
