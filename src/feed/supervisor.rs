use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::{Result, StarportError};
use crate::metrics;
use crate::types::HealthSignal;

use super::client::{FeedListener, ListenerExit, ListenerState};
use super::transport::{FeedContext, TransportFactory};
use super::FeedStats;

struct Worker {
    thread: JoinHandle<()>,
    context: FeedContext,
    shutdown: watch::Sender<bool>,
}

/// Owns the listener thread. `start` and `stop` may be called repeatedly; each
/// start builds a fresh transport context, transport and backoff counter.
pub struct FeedSupervisor {
    listener: Arc<FeedListener>,
    factory: TransportFactory,
    worker: Mutex<Option<Worker>>,
}

impl FeedSupervisor {
    pub fn new(listener: Arc<FeedListener>, factory: TransportFactory) -> Self {
        Self {
            listener,
            factory,
            worker: Mutex::new(None),
        }
    }

    pub fn listener(&self) -> &Arc<FeedListener> {
        &self.listener
    }

    /// Spawn the listener thread. A no-op while a worker is still alive.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = worker.as_ref() {
            if !existing.thread.is_finished() {
                return Ok(());
            }
        }
        if let Some(finished) = worker.take() {
            let _ = finished.thread.join();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let context = FeedContext::new();
        let listener = self.listener.clone();
        let factory = self.factory.clone();
        let run_context = context.clone();

        let thread = std::thread::Builder::new()
            .name("feed-listener".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "failed to build feed runtime");
                        return;
                    }
                };
                runtime.block_on(supervise(listener, factory, run_context, shutdown_rx));
            })
            .map_err(StarportError::Io)?;

        info!("feed supervisor started");
        *worker = Some(Worker {
            thread,
            context,
            shutdown: shutdown_tx,
        });
        Ok(())
    }

    /// Terminate the transport context, interrupting any pending receive,
    /// signal shutdown, and join the thread.
    pub fn stop(&self) {
        let taken = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = taken else {
            return;
        };
        worker.context.terminate();
        let _ = worker.shutdown.send(true);
        if worker.thread.join().is_err() {
            error!("feed listener thread panicked during shutdown");
        }
        self.listener.set_state(ListenerState::Disconnected);
        info!("feed supervisor stopped");
    }

    pub fn restart(&self) -> Result<()> {
        self.stop();
        self.start()
    }

    /// True while the worker thread is alive and the transport is connected.
    pub fn is_running(&self) -> bool {
        let alive = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.thread.is_finished());
        alive && self.listener.is_connected()
    }

    pub fn health(&self) -> HealthSignal {
        if self.is_running() {
            return HealthSignal::healthy();
        }
        match self.listener.state() {
            ListenerState::Terminated => HealthSignal::unhealthy("feed transport terminated"),
            ListenerState::Connecting => HealthSignal::unhealthy("connecting to feed"),
            _ => HealthSignal::unhealthy("not connected to feed"),
        }
    }
}

impl Drop for FeedSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run listener tasks until a clean exit. A panicking task is logged, counted,
/// backed off, and replaced by a fresh one on a fresh transport.
async fn supervise(
    listener: Arc<FeedListener>,
    factory: TransportFactory,
    context: FeedContext,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut panics: u32 = 0;
    loop {
        let transport = factory(&context);
        let task = tokio::spawn({
            let listener = listener.clone();
            let shutdown = shutdown.clone();
            async move { listener.run(transport, shutdown).await }
        });

        match task.await {
            Ok(ListenerExit::Stopped) => break,
            Ok(ListenerExit::Terminated) if context.is_terminated() => break,
            Ok(ListenerExit::Terminated) => {
                warn!("feed transport terminated, listener will not reconnect");
                break;
            }
            Err(e) if e.is_panic() => {
                FeedStats::bump(&listener.stats().panics, 1);
                metrics::FEED_ERRORS_TOTAL.with_label_values(&["panic"]).inc();
                listener.set_state(ListenerState::Disconnected);
                error!(panics = panics + 1, "feed listener panicked, restarting");
                let stopping = *shutdown.borrow();
                if stopping || !listener.backoff(panics, &mut shutdown).await {
                    break;
                }
                panics = panics.saturating_add(1);
            }
            Err(e) => {
                warn!(error = %e, "feed listener task cancelled");
                break;
            }
        }
    }
}
