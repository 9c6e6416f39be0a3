use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};
use zeromq::{Socket, SocketRecv, SubSocket};

use crate::error::StarportError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport was shut down on purpose; the listener must not retry.
    #[error("transport terminated")]
    Terminated,

    #[error("transport io error: {0}")]
    Io(String),
}

impl From<TransportError> for StarportError {
    fn from(e: TransportError) -> Self {
        StarportError::Transport(e.to_string())
    }
}

/// Source of raw compressed frames.
#[async_trait]
pub trait FeedTransport: Send {
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Wait for the next frame. Callers bound this with their own timeout.
    async fn recv(&mut self) -> Result<Bytes, TransportError>;

    /// Drop the current connection and establish a fresh one.
    async fn reconnect(&mut self) -> Result<(), TransportError> {
        self.close().await;
        self.connect().await
    }

    async fn close(&mut self);
}

/// Termination switch shared by every transport built for one supervisor run.
///
/// Once terminated, transports built against it report
/// [`TransportError::Terminated`] from `connect` and `recv`, including a
/// receive already in flight. A new run gets a new context.
#[derive(Clone)]
pub struct FeedContext {
    terminated: Arc<watch::Sender<bool>>,
}

impl FeedContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            terminated: Arc::new(tx),
        }
    }

    pub fn terminate(&self) {
        self.terminated.send_replace(true);
    }

    pub fn is_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    /// Resolves once `terminate` has been called.
    pub async fn terminated(&self) {
        let mut rx = self.terminated.subscribe();
        let _ = rx.wait_for(|terminated| *terminated).await;
    }
}

impl Default for FeedContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a fresh transport for every listener start.
pub type TransportFactory = Arc<dyn Fn(&FeedContext) -> Box<dyn FeedTransport> + Send + Sync>;

/// ZeroMQ SUB socket subscribed to every topic on a relay.
pub struct ZmqTransport {
    endpoint: String,
    context: FeedContext,
    socket: Option<SubSocket>,
}

impl ZmqTransport {
    pub fn new(endpoint: impl Into<String>, context: FeedContext) -> Self {
        Self {
            endpoint: endpoint.into(),
            context,
            socket: None,
        }
    }

    pub fn factory(endpoint: String) -> TransportFactory {
        Arc::new(move |context: &FeedContext| {
            Box::new(ZmqTransport::new(endpoint.clone(), context.clone())) as Box<dyn FeedTransport>
        })
    }
}

fn io_error(e: zeromq::ZmqError) -> TransportError {
    TransportError::Io(e.to_string())
}

#[async_trait]
impl FeedTransport for ZmqTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.context.is_terminated() {
            return Err(TransportError::Terminated);
        }
        let mut socket = SubSocket::new();
        tokio::select! {
            _ = self.context.terminated() => return Err(TransportError::Terminated),
            r = socket.connect(&self.endpoint) => r.map_err(io_error)?,
        }
        socket.subscribe("").await.map_err(io_error)?;
        debug!(endpoint = %self.endpoint, "subscribed");
        self.socket = Some(socket);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Bytes, TransportError> {
        if self.context.is_terminated() {
            return Err(TransportError::Terminated);
        }
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| TransportError::Io("not connected".to_string()))?;
        let message = tokio::select! {
            _ = self.context.terminated() => return Err(TransportError::Terminated),
            r = socket.recv() => r.map_err(io_error)?,
        };
        message
            .get(0)
            .cloned()
            .ok_or_else(|| TransportError::Io("empty message".to_string()))
    }

    async fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            for e in socket.close().await {
                warn!(endpoint = %self.endpoint, error = %e, "error closing socket");
            }
        }
    }
}
