use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use starport::feed::{FeedContext, FeedTransport, TransportError, TransportFactory};

/// What the next `recv` on a mock transport yields.
#[derive(Debug, Clone)]
pub enum MockEvent {
    Frame(Bytes),
    Fail(String),
    Terminate,
}

/// Channel-backed feed shared by every transport its factory builds, so a
/// restarted listener keeps reading the same queue.
pub struct MockFeed {
    tx: UnboundedSender<MockEvent>,
    rx: Arc<Mutex<UnboundedReceiver<MockEvent>>>,
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    contexts: Arc<StdMutex<Vec<FeedContext>>>,
}

impl MockFeed {
    pub fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            connects: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            contexts: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    pub fn send(&self, event: MockEvent) {
        self.tx.send(event).unwrap();
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Contexts handed to the factory, oldest first.
    pub fn contexts(&self) -> Vec<FeedContext> {
        self.contexts.lock().unwrap().clone()
    }

    pub fn transport(&self) -> Box<dyn FeedTransport> {
        Box::new(MockTransport {
            rx: self.rx.clone(),
            context: FeedContext::new(),
            connects: self.connects.clone(),
            closes: self.closes.clone(),
        })
    }

    pub fn factory(&self) -> TransportFactory {
        let rx = self.rx.clone();
        let connects = self.connects.clone();
        let closes = self.closes.clone();
        let contexts = self.contexts.clone();
        Arc::new(move |context: &FeedContext| {
            contexts.lock().unwrap().push(context.clone());
            Box::new(MockTransport {
                rx: rx.clone(),
                context: context.clone(),
                connects: connects.clone(),
                closes: closes.clone(),
            }) as Box<dyn FeedTransport>
        })
    }
}

struct MockTransport {
    rx: Arc<Mutex<UnboundedReceiver<MockEvent>>>,
    context: FeedContext,
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FeedTransport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.context.is_terminated() {
            return Err(TransportError::Terminated);
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Bytes, TransportError> {
        let mut rx = self.rx.lock().await;
        let event = tokio::select! {
            _ = self.context.terminated() => return Err(TransportError::Terminated),
            event = rx.recv() => event,
        };
        match event {
            Some(MockEvent::Frame(frame)) => Ok(frame),
            Some(MockEvent::Fail(msg)) => Err(TransportError::Io(msg)),
            Some(MockEvent::Terminate) | None => Err(TransportError::Terminated),
        }
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
