//! Queue-based event dispatch.
//!
//! Publishing and handling are decoupled through an unbounded channel:
//! `publish` enqueues and returns immediately, the [`EventWorker`] drains
//! the queue and invokes subscribed handlers. The bus is an explicitly
//! constructed handle that is injected wherever events are published.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::DomainError;
use crate::event::{EventEnvelope, MarketEvent};

/// A subscriber invoked for the event names it registered under.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs when the handler fails.
    fn name(&self) -> &'static str;

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), DomainError>;
}

/// Sending half of the bus. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<EventEnvelope>,
}

impl EventBus {
    /// Creates a connected bus/worker pair.
    pub fn channel() -> (EventBus, EventWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            EventBus { sender },
            EventWorker {
                receiver,
                handlers: HashMap::new(),
            },
        )
    }

    /// Enqueues an event. Fire-and-forget: a closed queue is logged, the
    /// caller's state change has already committed and must not fail here.
    pub fn publish(&self, event: MarketEvent) {
        metrics::counter!("events_published", "event" => event.name()).increment(1);
        let envelope = EventEnvelope::new(event);
        if self.sender.send(envelope).is_err() {
            tracing::warn!("event queue closed, dropping event");
        }
    }
}

/// Receiving half of the bus: owns the queue and the handler registry.
pub struct EventWorker {
    receiver: mpsc::UnboundedReceiver<EventEnvelope>,
    handlers: HashMap<&'static str, Vec<Arc<dyn EventHandler>>>,
}

impl EventWorker {
    /// Registers a handler for one event name. Handlers run in
    /// subscription order.
    pub fn subscribe(&mut self, event_name: &'static str, handler: Arc<dyn EventHandler>) {
        self.handlers.entry(event_name).or_default().push(handler);
    }

    /// Drains the queue until all senders are dropped. Run as a spawned
    /// task in production.
    pub async fn run(mut self) {
        while let Some(envelope) = self.receiver.recv().await {
            self.dispatch(&envelope).await;
        }
        tracing::debug!("event worker stopped");
    }

    /// Processes everything currently queued, then returns. Deterministic
    /// alternative to `run` for tests.
    pub async fn run_until_idle(&mut self) {
        while let Ok(envelope) = self.receiver.try_recv() {
            self.dispatch(&envelope).await;
        }
    }

    async fn dispatch(&self, envelope: &EventEnvelope) {
        let Some(handlers) = self.handlers.get(envelope.name()) else {
            return;
        };
        for handler in handlers {
            // One failing handler must not starve the others.
            if let Err(e) = handler.handle(envelope).await {
                metrics::counter!("event_handler_failures", "handler" => handler.name())
                    .increment(1);
                tracing::error!(
                    handler = handler.name(),
                    event = envelope.name(),
                    error = %e,
                    "event handler failed"
                );
            }
        }
    }
}

/// Handler that stores every envelope it sees. Used in tests to assert on
/// published events.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<EventEnvelope>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MarketEvent> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|envelope| envelope.event.clone())
            .collect()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), DomainError> {
        self.seen.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}
