//! Event fan-out for error, health and recovery signals.
//!
//! Events are fire-and-forget. Every registered [`EventSubscriber`] receives
//! every event synchronously, in registration order; async consumers can
//! additionally [`subscribe`](EventBus::subscribe) to a broadcast channel,
//! which may drop events for receivers that lag behind.

use crate::health::HealthStatus;
use crate::models::ErrorRecord;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Signals emitted by the resilience layer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ResilienceEvent {
    /// A wrapped operation failed
    Error(ErrorRecord),
    /// Recovery failed and the error was escalated
    CriticalError {
        correlation_id: String,
        component: String,
        operation: String,
        original_error: String,
        recovery_error: String,
        timestamp: DateTime<Utc>,
    },
    /// Health flipped between healthy and unhealthy
    HealthStatusChange {
        previous: Option<bool>,
        current: HealthStatus,
    },
    /// A component should be restarted by the external supervisor
    Restart {
        component: String,
        reason: String,
        correlation_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Operator action required
    ManualIntervention {
        record: Box<ErrorRecord>,
        reason: String,
    },
}

impl ResilienceEvent {
    /// Short event name, matching the observer interface
    pub fn name(&self) -> &'static str {
        match self {
            ResilienceEvent::Error(_) => "error",
            ResilienceEvent::CriticalError { .. } => "criticalError",
            ResilienceEvent::HealthStatusChange { .. } => "healthStatusChange",
            ResilienceEvent::Restart { .. } => "restart",
            ResilienceEvent::ManualIntervention { .. } => "manualIntervention",
        }
    }
}

/// Observer notified of every event; no return value is expected
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &ResilienceEvent);
}

/// Publisher shared by the manager, the health monitor and the strategies
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ResilienceEvent>,
    subscribers: Arc<RwLock<Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an observer
    pub fn register(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Subscribe to the broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<ResilienceEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ResilienceEvent) {
        debug!(event = event.name(), "Emitting resilience event");

        let subscribers = self.subscribers.read().clone();
        for subscriber in subscribers {
            subscriber.on_event(&event);
        }

        // No receivers is not an error
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len() + self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Subscriber that keeps every event it sees; handy for tests and audits
#[derive(Default)]
pub struct RecordingSubscriber {
    events: RwLock<Vec<ResilienceEvent>>,
}

impl RecordingSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ResilienceEvent> {
        self.events.read().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.read().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.read().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSubscriber for RecordingSubscriber {
    fn on_event(&self, event: &ResilienceEvent) {
        self.events.write().push(event.clone());
    }
}
