//! Diagnostic events for operator triage.
//!
//! Every permanent failure (`StopSync`) and every integrity error is recorded
//! through an [`EventSink`]. Recording is fire-and-forget: sinks must never block
//! the sync path, and a sink that cannot deliver only logs about it.
//!
//! Transient failures are not recorded as events. They are logged
//! through [`TransientLogLimiter`] so a sustained outage produces one warning per
//! provider per interval instead of one per object.

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

/// What an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// A property mapping failed or the mappings produced nothing.
    ConfigurationError,
    /// The directory or the built document made the sync fail permanently.
    SyncStopped,
    /// The link table no longer matches the directory.
    IntegrityError,
}

/// An auditable record of a sync failure.
#[derive(Debug, Clone, Serialize)]
pub struct SyncEvent {
    pub id: Uuid,
    pub action: EventAction,
    pub message: String,
    pub provider_id: String,
    pub object_ref: Option<String>,
    pub mapping: Option<String>,
    /// Free-form detail (external id, remote operation, underlying cause).
    pub context: Value,
    pub created_at: DateTime<Utc>,
}

impl SyncEvent {
    pub fn new(action: EventAction, provider_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            message: message.into(),
            provider_id: provider_id.into(),
            object_ref: None,
            mapping: None,
            context: Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_object(mut self, object_ref: impl Into<String>) -> Self {
        self.object_ref = Some(object_ref.into());
        self
    }

    pub fn with_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.mapping = Some(mapping.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

/// Destination for sync events.
pub trait EventSink: Send + Sync {
    /// Record an event. Must return promptly and must not fail.
    fn record(&self, event: SyncEvent);
}

/// Writes events to the `log` facade.
///
/// Integrity errors are logged at `error`, everything else at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn record(&self, event: SyncEvent) {
        let object = event.object_ref.as_deref().unwrap_or("-");
        match event.action {
            EventAction::IntegrityError => error!(
                "[{}] provider={} object={} {} context={}",
                event.id, event.provider_id, object, event.message, event.context
            ),
            _ => warn!(
                "[{}] {:?} provider={} object={} mapping={} {}",
                event.id,
                event.action,
                event.provider_id,
                object,
                event.mapping.as_deref().unwrap_or("-"),
                event.message
            ),
        }
    }
}

/// Forwards events to an unbounded channel for an external audit writer.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn record(&self, event: SyncEvent) {
        if let Err(err) = self.sender.send(event) {
            // Receiver is gone; fall back to the log so the event is not lost silently.
            LogEventSink.record(err.0);
            debug!("Event channel closed, event written to log instead");
        }
    }
}

/// Rate limiter for transient-failure warnings, keyed by provider.
#[derive(Debug)]
pub struct TransientLogLimiter {
    interval: Duration,
    last_reported: Mutex<HashMap<String, Instant>>,
}

impl TransientLogLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_reported: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a transient failure for `key` should be reported now.
    ///
    /// Returns `true` at most once per interval per key.
    pub fn should_report(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut last = self
            .last_reported
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match last.get(key) {
            Some(previous) if now.duration_since(*previous) < self.interval => false,
            _ => {
                last.insert(key.to_string(), now);
                true
            }
        }
    }
}
