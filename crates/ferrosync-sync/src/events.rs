//! Progress event sinks
//!
//! The orchestrator reports `{level, message}` records to an [`EventSink`].
//! The default sink discards them.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Event level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    /// Progress
    Info,
    /// A recorded failure
    Error,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("INFO"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// One progress record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Level
    pub level: EventLevel,
    /// Human readable message
    pub message: String,
}

impl SyncEvent {
    /// Create an event
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Receiver of progress events
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn emit(&self, event: &SyncEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &SyncEvent) {}
}

/// Forwards events to a closure
pub struct FnSink<F> {
    callback: F,
}

impl<F> FnSink<F>
where
    F: Fn(EventLevel, &str) + Send + Sync,
{
    /// Wrap a `(level, message)` callback
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: Fn(EventLevel, &str) + Send + Sync,
{
    fn emit(&self, event: &SyncEvent) {
        (self.callback)(event.level, &event.message);
    }
}

/// Sends events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &SyncEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.send(event.clone());
    }
}
