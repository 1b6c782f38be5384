//! Observer notifications
//!
//! Log lines, live heights and connection status changes are pushed to a
//! [`Notifier`] so a front end can present them without polling.

use crate::domain::models::{ConnectionStatus, DeskEvent, LogEntry, LogLevel};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub trait Notifier: Send + Sync + 'static {
    fn on_log(&self, entry: LogEntry);
    fn on_height(&self, height_mm: f64);
    fn on_connection_status(&self, status: ConnectionStatus);
}

/// Forwards every notification as a [`DeskEvent`] over a channel
pub struct ChannelNotifier {
    event_sender: mpsc::UnboundedSender<DeskEvent>,
}

impl ChannelNotifier {
    pub fn new(event_sender: mpsc::UnboundedSender<DeskEvent>) -> Self {
        Self { event_sender }
    }

    /// Create a notifier together with the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DeskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Notifier for ChannelNotifier {
    fn on_log(&self, entry: LogEntry) {
        let _ = self.event_sender.send(DeskEvent::Log(entry));
    }

    fn on_height(&self, height_mm: f64) {
        let _ = self.event_sender.send(DeskEvent::Height(height_mm));
    }

    fn on_connection_status(&self, status: ConnectionStatus) {
        let _ = self.event_sender.send(DeskEvent::Connection(status));
    }
}

/// Drops notifications; log lines still reach `tracing` through [`Events`]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn on_log(&self, _entry: LogEntry) {}

    fn on_height(&self, height_mm: f64) {
        tracing::debug!("Height: {:.1} mm", height_mm);
    }

    fn on_connection_status(&self, status: ConnectionStatus) {
        tracing::debug!("Connection status: {}", status);
    }
}

/// Shared handle used by the desk components to report progress
#[derive(Clone)]
pub struct Events {
    notifier: Arc<dyn Notifier>,
}

impl Events {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
        self.notifier.on_log(LogEntry::now(level, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn height(&self, height_mm: f64) {
        self.notifier.on_height(height_mm);
    }

    pub fn status(&self, status: ConnectionStatus) {
        self.notifier.on_connection_status(status);
    }
}
