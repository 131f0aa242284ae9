//! Workflow log streaming.
//!
//! Each controller owns a broadcast channel of [`LogEntry`] values so a
//! front end can render progress as it happens. Entries are also forwarded
//! to the `log` facade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt as _};

use crate::config::EVENT_CHANNEL_CAPACITY;

/// Log level for front-end display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Emoji prefix for terminal display.
    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Info => "ℹ️",
            LogLevel::Success => "✅",
            LogLevel::Warning => "⚠️",
            LogLevel::Error => "❌",
        }
    }
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

/// Broadcasts log entries to every subscriber of one controller
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Send a log entry to all subscribers
    pub fn log(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info | LogLevel::Success => log::info!("{}", entry.message),
            LogLevel::Warning => log::warn!("{}", entry.message),
            LogLevel::Error => log::error!("{}", entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream; lagged entries are skipped.
    pub fn stream(&self) -> impl Stream<Item = LogEntry> {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|result| result.ok())
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
