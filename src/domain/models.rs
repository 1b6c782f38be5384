use serde::Serialize;
use std::fmt;

/// Desk connection state as shown to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connected,
    #[default]
    NotConnected,
    /// Display-only; never produced by the controller itself
    Unknown,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connected => "CONNECTED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// A single user-facing log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Local wall-clock time, `HH:MM:SS`
    pub timestamp: String,
}

impl LogEntry {
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// One decoded telemetry reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightSample {
    pub position_meters: f64,
    pub speed_meters_per_second: f64,
}

impl HeightSample {
    pub fn height_mm(&self) -> f64 {
        self.position_meters * 1000.0
    }

    pub fn is_stopped(&self) -> bool {
        self.speed_meters_per_second == 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeskEvent {
    Log(LogEntry),
    /// Live height in millimeters
    Height(f64),
    Connection(ConnectionStatus),
}
