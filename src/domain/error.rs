use std::fmt;
use thiserror::Error;

/// Failure reported by the platform BLE stack
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for TransportError {
    fn from(err: windows::core::Error) -> Self {
        Self(err.message().to_string())
    }
}

/// Desk endpoint names, used to report which one is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Move,
    Telemetry,
    Reference,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Move => "move",
            Self::Telemetry => "height",
            Self::Reference => "reference",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("failed to enable Bluetooth: {0}")]
    TransportUnavailable(#[source] TransportError),

    #[error("invalid {which} characteristic UUID {value:?}")]
    InvalidIdentifier {
        which: Endpoint,
        value: String,
        #[source]
        source: uuid::Error,
    },

    #[error("scan failed: {0}")]
    ScanFailed(#[source] TransportError),

    #[error("desk not found")]
    DeskNotFound,

    #[error("connect failed: {0}")]
    ConnectFailed(#[source] TransportError),

    #[error("discover services: {0}")]
    ServiceDiscoveryFailed(#[source] TransportError),

    #[error("{which} characteristic not found")]
    EndpointNotFound { which: Endpoint },

    #[error("invalid payload: len={got}")]
    ShortPayload { got: usize },

    #[error("read height: {0}")]
    TelemetryReadFailed(#[source] TransportError),

    #[error("target height {target_mm:.1} mm out of range")]
    OutOfRange { target_mm: f64 },

    #[error("desk is already moving")]
    AlreadyMoving,

    #[error("timeout: target height not reached")]
    MoveTimedOut,
}

impl DeskError {
    /// Whether this failure implicates the cached device link
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            Self::ServiceDiscoveryFailed(_) | Self::TelemetryReadFailed(_)
        )
    }
}

pub type DeskResult<T> = Result<T, DeskError>;
