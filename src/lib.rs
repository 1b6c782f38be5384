//! Idasen Desk Controller
//!
//! Discovers a BLE standing desk, reads its height and drives it to a
//! target height with a bounded wait.

pub mod domain;
pub mod infrastructure;

pub use domain::error::{DeskError, DeskResult};
pub use domain::models::{ConnectionStatus, DeskEvent, HeightSample, LogEntry, LogLevel};
pub use infrastructure::bluetooth::{BleTransport, DeskService};
