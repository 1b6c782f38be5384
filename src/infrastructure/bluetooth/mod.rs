//! Bluetooth Module
//!
//! Provides BLE control of a motorized standing desk.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       DeskService                        │
//! │  (Main coordinator - public API for the application)     │
//! └──────────┬──────────────────┬───────────────────────────┘
//!            │                  │
//!            ▼                  ▼
//!   ┌────────────────┐   ┌────────────────┐
//!   │ MoveController │──►│TelemetryReader │
//!   └───────┬────────┘   └───────┬────────┘
//!           │                    │
//!           ▼                    ▼
//!   ┌───────────────────┐  ┌──────────────────┐
//!   │ ConnectionManager │  │ EndpointResolver │
//!   │  - Scanner        │  │  - Protocol UUIDs│
//!   └─────────┬─────────┘  └────────┬─────────┘
//!             └──────────┬──────────┘
//!                        ▼
//!                 ┌──────────────┐
//!                 │ BleTransport │  (WinRT, or a test double)
//!                 └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Characteristic UUIDs, commands, and payload parsing
//! - [`transport`] - The platform BLE stack seam
//! - [`scanner`] - Desk discovery by advertised name
//! - [`state`] - Cached link, connection status and motion flag
//! - [`connection`] - Get-or-connect with a cached device
//! - [`endpoints`] - GATT characteristic lookup
//! - [`telemetry`] - Height and speed reads
//! - [`motion`] - Bounded-time moves
//! - [`service`] - Main service coordinator

pub mod connection;
pub mod endpoints;
pub mod motion;
pub mod protocol;
pub mod scanner;
pub mod service;
pub mod state;
pub mod telemetry;
pub mod transport;

#[cfg(windows)]
pub mod winrt;

#[cfg(test)]
pub(crate) mod mock;

// Re-export main service for convenience
pub use service::DeskService;
pub use transport::BleTransport;
