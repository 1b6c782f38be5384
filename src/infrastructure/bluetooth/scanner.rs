//! BLE Scanner Module
//!
//! Handles discovery of desks by their advertised name.

use crate::domain::error::{DeskError, DeskResult};
use crate::infrastructure::bluetooth::transport::{Advertisement, BleTransport};
use crate::infrastructure::notifier::Events;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Scanner for advertising desks
pub struct DeskScanner<T> {
    transport: Arc<T>,
    events: Events,
    name_prefix: String,
    timeout: Duration,
}

impl<T: BleTransport> DeskScanner<T> {
    pub fn new(transport: Arc<T>, events: Events, name_prefix: String, timeout: Duration) -> Self {
        Self {
            transport,
            events,
            name_prefix,
            timeout,
        }
    }

    /// Whether an advertisement belongs to a desk
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        advertisement.local_name.starts_with(&self.name_prefix)
    }

    /// Scan until the first desk shows up
    pub async fn find_desk(&self) -> DeskResult<Advertisement> {
        self.events.info("Scanning for desk...");

        let filter = |adv: &Advertisement| self.matches(adv);
        let found = self
            .transport
            .scan(&filter, self.timeout)
            .await
            .map_err(DeskError::ScanFailed)?;

        let advertisement = found.ok_or(DeskError::DeskNotFound)?;
        debug!(
            "Matched advertisement {:#X} (RSSI {} dBm)",
            advertisement.address, advertisement.rssi
        );
        self.events
            .info(format!("Desk found: {}", advertisement.local_name));
        Ok(advertisement)
    }
}
