//! BLE Connection Module
//!
//! Owns the single cached desk connection and establishes it on demand.

use crate::domain::error::{DeskError, DeskResult};
use crate::domain::models::ConnectionStatus;
use crate::domain::settings::DeskSettings;
use crate::infrastructure::bluetooth::scanner::DeskScanner;
use crate::infrastructure::bluetooth::state::{DeskLink, SharedState};
use crate::infrastructure::bluetooth::transport::BleTransport;
use crate::infrastructure::notifier::Events;
use std::sync::Arc;
use tracing::debug;

pub struct ConnectionManager<T: BleTransport> {
    transport: Arc<T>,
    scanner: DeskScanner<T>,
    state: SharedState<T::Device>,
    events: Events,
}

impl<T: BleTransport> ConnectionManager<T> {
    pub fn new(
        transport: Arc<T>,
        state: SharedState<T::Device>,
        events: Events,
        settings: &DeskSettings,
    ) -> Self {
        let scanner = DeskScanner::new(
            transport.clone(),
            events.clone(),
            settings.name_prefix.clone(),
            settings.scan_timeout(),
        );
        Self {
            transport,
            scanner,
            state,
            events,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.status()
    }

    /// Return the cached desk, scanning and connecting if there is none.
    ///
    /// Two callers racing before the first connect completes may both scan;
    /// the later cache write wins.
    pub async fn get_or_connect(&self) -> DeskResult<DeskLink<T::Device>> {
        if let Some(link) = self.state.cached_link() {
            return Ok(link);
        }

        match self.connect().await {
            Ok(link) => Ok(link),
            Err(e) => {
                match &e {
                    DeskError::ScanFailed(cause) => {
                        self.events.error(format!("Bluetooth scan failed: {}", cause))
                    }
                    DeskError::DeskNotFound => self.events.warn("No desk found"),
                    other => self.events.error(format!("Connection failed: {}", other)),
                }
                self.events.status(ConnectionStatus::NotConnected);
                Err(e)
            }
        }
    }

    async fn connect(&self) -> DeskResult<DeskLink<T::Device>> {
        let advertisement = self.scanner.find_desk().await?;

        let device = self
            .transport
            .connect(advertisement.address)
            .await
            .map_err(DeskError::ConnectFailed)?;

        let link = self.state.store_link(device);
        debug!("Cached desk link generation {}", link.generation);
        self.events
            .info(format!("Connected to: {}", advertisement.local_name));
        self.events.status(ConnectionStatus::Connected);
        Ok(link)
    }

    /// Forget `link` after a failure that suggests the desk is gone.
    ///
    /// A link that has already been replaced is left alone.
    pub fn invalidate(&self, link: &DeskLink<T::Device>, reason: &DeskError) {
        if self.state.invalidate(link.generation) {
            self.events
                .warn(format!("Lost connection to desk: {}", reason));
            self.events.status(ConnectionStatus::NotConnected);
        }
    }
}
