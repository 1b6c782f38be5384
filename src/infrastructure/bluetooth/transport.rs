//! BLE Transport Abstraction
//!
//! The platform stack that performs the actual radio work. Everything above
//! this trait is platform independent.

use crate::domain::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// A received advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub local_name: String,
    pub address: u64,
    pub rssi: i16,
}

/// Predicate applied to each advertisement while scanning
pub type ScanFilter<'a> = &'a (dyn Fn(&Advertisement) -> bool + Send + Sync);

/// What a platform scanner reports while it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Seen(Advertisement),
    /// The platform stopped the scan; `Some` carries the failure reason
    Stopped(Option<String>),
}

/// Wait for the first advertisement accepted by `filter`.
///
/// A scanner that stops with an error fails the scan. One that stops
/// cleanly, or a scan that runs out of time, finds nothing.
pub async fn first_match(
    events: &mut UnboundedReceiver<ScanEvent>,
    filter: ScanFilter<'_>,
    timeout: Duration,
) -> Result<Option<Advertisement>, TransportError> {
    let wait = async {
        while let Some(event) = events.recv().await {
            match event {
                ScanEvent::Seen(advertisement) if filter(&advertisement) => {
                    return Ok(Some(advertisement));
                }
                ScanEvent::Seen(_) => {}
                ScanEvent::Stopped(Some(reason)) => {
                    return Err(TransportError::new(format!("scan aborted: {}", reason)));
                }
                ScanEvent::Stopped(None) => return Ok(None),
            }
        }
        Ok(None)
    };

    tokio::time::timeout(timeout, wait).await.unwrap_or(Ok(None))
}

#[async_trait]
pub trait BleTransport: Send + Sync + 'static {
    type Device: Clone + Send + Sync + 'static;
    type Service: Send + Sync + 'static;
    type Characteristic: Clone + Send + Sync + 'static;

    /// Power up the adapter
    async fn enable(&self) -> Result<(), TransportError>;

    /// Scan until an advertisement matches `filter`, then stop scanning.
    ///
    /// Returns `Ok(None)` when `timeout` elapses without a match.
    async fn scan(
        &self,
        filter: ScanFilter<'_>,
        timeout: Duration,
    ) -> Result<Option<Advertisement>, TransportError>;

    async fn connect(&self, address: u64) -> Result<Self::Device, TransportError>;

    async fn discover_services(
        &self,
        device: &Self::Device,
    ) -> Result<Vec<Self::Service>, TransportError>;

    async fn discover_characteristics(
        &self,
        service: &Self::Service,
    ) -> Result<Vec<Self::Characteristic>, TransportError>;

    fn characteristic_uuid(&self, characteristic: &Self::Characteristic) -> Uuid;

    /// Read into `buf`, returning the number of valid bytes
    async fn read_characteristic(
        &self,
        characteristic: &Self::Characteristic,
        buf: &mut [u8],
    ) -> Result<usize, TransportError>;

    async fn write_without_response(
        &self,
        characteristic: &Self::Characteristic,
        bytes: &[u8],
    ) -> Result<(), TransportError>;
}
