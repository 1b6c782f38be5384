//! WinRT BLE transport
//!
//! [`BleTransport`] on top of `Windows.Devices.Bluetooth`.

use crate::domain::error::TransportError;
use crate::infrastructure::bluetooth::transport::{
    first_match, Advertisement, BleTransport, ScanEvent, ScanFilter,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEAdvertisementWatcherStoppedEventArgs, BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattCommunicationStatus, GattDeviceService, GattSession, GattWriteOption,
};
use windows::Devices::Bluetooth::{
    BluetoothAdapter, BluetoothCacheMode, BluetoothError, BluetoothLEDevice,
};
use windows::Devices::Radios::RadioState;
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, DataWriter};

#[derive(Default)]
pub struct WinRtTransport;

impl WinRtTransport {
    pub fn new() -> Self {
        Self
    }
}

fn check(status: GattCommunicationStatus, what: &str) -> Result<(), TransportError> {
    if status == GattCommunicationStatus::Success {
        Ok(())
    } else {
        Err(TransportError::new(format!("{} failed: {:?}", what, status)))
    }
}

fn guid_to_uuid(guid: GUID) -> Uuid {
    Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
}

fn characteristic_id(guid: windows::core::Result<GUID>) -> Uuid {
    match guid {
        Ok(guid) => guid_to_uuid(guid),
        Err(e) => {
            debug!("Unreadable characteristic UUID, treating as nil: {}", e);
            Uuid::nil()
        }
    }
}

/// Asks Windows to hold the link open until the last handle is dropped
struct KeepAlive(GattSession);

impl Drop for KeepAlive {
    fn drop(&mut self) {
        let _ = self.0.SetMaintainConnection(false);
        let _ = self.0.Close();
        debug!("GATT session released");
    }
}

/// A connected desk and the session keeping its link up
#[derive(Clone)]
pub struct WinRtDevice {
    device: BluetoothLEDevice,
    _session: Option<Arc<KeepAlive>>,
}

#[async_trait]
impl BleTransport for WinRtTransport {
    type Device = WinRtDevice;
    type Service = GattDeviceService;
    type Characteristic = GattCharacteristic;

    async fn enable(&self) -> Result<(), TransportError> {
        let adapter = BluetoothAdapter::GetDefaultAsync()?.await?;
        if !adapter.IsLowEnergySupported()? {
            return Err(TransportError::new("adapter does not support Bluetooth LE"));
        }
        let radio = adapter.GetRadioAsync()?.await?;
        let state = radio.State()?;
        if state != RadioState::On {
            return Err(TransportError::new(format!("Bluetooth radio is {:?}", state)));
        }
        info!("Bluetooth adapter {:#X} ready", adapter.BluetoothAddress()?);
        Ok(())
    }

    async fn scan(
        &self,
        filter: ScanFilter<'_>,
        timeout: Duration,
    ) -> Result<Option<Advertisement>, TransportError> {
        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let stopped_sender = sender.clone();
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let name = args.Advertisement()?.LocalName()?.to_string();
                    if !name.is_empty() {
                        let _ = sender.send(ScanEvent::Seen(Advertisement {
                            local_name: name,
                            address: args.BluetoothAddress()?,
                            rssi: args.RawSignalStrengthInDBm()?,
                        }));
                    }
                }
                Ok(())
            },
        );

        // Radio or adapter failures end the watch through this event
        let stopped = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementWatcherStoppedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let error = args.Error()?;
                    let reason =
                        (error != BluetoothError::Success).then(|| format!("{:?}", error));
                    let _ = stopped_sender.send(ScanEvent::Stopped(reason));
                }
                Ok(())
            },
        );

        watcher.Received(&handler)?;
        watcher.Stopped(&stopped)?;
        watcher.Start()?;
        debug!("Advertisement watcher started");

        let found = first_match(&mut receiver, filter, timeout).await;

        watcher.Stop()?;
        found
    }

    async fn connect(&self, address: u64) -> Result<WinRtDevice, TransportError> {
        info!("Connecting to Bluetooth device: {:#X}", address);
        let device = BluetoothLEDevice::FromBluetoothAddressAsync(address)?.await?;

        // Keep the link up between operations instead of letting Windows
        // drop it once no GATT request is pending
        let session = match GattSession::FromDeviceIdAsync(&device.BluetoothDeviceId()?)?.await {
            Ok(session) => {
                session.SetMaintainConnection(true)?;
                Some(Arc::new(KeepAlive(session)))
            }
            Err(e) => {
                warn!("Failed to create GattSession, continuing anyway: {}", e);
                None
            }
        };

        // Touch the GATT database once so failures show up here
        let services = device
            .GetGattServicesWithCacheModeAsync(BluetoothCacheMode::Uncached)?
            .await?;
        check(services.Status()?, "GATT service query")?;
        Ok(WinRtDevice {
            device,
            _session: session,
        })
    }

    async fn discover_services(
        &self,
        device: &WinRtDevice,
    ) -> Result<Vec<GattDeviceService>, TransportError> {
        let result = device.device.GetGattServicesAsync()?.await?;
        check(result.Status()?, "GATT service query")?;

        let services = result.Services()?;
        let mut out = Vec::with_capacity(services.Size()? as usize);
        for i in 0..services.Size()? {
            out.push(services.GetAt(i)?);
        }
        Ok(out)
    }

    async fn discover_characteristics(
        &self,
        service: &GattDeviceService,
    ) -> Result<Vec<GattCharacteristic>, TransportError> {
        let result = service.GetCharacteristicsAsync()?.await?;
        check(result.Status()?, "characteristic query")?;

        let characteristics = result.Characteristics()?;
        let mut out = Vec::with_capacity(characteristics.Size()? as usize);
        for i in 0..characteristics.Size()? {
            out.push(characteristics.GetAt(i)?);
        }
        Ok(out)
    }

    fn characteristic_uuid(&self, characteristic: &GattCharacteristic) -> Uuid {
        characteristic_id(characteristic.Uuid())
    }

    async fn read_characteristic(
        &self,
        characteristic: &GattCharacteristic,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        let result = characteristic
            .ReadValueWithCacheModeAsync(BluetoothCacheMode::Uncached)?
            .await?;
        check(result.Status()?, "characteristic read")?;

        let reader = DataReader::FromBuffer(&result.Value()?)?;
        let length = reader.UnconsumedBufferLength()? as usize;
        let mut bytes = vec![0u8; length];
        reader.ReadBytes(&mut bytes)?;

        let n = length.min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }

    async fn write_without_response(
        &self,
        characteristic: &GattCharacteristic,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let writer = DataWriter::new()?;
        writer.WriteBytes(bytes)?;
        let buffer = writer.DetachBuffer()?;

        let status = characteristic
            .WriteValueWithOptionAsync(&buffer, GattWriteOption::WriteWithoutResponse)?
            .await?;
        check(status, "characteristic write")
    }
}
