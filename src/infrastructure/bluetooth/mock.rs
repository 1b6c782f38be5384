//! Simulated desk used by the unit tests

use crate::domain::error::TransportError;
use crate::infrastructure::bluetooth::protocol::DeskProfile;
use crate::infrastructure::bluetooth::transport::{Advertisement, BleTransport, ScanFilter};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// Battery level characteristic, present so lookups must skip it
const UNRELATED_UUID: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDevice {
    pub address: u64,
}

pub struct MockService {
    characteristics: Vec<MockCharacteristic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCharacteristic {
    uuid: Uuid,
}

#[derive(Default)]
struct MockState {
    advertisements: Vec<Advertisement>,
    scan_error: bool,
    connect_error: bool,
    enable_error: bool,
    link_lost: bool,
    missing: Vec<Uuid>,
    read_failures: usize,
    payload_override: Option<Vec<u8>>,
    never_stops: bool,

    raw_position: u16,
    raw_speed: i16,

    scans: usize,
    connects: usize,
    discoveries: usize,
    reads: usize,
    writes: Vec<(Uuid, Vec<u8>)>,
}

/// In-memory desk. Each reference write moves the position `step` raw
/// units toward the written target and reports motion until it gets there.
pub struct MockTransport {
    state: Mutex<MockState>,
    profile: DeskProfile,
    step: u16,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            profile: DeskProfile::default(),
            step: 100,
        }
    }

    /// A desk advertising as "Desk 1234" resting at `height_mm`
    pub fn with_desk_at(height_mm: f64) -> Self {
        let transport = Self::new();
        transport.advertise("Desk 1234", 0xC0FFEE);
        transport.set_height_mm(height_mm);
        transport
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn advertise(&self, name: &str, address: u64) {
        self.state().advertisements.push(Advertisement {
            local_name: name.to_string(),
            address,
            rssi: -60,
        });
    }

    pub fn set_height_mm(&self, height_mm: f64) {
        self.state().raw_position = ((height_mm - 620.0) * 10.0).round() as u16;
    }

    pub fn height_mm(&self) -> f64 {
        f64::from(self.state().raw_position) / 10.0 + 620.0
    }

    pub fn fail_scan(&self) {
        self.state().scan_error = true;
    }

    pub fn fail_connect(&self) {
        self.state().connect_error = true;
    }

    pub fn fail_enable(&self) {
        self.state().enable_error = true;
    }

    /// Simulate the desk dropping off the air until the next connect
    pub fn drop_link(&self) {
        self.state().link_lost = true;
    }

    pub fn remove_characteristic(&self, uuid: Uuid) {
        self.state().missing.push(uuid);
    }

    /// Fail the next `count` telemetry reads
    pub fn fail_reads(&self, count: usize) {
        self.state().read_failures = count;
    }

    pub fn override_payload(&self, payload: &[u8]) {
        self.state().payload_override = Some(payload.to_vec());
    }

    /// Keep reporting motion without ever arriving
    pub fn never_stop(&self) {
        self.state().never_stops = true;
    }

    pub fn scan_count(&self) -> usize {
        self.state().scans
    }

    pub fn connect_count(&self) -> usize {
        self.state().connects
    }

    pub fn discovery_count(&self) -> usize {
        self.state().discoveries
    }

    pub fn read_count(&self) -> usize {
        self.state().reads
    }

    pub fn writes_to(&self, uuid: Uuid) -> Vec<Vec<u8>> {
        self.state()
            .writes
            .iter()
            .filter(|(u, _)| *u == uuid)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    pub fn total_writes(&self) -> usize {
        self.state().writes.len()
    }

    pub fn transport_calls(&self) -> usize {
        let state = self.state();
        state.scans + state.connects + state.discoveries + state.reads + state.writes.len()
    }

    fn drive_toward(&self, state: &mut MockState, target: u16) {
        if state.never_stops {
            state.raw_speed = 50;
            return;
        }
        let position = state.raw_position;
        if position < target {
            state.raw_position = position.saturating_add(self.step).min(target);
            state.raw_speed = 500;
        } else if position > target {
            state.raw_position = position.saturating_sub(self.step).max(target);
            state.raw_speed = -500;
        }
        if state.raw_position == target {
            state.raw_speed = 0;
        }
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    type Device = MockDevice;
    type Service = MockService;
    type Characteristic = MockCharacteristic;

    async fn enable(&self) -> Result<(), TransportError> {
        if self.state().enable_error {
            return Err(TransportError::new("adapter unavailable"));
        }
        Ok(())
    }

    async fn scan(
        &self,
        filter: ScanFilter<'_>,
        _timeout: Duration,
    ) -> Result<Option<Advertisement>, TransportError> {
        let mut state = self.state();
        state.scans += 1;
        if state.scan_error {
            return Err(TransportError::new("scan aborted"));
        }
        Ok(state.advertisements.iter().find(|adv| filter(*adv)).cloned())
    }

    async fn connect(&self, address: u64) -> Result<MockDevice, TransportError> {
        let mut state = self.state();
        state.connects += 1;
        if state.connect_error {
            return Err(TransportError::new("connection refused"));
        }
        state.link_lost = false;
        Ok(MockDevice { address })
    }

    async fn discover_services(
        &self,
        _device: &MockDevice,
    ) -> Result<Vec<MockService>, TransportError> {
        let mut state = self.state();
        state.discoveries += 1;
        if state.link_lost {
            return Err(TransportError::new("device unreachable"));
        }
        let desk_chars = [
            self.profile.move_uuid,
            self.profile.height_uuid,
            self.profile.reference_uuid,
        ]
        .into_iter()
        .filter(|uuid| !state.missing.contains(uuid))
        .map(|uuid| MockCharacteristic { uuid })
        .collect();

        Ok(vec![
            MockService {
                characteristics: vec![MockCharacteristic {
                    uuid: UNRELATED_UUID,
                }],
            },
            MockService {
                characteristics: desk_chars,
            },
        ])
    }

    async fn discover_characteristics(
        &self,
        service: &MockService,
    ) -> Result<Vec<MockCharacteristic>, TransportError> {
        Ok(service.characteristics.clone())
    }

    fn characteristic_uuid(&self, characteristic: &MockCharacteristic) -> Uuid {
        characteristic.uuid
    }

    async fn read_characteristic(
        &self,
        _characteristic: &MockCharacteristic,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.reads += 1;
        if state.link_lost {
            return Err(TransportError::new("device unreachable"));
        }
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(TransportError::new("read timed out"));
        }

        let mut payload = [0u8; 4];
        payload[..2].copy_from_slice(&state.raw_position.to_le_bytes());
        payload[2..].copy_from_slice(&state.raw_speed.to_le_bytes());
        let payload = state.payload_override.clone().unwrap_or(payload.to_vec());

        let n = payload.len().min(buf.len());
        buf[..n].copy_from_slice(&payload[..n]);
        Ok(n)
    }

    async fn write_without_response(
        &self,
        characteristic: &MockCharacteristic,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = self.state();
        state.writes.push((characteristic.uuid, bytes.to_vec()));
        if state.link_lost {
            return Err(TransportError::new("device unreachable"));
        }
        if characteristic.uuid == self.profile.reference_uuid {
            if let [lo, hi] = bytes {
                self.drive_toward(&mut state, u16::from_le_bytes([*lo, *hi]));
            }
        }
        Ok(())
    }
}
