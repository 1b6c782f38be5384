//! Desk Protocol
//!
//! This module contains the protocol definitions for communicating with
//! the desk's onboard controller: characteristic identifiers, command bytes
//! and the telemetry/reference payload layouts.

use crate::domain::error::{DeskError, DeskResult, Endpoint};
use crate::domain::models::HeightSample;
use crate::domain::settings::DeskSettings;
use crate::domain::units;
use uuid::Uuid;

/// Advertised local name prefix of supported desks
pub const DESK_NAME_PREFIX: &str = "Desk";

/// Move Command Characteristic UUID - accepts wakeup/stop commands
pub const MOVE_CHAR_UUID: &str = "99fa0002-338a-1024-8a49-009c0215f78a";

/// Height Characteristic UUID - readable position and speed
pub const HEIGHT_CHAR_UUID: &str = "99fa0021-338a-1024-8a49-009c0215f78a";

/// Reference Input Characteristic UUID - writable target position
pub const REFERENCE_INPUT_CHAR_UUID: &str = "99fa0031-338a-1024-8a49-009c0215f78a";

/// Commands accepted by the move characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeskCommand {
    /// Wake the control box so it accepts reference input
    Wakeup,
    /// Halt any running motion
    Stop,
}

impl DeskCommand {
    /// Get the raw bytes for this command
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Wakeup => &[0xFE, 0x00],
            Self::Stop => &[0xFF, 0x00],
        }
    }
}

/// Handshake written before driving the reference input
pub const PRIME_SEQUENCE: &[DeskCommand] = &[DeskCommand::Wakeup, DeskCommand::Stop];

/// Bytes of a full telemetry payload
pub const TELEMETRY_LEN: usize = 4;

/// Bytes needed to decode the position alone
pub const POSITION_LEN: usize = 2;

/// Parsed characteristic identifiers for one desk model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeskProfile {
    pub move_uuid: Uuid,
    pub height_uuid: Uuid,
    pub reference_uuid: Uuid,
}

impl Default for DeskProfile {
    fn default() -> Self {
        Self {
            move_uuid: Uuid::from_u128(0x99fa0002_338a_1024_8a49_009c0215f78a),
            height_uuid: Uuid::from_u128(0x99fa0021_338a_1024_8a49_009c0215f78a),
            reference_uuid: Uuid::from_u128(0x99fa0031_338a_1024_8a49_009c0215f78a),
        }
    }
}

impl DeskProfile {
    /// Parse the identifiers configured in settings
    pub fn from_settings(settings: &DeskSettings) -> DeskResult<Self> {
        Ok(Self {
            move_uuid: parse_uuid(Endpoint::Move, &settings.move_char_uuid)?,
            height_uuid: parse_uuid(Endpoint::Telemetry, &settings.height_char_uuid)?,
            reference_uuid: parse_uuid(Endpoint::Reference, &settings.reference_char_uuid)?,
        })
    }
}

fn parse_uuid(which: Endpoint, value: &str) -> DeskResult<Uuid> {
    Uuid::parse_str(value).map_err(|source| DeskError::InvalidIdentifier {
        which,
        value: value.to_string(),
        source,
    })
}

/// Decode the position field of a telemetry payload
///
/// # Telemetry Payload (4 bytes)
///
/// ```text
/// [0-1] : Position above minimum height (u16 little-endian, 0.1 mm)
/// [2-3] : Speed (i16 little-endian, 0.1 mm/s, negative = down)
/// ```
pub fn decode_position(bytes: &[u8]) -> DeskResult<f64> {
    match bytes {
        [lo, hi, ..] => Ok(units::raw_to_meters(u16::from_le_bytes([*lo, *hi]))),
        _ => Err(DeskError::ShortPayload { got: bytes.len() }),
    }
}

/// Decode both fields of a telemetry payload
pub fn decode_sample(bytes: &[u8]) -> DeskResult<HeightSample> {
    match bytes {
        [p0, p1, s0, s1, ..] => Ok(HeightSample {
            position_meters: units::raw_to_meters(u16::from_le_bytes([*p0, *p1])),
            speed_meters_per_second: units::raw_speed_to_mps(i16::from_le_bytes([*s0, *s1])),
        }),
        _ => Err(DeskError::ShortPayload { got: bytes.len() }),
    }
}

/// Encode a target height for the reference input characteristic
pub fn encode_target(meters: f64) -> [u8; 2] {
    units::meters_to_raw(meters).to_le_bytes()
}
