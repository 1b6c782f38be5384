//! GATT endpoint lookup
//!
//! Walks every service and characteristic of a connected desk and picks out
//! the ones the protocol needs. Nothing is cached between calls.

use crate::domain::error::{DeskError, DeskResult, Endpoint};
use crate::infrastructure::bluetooth::protocol::DeskProfile;
use crate::infrastructure::bluetooth::transport::BleTransport;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Characteristics needed to drive the desk
pub struct MotionEndpoints<C> {
    pub command: C,
    pub reference: C,
}

pub struct EndpointResolver<T> {
    transport: Arc<T>,
    profile: DeskProfile,
}

impl<T: BleTransport> EndpointResolver<T> {
    pub fn new(transport: Arc<T>, profile: DeskProfile) -> Self {
        Self { transport, profile }
    }

    /// Locate the height/speed characteristic
    pub async fn telemetry(&self, device: &T::Device) -> DeskResult<T::Characteristic> {
        let [telemetry] = self.find(device, [self.profile.height_uuid]).await?;
        telemetry.ok_or(DeskError::EndpointNotFound {
            which: Endpoint::Telemetry,
        })
    }

    /// Locate the move command and reference input characteristics
    pub async fn motion(&self, device: &T::Device) -> DeskResult<MotionEndpoints<T::Characteristic>> {
        let [command, reference] = self
            .find(device, [self.profile.move_uuid, self.profile.reference_uuid])
            .await?;

        let command = command.ok_or(DeskError::EndpointNotFound {
            which: Endpoint::Move,
        })?;
        let reference = reference.ok_or(DeskError::EndpointNotFound {
            which: Endpoint::Reference,
        })?;
        Ok(MotionEndpoints { command, reference })
    }

    async fn find<const N: usize>(
        &self,
        device: &T::Device,
        wanted: [Uuid; N],
    ) -> DeskResult<[Option<T::Characteristic>; N]> {
        let services = self
            .transport
            .discover_services(device)
            .await
            .map_err(DeskError::ServiceDiscoveryFailed)?;
        debug!("Discovered {} services", services.len());

        let mut found: [Option<T::Characteristic>; N] = std::array::from_fn(|_| None);
        for service in &services {
            let characteristics = match self.transport.discover_characteristics(service).await {
                Ok(characteristics) => characteristics,
                Err(e) => {
                    // Access-restricted services (HID, etc.) fail here
                    warn!("Skipping service: {}", e);
                    continue;
                }
            };

            for characteristic in characteristics {
                let uuid = self.transport.characteristic_uuid(&characteristic);
                for (slot, want) in found.iter_mut().zip(wanted.iter()) {
                    if slot.is_none() && uuid == *want {
                        *slot = Some(characteristic.clone());
                    }
                }
            }

            if found.iter().all(Option::is_some) {
                break;
            }
        }
        Ok(found)
    }
}
