//! Height telemetry
//!
//! Reads position and speed from the desk's height characteristic.

use crate::domain::error::{DeskError, DeskResult};
use crate::domain::models::HeightSample;
use crate::infrastructure::bluetooth::connection::ConnectionManager;
use crate::infrastructure::bluetooth::endpoints::EndpointResolver;
use crate::infrastructure::bluetooth::protocol::{self, TELEMETRY_LEN};
use crate::infrastructure::bluetooth::transport::BleTransport;
use std::sync::Arc;
use tracing::trace;

pub struct TelemetryReader<T: BleTransport> {
    transport: Arc<T>,
    connection: Arc<ConnectionManager<T>>,
    resolver: Arc<EndpointResolver<T>>,
}

impl<T: BleTransport> TelemetryReader<T> {
    pub fn new(
        transport: Arc<T>,
        connection: Arc<ConnectionManager<T>>,
        resolver: Arc<EndpointResolver<T>>,
    ) -> Self {
        Self {
            transport,
            connection,
            resolver,
        }
    }

    /// Current height in millimeters
    pub async fn read_height_mm(&self) -> DeskResult<f64> {
        let (buf, n) = self.read_payload().await?;
        let meters = protocol::decode_position(&buf[..n])?;
        Ok(meters * 1000.0)
    }

    /// Current height and speed
    pub async fn read_height_and_speed(&self) -> DeskResult<HeightSample> {
        let (buf, n) = self.read_payload().await?;
        protocol::decode_sample(&buf[..n])
    }

    /// Read a sample from an already resolved characteristic.
    ///
    /// Failures here leave the cached connection untouched.
    pub async fn sample(&self, characteristic: &T::Characteristic) -> DeskResult<HeightSample> {
        let (buf, n) = self.read_from(characteristic).await?;
        protocol::decode_sample(&buf[..n])
    }

    async fn read_payload(&self) -> DeskResult<([u8; TELEMETRY_LEN], usize)> {
        let link = self.connection.get_or_connect().await?;

        let result = match self.resolver.telemetry(&link.device).await {
            Ok(characteristic) => self.read_from(&characteristic).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            if e.is_link_failure() {
                self.connection.invalidate(&link, e);
            }
        }
        result
    }

    async fn read_from(
        &self,
        characteristic: &T::Characteristic,
    ) -> DeskResult<([u8; TELEMETRY_LEN], usize)> {
        let mut buf = [0u8; TELEMETRY_LEN];
        let n = self
            .transport
            .read_characteristic(characteristic, &mut buf)
            .await
            .map_err(DeskError::TelemetryReadFailed)?;
        let n = n.min(TELEMETRY_LEN);
        trace!("Telemetry payload: {:02X?}", &buf[..n]);
        Ok((buf, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ConnectionStatus;
    use crate::domain::settings::DeskSettings;
    use crate::infrastructure::bluetooth::mock::MockTransport;
    use crate::infrastructure::bluetooth::protocol::DeskProfile;
    use crate::infrastructure::bluetooth::state::SharedState;
    use crate::infrastructure::notifier::{Events, TracingNotifier};

    fn reader(transport: &Arc<MockTransport>) -> TelemetryReader<MockTransport> {
        let connection = Arc::new(ConnectionManager::new(
            transport.clone(),
            SharedState::default(),
            Events::new(Arc::new(TracingNotifier)),
            &DeskSettings::default(),
        ));
        let resolver = Arc::new(EndpointResolver::new(
            transport.clone(),
            DeskProfile::default(),
        ));
        TelemetryReader::new(transport.clone(), connection, resolver)
    }

    #[tokio::test]
    async fn test_read_height() {
        let transport = Arc::new(MockTransport::with_desk_at(1000.0));
        let height = reader(&transport).read_height_mm().await.unwrap();
        assert!((height - 1000.0).abs() < 1e-6);
        assert_eq!(transport.read_count(), 1);
    }

    #[tokio::test]
    async fn test_height_only_needs_two_bytes() {
        let transport = Arc::new(MockTransport::with_desk_at(800.0));
        transport.override_payload(&[0x10, 0x27]);
        let height = reader(&transport).read_height_mm().await.unwrap();
        assert!((height - 1620.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_short_payload() {
        let transport = Arc::new(MockTransport::with_desk_at(800.0));
        transport.override_payload(&[0x10, 0x27, 0x00]);
        let reader = reader(&transport);

        match reader.read_height_and_speed().await {
            Err(DeskError::ShortPayload { got }) => assert_eq!(got, 3),
            other => panic!("expected short payload, got {other:?}"),
        }

        transport.override_payload(&[0x10]);
        assert!(matches!(
            reader.read_height_mm().await,
            Err(DeskError::ShortPayload { got: 1 })
        ));
    }

    #[tokio::test]
    async fn test_read_failure_drops_cached_link() {
        let transport = Arc::new(MockTransport::with_desk_at(800.0));
        let reader = reader(&transport);
        reader.read_height_mm().await.unwrap();

        transport.fail_reads(1);
        assert!(matches!(
            reader.read_height_and_speed().await,
            Err(DeskError::TelemetryReadFailed(_))
        ));
        assert_eq!(reader.connection.status(), ConnectionStatus::NotConnected);

        // Next read reconnects
        reader.read_height_mm().await.unwrap();
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_short_payload_keeps_link() {
        let transport = Arc::new(MockTransport::with_desk_at(800.0));
        transport.override_payload(&[0x00]);
        let reader = reader(&transport);
        assert!(reader.read_height_and_speed().await.is_err());
        assert_eq!(reader.connection.status(), ConnectionStatus::Connected);
    }
}
