//! Desk Service Module
//!
//! Main service that wires the connection, telemetry and motion components
//! together and exposes the operations a front end calls.

use crate::domain::error::{DeskError, DeskResult};
use crate::domain::models::ConnectionStatus;
use crate::domain::settings::DeskSettings;
use crate::domain::units::{self, HEIGHT_STEP_MM};
use crate::infrastructure::bluetooth::{
    connection::ConnectionManager,
    endpoints::EndpointResolver,
    motion::{MotionTiming, MoveController},
    protocol::DeskProfile,
    state::SharedState,
    telemetry::TelemetryReader,
    transport::BleTransport,
};
use crate::infrastructure::notifier::{Events, Notifier};
use std::sync::Arc;

/// Public entry point for controlling a desk.
///
/// Cloning is cheap; clones share the same connection and motion state.
pub struct DeskService<T: BleTransport> {
    transport: Arc<T>,
    events: Events,
    connection: Arc<ConnectionManager<T>>,
    telemetry: Arc<TelemetryReader<T>>,
    motion: Arc<MoveController<T>>,
    auto_connect: bool,
}

impl<T: BleTransport> Clone for DeskService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            events: self.events.clone(),
            connection: self.connection.clone(),
            telemetry: self.telemetry.clone(),
            motion: self.motion.clone(),
            auto_connect: self.auto_connect,
        }
    }
}

impl<T: BleTransport> DeskService<T> {
    /// Build the service. Characteristic identifiers are parsed here, so a
    /// bad configuration fails before any radio work.
    pub fn new(
        transport: Arc<T>,
        notifier: Arc<dyn Notifier>,
        settings: &DeskSettings,
    ) -> DeskResult<Self> {
        let profile = DeskProfile::from_settings(settings)?;
        let events = Events::new(notifier);
        let state = SharedState::default();

        let connection = Arc::new(ConnectionManager::new(
            transport.clone(),
            state.clone(),
            events.clone(),
            settings,
        ));
        let resolver = Arc::new(EndpointResolver::new(transport.clone(), profile));
        let telemetry = Arc::new(TelemetryReader::new(
            transport.clone(),
            connection.clone(),
            resolver.clone(),
        ));
        let motion = Arc::new(MoveController::new(
            transport.clone(),
            connection.clone(),
            resolver,
            telemetry.clone(),
            state,
            events.clone(),
            MotionTiming::from(settings),
        ));

        Ok(Self {
            transport,
            events,
            connection,
            telemetry,
            motion,
            auto_connect: settings.auto_connect,
        })
    }

    /// Enable the adapter and, if configured, connect right away
    pub async fn startup(&self) -> DeskResult<()> {
        if let Err(e) = self.transport.enable().await {
            self.events
                .error(format!("Failed to enable Bluetooth: {}", e));
            return Err(DeskError::TransportUnavailable(e));
        }
        self.events.info("Bluetooth adapter enabled");

        if self.auto_connect {
            self.connect_and_report().await;
        }
        Ok(())
    }

    /// Connect and publish the initial height. Failures are only logged.
    pub async fn connect_and_report(&self) {
        self.events.info("Connecting to desk...");

        if let Err(e) = self.connection.get_or_connect().await {
            self.events.warn(format!("Auto-connect failed: {}", e));
            return;
        }

        match self.telemetry.read_height_mm().await {
            Ok(height) => {
                self.events.height(height);
                self.events
                    .info(format!("Current height: {:.1} cm", height / 10.0));
            }
            Err(e) => self.events.warn(format!("Failed to read height: {}", e)),
        }
    }

    pub fn check_connection(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn is_moving(&self) -> bool {
        self.motion.is_moving()
    }

    /// Current height in millimeters
    pub async fn get_height(&self) -> DeskResult<f64> {
        self.telemetry.read_height_mm().await.map_err(|e| {
            self.events.error(format!("Failed to read height: {}", e));
            e
        })
    }

    /// Move to `target_mm`, waiting until the desk arrives or gives up
    pub async fn move_to_height(&self, target_mm: f64) -> DeskResult<()> {
        self.motion.move_to_height(target_mm).await
    }

    /// Move one step (1 cm) up or down, staying inside the desk's range
    pub async fn move_by_step(&self, up: bool) -> DeskResult<()> {
        let current_mm = self.get_height().await?;
        let target_mm = step_target_mm(current_mm, up);

        let direction = if up { "up" } else { "down" };
        self.events
            .info(format!("Moving {} to {:.1} cm", direction, target_mm / 10.0));

        self.motion.move_to_height(target_mm).await
    }
}

fn step_target_mm(current_mm: f64, up: bool) -> f64 {
    let target = if up {
        current_mm + HEIGHT_STEP_MM
    } else {
        current_mm - HEIGHT_STEP_MM
    };
    units::clamp_mm(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DeskEvent, LogLevel};
    use crate::infrastructure::bluetooth::mock::MockTransport;
    use crate::infrastructure::bluetooth::protocol;
    use crate::infrastructure::notifier::ChannelNotifier;
    use tokio::sync::mpsc;

    fn service(
        transport: &Arc<MockTransport>,
    ) -> (DeskService<MockTransport>, mpsc::UnboundedReceiver<DeskEvent>) {
        let (notifier, rx) = ChannelNotifier::channel();
        let service =
            DeskService::new(transport.clone(), Arc::new(notifier), &DeskSettings::default())
                .unwrap();
        (service, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<DeskEvent>) -> Vec<DeskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn messages(events: &[DeskEvent], level: LogLevel) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                DeskEvent::Log(entry) if entry.level == level => Some(entry.message.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_step_target_is_clamped() {
        assert_eq!(step_target_mm(1265.0, true), 1270.0);
        assert_eq!(step_target_mm(625.0, false), 620.0);
        assert_eq!(step_target_mm(900.0, true), 910.0);
        assert_eq!(step_target_mm(900.0, false), 890.0);
    }

    #[test]
    fn test_invalid_identifier_fails_construction() {
        let transport = Arc::new(MockTransport::new());
        let settings = DeskSettings {
            move_char_uuid: "xyz".to_string(),
            ..DeskSettings::default()
        };
        let (notifier, _rx) = ChannelNotifier::channel();
        assert!(matches!(
            DeskService::new(transport, Arc::new(notifier), &settings),
            Err(DeskError::InvalidIdentifier { .. })
        ));
    }

    #[tokio::test]
    async fn test_startup_connects_and_reports_height() {
        let transport = Arc::new(MockTransport::with_desk_at(745.0));
        let (service, mut rx) = service(&transport);
        assert_eq!(service.check_connection(), ConnectionStatus::NotConnected);

        service.startup().await.unwrap();

        assert_eq!(service.check_connection(), ConnectionStatus::Connected);
        let events = drain(&mut rx);
        assert!(events.contains(&DeskEvent::Connection(ConnectionStatus::Connected)));
        assert!(events
            .iter()
            .any(|e| matches!(e, DeskEvent::Height(h) if (h - 745.0).abs() < 1e-6)));

        let info = messages(&events, LogLevel::Info);
        assert_eq!(info.first().map(String::as_str), Some("Bluetooth adapter enabled"));
        assert!(info.contains(&"Desk found: Desk 1234".to_string()));
        assert!(info.contains(&"Current height: 74.5 cm".to_string()));
    }

    #[tokio::test]
    async fn test_startup_without_desk_only_warns() {
        let transport = Arc::new(MockTransport::new());
        let (service, mut rx) = service(&transport);

        service.startup().await.unwrap();

        let events = drain(&mut rx);
        let warnings = messages(&events, LogLevel::Warn);
        assert_eq!(warnings[0], "No desk found");
        assert_eq!(warnings[1], "Auto-connect failed: desk not found");
        assert_eq!(service.check_connection(), ConnectionStatus::NotConnected);
    }

    #[tokio::test]
    async fn test_startup_fails_when_adapter_is_off() {
        let transport = Arc::new(MockTransport::with_desk_at(800.0));
        transport.fail_enable();
        let (service, mut rx) = service(&transport);

        assert!(matches!(
            service.startup().await,
            Err(DeskError::TransportUnavailable(_))
        ));
        assert_eq!(transport.scan_count(), 0);
        assert_eq!(
            messages(&drain(&mut rx), LogLevel::Error),
            vec!["Failed to enable Bluetooth: adapter unavailable".to_string()]
        );
    }

    #[tokio::test]
    async fn test_errors_are_logged_before_returning() {
        let transport = Arc::new(MockTransport::with_desk_at(800.0));
        let (service, mut rx) = service(&transport);

        assert!(service.move_to_height(1300.0).await.is_err());
        let errors = messages(&drain(&mut rx), LogLevel::Error);
        assert_eq!(errors, vec!["Target height 130.0 cm out of range (62 - 127 cm)"]);

        transport.override_payload(&[0x01]);
        assert!(service.get_height().await.is_err());
        let errors = messages(&drain(&mut rx), LogLevel::Error);
        assert_eq!(errors, vec!["Failed to read height: invalid payload: len=1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_up_near_top_clamps() {
        let transport = Arc::new(MockTransport::with_desk_at(1265.0));
        let (service, mut rx) = service(&transport);

        service.move_by_step(true).await.unwrap();

        let writes = transport.writes_to(DeskProfile::default().reference_uuid);
        assert_eq!(writes.last().unwrap(), &protocol::encode_target(1.27).to_vec());
        assert!((transport.height_mm() - 1270.0).abs() < 0.05);
        assert!(messages(&drain(&mut rx), LogLevel::Info)
            .contains(&"Moving up to 127.0 cm".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_down() {
        let transport = Arc::new(MockTransport::with_desk_at(900.0));
        let (service, _rx) = service(&transport);

        service.move_by_step(false).await.unwrap();
        assert!((transport.height_mm() - 890.0).abs() < 0.05);
        assert_eq!(service.get_height().await.unwrap().round(), 890.0);
    }

    #[tokio::test]
    async fn test_step_aborts_when_height_unreadable() {
        let transport = Arc::new(MockTransport::with_desk_at(900.0));
        transport.fail_reads(1);
        let (service, _rx) = service(&transport);

        assert!(matches!(
            service.move_by_step(true).await,
            Err(DeskError::TelemetryReadFailed(_))
        ));
        assert_eq!(transport.total_writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_motion_state() {
        let transport = Arc::new(MockTransport::with_desk_at(700.0));
        let (service, _rx) = service(&transport);
        let other = service.clone();

        let task = tokio::spawn(async move { other.move_to_height(1100.0).await });
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert!(service.is_moving());

        task.await.unwrap().unwrap();
        assert!(!service.is_moving());
        assert_eq!(service.check_connection(), ConnectionStatus::Connected);
    }
}
