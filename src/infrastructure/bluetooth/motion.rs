//! Move Controller
//!
//! Drives the desk to a target height. The control box only keeps moving
//! while the reference input is rewritten, so the target is resent on every
//! poll tick until telemetry reports the desk at rest on target or the
//! deadline passes.
//!
//! ```text
//! validate ─► claim motion flag ─► connect ─► resolve ─► pre-check
//!                                                           │
//!                         already there ◄───────────────────┤
//!                                                           ▼
//!                                        prime (wakeup, stop)
//!                                                           │
//!                      ┌──── every poll interval ◄──────────┘
//!                      ▼
//!          write reference, read sample ─► arrived | keep polling | timed out
//! ```

use crate::domain::error::{DeskError, DeskResult};
use crate::domain::settings::DeskSettings;
use crate::domain::units::{self, MAX_HEIGHT_M, MIN_HEIGHT_M};
use crate::infrastructure::bluetooth::connection::ConnectionManager;
use crate::infrastructure::bluetooth::endpoints::EndpointResolver;
use crate::infrastructure::bluetooth::protocol::{self, PRIME_SEQUENCE};
use crate::infrastructure::bluetooth::state::{DeskLink, SharedState};
use crate::infrastructure::bluetooth::telemetry::TelemetryReader;
use crate::infrastructure::bluetooth::transport::BleTransport;
use crate::infrastructure::notifier::Events;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Offset below which the desk counts as already on target (2 mm)
const ALREADY_THERE_M: f64 = 0.002;

/// Offset below which a stopped desk has arrived (3 mm)
const ARRIVAL_M: f64 = 0.003;

#[derive(Debug, Clone, Copy)]
pub struct MotionTiming {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for MotionTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            timeout: Duration::from_secs(20),
        }
    }
}

impl From<&DeskSettings> for MotionTiming {
    fn from(settings: &DeskSettings) -> Self {
        Self {
            // A zero period would make the ticker panic
            poll_interval: settings.poll_interval().max(Duration::from_millis(1)),
            timeout: settings.move_timeout(),
        }
    }
}

struct MoveEndpoints<C> {
    command: C,
    reference: C,
    telemetry: C,
}

pub struct MoveController<T: BleTransport> {
    transport: Arc<T>,
    connection: Arc<ConnectionManager<T>>,
    resolver: Arc<EndpointResolver<T>>,
    telemetry: Arc<TelemetryReader<T>>,
    state: SharedState<T::Device>,
    events: Events,
    timing: MotionTiming,
}

impl<T: BleTransport> MoveController<T> {
    pub fn new(
        transport: Arc<T>,
        connection: Arc<ConnectionManager<T>>,
        resolver: Arc<EndpointResolver<T>>,
        telemetry: Arc<TelemetryReader<T>>,
        state: SharedState<T::Device>,
        events: Events,
        timing: MotionTiming,
    ) -> Self {
        Self {
            transport,
            connection,
            resolver,
            telemetry,
            state,
            events,
            timing,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.state.is_moving()
    }

    /// Move to `target_mm` and wait until the desk gets there.
    ///
    /// Only one move runs at a time; a second caller gets
    /// [`DeskError::AlreadyMoving`] without touching the radio.
    pub async fn move_to_height(&self, target_mm: f64) -> DeskResult<()> {
        let target_m = target_mm / 1000.0;
        if !units::in_range(target_m) {
            self.events.error(format!(
                "Target height {:.1} cm out of range ({:.0} - {:.0} cm)",
                target_mm / 10.0,
                MIN_HEIGHT_M * 100.0,
                MAX_HEIGHT_M * 100.0
            ));
            return Err(DeskError::OutOfRange { target_mm });
        }

        let Some(_motion) = self.state.try_begin_motion() else {
            self.events.warn("Desk is already moving");
            return Err(DeskError::AlreadyMoving);
        };

        let link = self.connection.get_or_connect().await?;
        let endpoints = match self.resolve(&link).await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                if e.is_link_failure() {
                    self.connection.invalidate(&link, &e);
                }
                self.events
                    .error(format!("Characteristics not found: {}", e));
                return Err(e);
            }
        };

        match self.telemetry.sample(&endpoints.telemetry).await {
            Ok(sample) if (sample.position_meters - target_m).abs() < ALREADY_THERE_M => {
                self.events.height(sample.height_mm());
                self.events.info("Already at target height");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => debug!("Pre-move height check failed: {}", e),
        }

        self.prime(&endpoints.command).await;
        self.drive(&link, &endpoints, target_mm, target_m).await
    }

    async fn resolve(
        &self,
        link: &DeskLink<T::Device>,
    ) -> DeskResult<MoveEndpoints<T::Characteristic>> {
        let motion = self.resolver.motion(&link.device).await?;
        let telemetry = self.resolver.telemetry(&link.device).await?;
        Ok(MoveEndpoints {
            command: motion.command,
            reference: motion.reference,
            telemetry,
        })
    }

    /// Wake the control box. Best effort: failures are logged, not returned.
    async fn prime(&self, command: &T::Characteristic) {
        for step in PRIME_SEQUENCE {
            if let Err(e) = self
                .transport
                .write_without_response(command, step.as_bytes())
                .await
            {
                warn!("{:?} command not delivered: {}", step, e);
            }
        }
    }

    async fn drive(
        &self,
        link: &DeskLink<T::Device>,
        endpoints: &MoveEndpoints<T::Characteristic>,
        target_mm: f64,
        target_m: f64,
    ) -> DeskResult<()> {
        let payload = protocol::encode_target(target_m);
        let start = Instant::now();
        let deadline = start + self.timing.timeout;
        let period = self.timing.poll_interval;
        let mut ticker = time::interval_at(start + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_failure: Option<DeskError> = None;
        loop {
            tokio::select! {
                biased;
                _ = time::sleep_until(deadline) => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self
                .transport
                .write_without_response(&endpoints.reference, &payload)
                .await
            {
                debug!("Reference write failed: {}", e);
            }

            match self.telemetry.sample(&endpoints.telemetry).await {
                Ok(sample) => {
                    last_failure = None;
                    self.events.height(sample.height_mm());
                    if sample.is_stopped()
                        && (sample.position_meters - target_m).abs() < ARRIVAL_M
                    {
                        self.events
                            .info(format!("Target height {:.1} cm reached", target_mm / 10.0));
                        return Ok(());
                    }
                }
                Err(e) => {
                    debug!("Skipping failed sample: {}", e);
                    last_failure = Some(e);
                }
            }
        }

        // Still failing when time ran out: the desk is probably gone
        if let Some(e) = last_failure.filter(DeskError::is_link_failure) {
            self.connection.invalidate(link, &e);
        }
        self.events.error("Timeout: target height not reached");
        Err(DeskError::MoveTimedOut)
    }
}
