use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{
    attribute::{Attribute, AttributeValue},
    config::DeviceConfig,
    frame::CoordinateFrame,
    movement_parameters::MovementParams,
    state::AxisState,
    state_info::AxisStateInfo,
    Axis,
};
use crate::gcs::{error::describe, GcsError, E754};

/// Values seen on the last successful reads, user frame unless noted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Readings {
    pub position: f64,
    pub dial_position: f64,
    pub target: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub servo_on: bool,
    pub on_target: bool,
    pub pos_error: f64,
    pub pos_tolerance: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Memorized {
    servo_on: Option<bool>,
    pos_tolerance: Option<f64>,
}

struct Inner {
    driver: Option<E754>,
    readings: Readings,
    fault: Option<String>,
    /// Set by an acknowledge, cleared by the next operation.
    acknowledged: bool,
    memorized: Memorized,
}

impl Inner {
    /// Latch the fault and log it. Returns the status text.
    ///
    /// The first fault wins until acknowledged. A broken link is dropped:
    /// after a timeout the stream may still carry a late answer, so only a
    /// fresh `init` can be trusted again.
    fn set_fault(&mut self, context: &str, err: &anyhow::Error) -> String {
        let message = format!("{context}: {err:#}");
        error!("{}", message);
        let held = self.fault.get_or_insert(message).clone();

        let link_lost = err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<GcsError>(), Some(e) if e.is_transport()));
        if link_lost && self.driver.take().is_some() {
            warn!("Dropped controller connection, init is required to reconnect");
        }
        held
    }

    fn record<T>(&mut self, context: &str, result: Result<T>) -> Result<T> {
        self.acknowledged = false;
        if let Err(e) = &result {
            if self.driver.is_none() && self.fault.is_some() {
                debug!("{}: {:#}", context, e);
            } else {
                self.set_fault(context, e);
            }
        }
        result
    }
}

const READY: &str = "Device is ready";

/// A single E-754 axis reached over GCS/TCP.
///
/// Every controller failure flips the device into `Fault` until
/// [`Axis::acknowledge_error`] or a successful [`Axis::init`].
pub struct PiE754Axis {
    config: DeviceConfig,
    frame: CoordinateFrame,
    inner: Mutex<Inner>,
}

impl PiE754Axis {
    pub fn new(config: DeviceConfig) -> Self {
        let memorized = Memorized {
            servo_on: config.servo_on,
            pos_tolerance: config.pos_tolerance,
        };
        Self {
            frame: config.frame(),
            inner: Mutex::new(Inner {
                driver: None,
                readings: Readings::default(),
                fault: None,
                acknowledged: false,
                memorized,
            }),
            config,
        }
    }

    pub async fn readings(&self) -> Readings {
        self.inner.lock().await.readings
    }

    async fn connect(&self, inner: &mut Inner) -> Result<String> {
        let axis = self.name();
        let host = &self.config.ctrl_host;
        let port = self.config.ctrl_port;

        let mut driver = E754::connect(host, port, self.config.timeout())
            .await
            .with_context(|| format!("Cannot reach controller at {host}:{port}"))?;

        if !driver.axes().iter().any(|a| a == axis) {
            bail!(
                "Axis {} not found on controller (available: {:?})",
                axis,
                driver.axes()
            );
        }

        let idn = driver.idn().await?;

        if let Some(servo_on) = inner.memorized.servo_on {
            debug!("Restoring memorized ServoOn={}", servo_on);
            driver.set_servo(axis, servo_on).await?;
        }
        if let Some(tolerance) = inner.memorized.pos_tolerance {
            debug!("Restoring memorized PosTolerance={}", tolerance);
            driver.set_settling_window(axis, tolerance).await?;
        }

        inner.readings = Readings::default();
        inner.driver = Some(driver);
        Ok(idn)
    }

    async fn poll_state(&self, inner: &mut Inner) -> Result<AxisStateInfo> {
        let axis = self.name();
        let Inner {
            driver,
            readings,
            fault,
            ..
        } = inner;
        let driver = driver.as_mut().ok_or_else(|| not_connected(fault))?;

        readings.servo_on = driver.servo(axis).await?;
        readings.on_target = driver.on_target(axis).await?;

        Ok(AxisStateInfo::from_readings(
            readings.servo_on,
            readings.on_target,
        ))
    }

    async fn read_from(&self, inner: &mut Inner, attribute: Attribute) -> Result<AttributeValue> {
        let axis = self.name();
        let Inner {
            driver,
            readings,
            fault,
            ..
        } = inner;
        let driver = driver.as_mut().ok_or_else(|| not_connected(fault))?;

        let value: AttributeValue = match attribute {
            Attribute::Position | Attribute::DialPosition => {
                let dial = driver.position(axis).await?;
                readings.dial_position = dial;
                readings.position = self.frame.to_user(dial);
                if attribute == Attribute::Position {
                    readings.position.into()
                } else {
                    dial.into()
                }
            }
            Attribute::Velocity => {
                readings.velocity = driver.velocity(axis).await?;
                readings.velocity.into()
            }
            Attribute::Acceleration => {
                readings.acceleration = driver.acceleration(axis).await?;
                readings.acceleration.into()
            }
            Attribute::OnTarget => {
                readings.on_target = driver.on_target(axis).await?;
                readings.on_target.into()
            }
            Attribute::ServoOn => {
                readings.servo_on = driver.servo(axis).await?;
                readings.servo_on.into()
            }
            Attribute::PosError => {
                let target = driver.target(axis).await?;
                let dial = driver.position(axis).await?;
                readings.target = self.frame.to_user(target);
                readings.dial_position = dial;
                readings.position = self.frame.to_user(dial);
                readings.pos_error = self.frame.error_to_user(target - dial);
                readings.pos_error.into()
            }
            Attribute::PosTolerance => {
                readings.pos_tolerance = driver.settling_window(axis).await?;
                readings.pos_tolerance.into()
            }
        };

        Ok(value)
    }

    async fn write_to(
        &self,
        inner: &mut Inner,
        attribute: Attribute,
        value: AttributeValue,
    ) -> Result<()> {
        let axis = self.name();
        let Inner {
            driver,
            readings,
            fault,
            memorized,
            ..
        } = inner;
        let driver = driver.as_mut().ok_or_else(|| not_connected(fault))?;

        match attribute {
            Attribute::Position => {
                let user = number(attribute, value)?;
                let dial = self.frame.to_dial(user);
                debug!("Position {} -> dial {}", user, dial);
                driver.move_to(axis, dial).await?;
                readings.target = user;
            }
            Attribute::DialPosition => {
                let dial = number(attribute, value)?;
                driver.move_to(axis, dial).await?;
                readings.target = self.frame.to_user(dial);
            }
            Attribute::Velocity => {
                driver.set_velocity(axis, number(attribute, value)?).await?;
            }
            Attribute::Acceleration => {
                driver
                    .set_acceleration(axis, number(attribute, value)?)
                    .await?;
            }
            Attribute::ServoOn => {
                let enabled = value
                    .as_bool()
                    .ok_or_else(|| anyhow!("{} expects a boolean", attribute))?;
                driver.set_servo(axis, enabled).await?;
                memorized.servo_on = Some(enabled);
            }
            Attribute::PosTolerance => {
                let tolerance = number(attribute, value)?;
                driver.set_settling_window(axis, tolerance).await?;
                memorized.pos_tolerance = Some(tolerance);
            }
            Attribute::OnTarget | Attribute::PosError => {
                bail!("Attribute {} is read-only", attribute)
            }
        }

        Ok(())
    }

    async fn move_to(
        &self,
        inner: &mut Inner,
        target: f64,
        params: Option<MovementParams>,
    ) -> Result<()> {
        let axis = self.name();
        let Inner {
            driver,
            readings,
            fault,
            ..
        } = inner;
        let driver = driver.as_mut().ok_or_else(|| not_connected(fault))?;

        if let Some(params) = params {
            if let Some(velocity) = params.velocity {
                driver.set_velocity(axis, velocity).await?;
            }
            if let Some(acceleration) = params.acceleration {
                driver.set_acceleration(axis, acceleration).await?;
            }
        }

        let dial = self.frame.to_dial(target);
        info!("Moving axis {} to {} (dial {})", axis, target, dial);
        driver.move_to(axis, dial).await?;
        readings.target = target;
        Ok(())
    }
}

/// Without a link, a held fault explains why better than a generic message.
fn not_connected(fault: &Option<String>) -> anyhow::Error {
    match fault {
        Some(message) => anyhow!("{}", message),
        None => anyhow!("Not connected to controller"),
    }
}

fn number(attribute: Attribute, value: AttributeValue) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| anyhow!("{} expects a number", attribute))
}

#[async_trait::async_trait]
impl Axis for PiE754Axis {
    fn name(&self) -> &str {
        &self.config.axis_name
    }

    async fn init(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.driver = None;
        inner.acknowledged = false;

        let result = self.connect(&mut inner).await;
        if let Ok(idn) = &result {
            inner.fault = None;
            info!(
                "Axis {} attached to {}:{} ({})",
                self.name(),
                self.config.ctrl_host,
                self.config.ctrl_port,
                idn
            );
        }
        inner.record("Initialisation failed", result).map(|_| ())
    }

    async fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.driver.take().is_some() {
            info!("Axis {} detached from controller", self.name());
        }
        Ok(())
    }

    async fn start(&self, target: f64, params: Option<MovementParams>) -> Result<()> {
        if !target.is_finite() {
            bail!("Invalid target position: {}", target);
        }

        let mut inner = self.inner.lock().await;
        let result = self.move_to(&mut inner, target, params).await;
        inner.record("Move failed", result)
    }

    async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let axis = self.name();
        let result = match inner.driver.as_mut() {
            Some(driver) => driver.halt(axis).await.map_err(anyhow::Error::from),
            None => Err(not_connected(&inner.fault)),
        };
        if result.is_ok() {
            info!("Axis {} halted", axis);
        }
        inner.record("Stop failed", result)
    }

    async fn get_state(&self) -> Result<AxisStateInfo> {
        let mut inner = self.inner.lock().await;

        if let Some(message) = &inner.fault {
            return Ok(AxisStateInfo::fault(message.clone()));
        }
        if inner.driver.is_none() {
            return Ok(AxisStateInfo::new(AxisState::Init));
        }

        match self.poll_state(&mut inner).await {
            Ok(info) if inner.acknowledged => Ok(info.with_message(READY)),
            Ok(info) => Ok(info),
            Err(e) => Ok(AxisStateInfo::fault(
                inner.set_fault("Failed to read state", &e),
            )),
        }
    }

    async fn read_attribute(&self, attribute: Attribute) -> Result<AttributeValue> {
        let mut inner = self.inner.lock().await;
        let result = self.read_from(&mut inner, attribute).await;
        inner.record(&format!("Failed to read {attribute}"), result)
    }

    async fn write_attribute(&self, attribute: Attribute, value: AttributeValue) -> Result<()> {
        attribute.check_write(&value)?;

        let mut inner = self.inner.lock().await;
        let result = self.write_to(&mut inner, attribute, value).await;
        inner.record(&format!("Failed to write {attribute}"), result)
    }

    async fn idn(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let result = match inner.driver.as_mut() {
            Some(driver) => driver.idn().await.map_err(anyhow::Error::from),
            None => Err(not_connected(&inner.fault)),
        };
        inner.record("Failed to read IDN", result)
    }

    async fn get_error(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let result = match inner.driver.as_mut() {
            Some(driver) => driver
                .last_error()
                .await
                .map(|code| format!("{}: {}", code, describe(code)))
                .map_err(anyhow::Error::from),
            None => Err(not_connected(&inner.fault)),
        };
        inner.record("Failed to read error register", result)
    }

    async fn acknowledge_error(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if let Some(driver) = inner.driver.as_mut() {
            match driver.last_error().await {
                Ok(0) => {}
                Ok(code) => info!("Cleared controller error {}: {}", code, describe(code)),
                Err(e) => warn!("Could not read controller error register: {}", e),
            }
        }

        if let Some(previous) = inner.fault.take() {
            info!("Fault acknowledged: {}", previous);
        }
        inner.acknowledged = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        axis::frame::Sign,
        simulator::{lock, Simulator, SimulatorConfig, SimulatorHandle},
    };

    async fn attach(configure: impl FnOnce(&mut DeviceConfig)) -> (PiE754Axis, SimulatorHandle) {
        let simulator = Simulator::bind(
            "127.0.0.1:0",
            SimulatorConfig {
                velocity: 1.0e6,
                ..SimulatorConfig::default()
            },
        )
        .await
        .unwrap();
        let addr = simulator.local_addr().unwrap();
        let handle = simulator.handle();
        simulator.spawn();

        let mut config = DeviceConfig::new("1");
        config.ctrl_host = "127.0.0.1".to_string();
        config.ctrl_port = addr.port();
        config.timeout_ms = 2000;
        configure(&mut config);

        (PiE754Axis::new(config), handle)
    }

    async fn wait_on_target(axis: &PiE754Axis) {
        for _ in 0..200 {
            let on_target = axis.read_attribute(Attribute::OnTarget).await.unwrap();
            if on_target == AttributeValue::Bool(true) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("axis never reached its target");
    }

    #[tokio::test]
    async fn test_init_reports_state_from_hardware() {
        let (axis, _sim) = attach(|_| {}).await;
        assert_eq!(axis.get_state().await.unwrap().state, AxisState::Init);

        axis.init().await.unwrap();
        assert!(axis.idn().await.unwrap().contains("E-754"));
        assert_eq!(axis.get_state().await.unwrap().state, AxisState::Off);
    }

    #[tokio::test]
    async fn test_memorized_values_are_restored_on_init() {
        let (axis, sim) = attach(|config| {
            config.servo_on = Some(true);
            config.pos_tolerance = Some(0.5);
        })
        .await;

        axis.init().await.unwrap();

        assert!(lock(&sim).servo());
        assert_eq!(lock(&sim).settling_window(), 0.5);
        assert!(axis.get_state().await.unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_position_write_goes_through_frame() {
        let (axis, sim) = attach(|config| {
            config.offset = -50.0;
            config.servo_on = Some(true);
        })
        .await;
        axis.init().await.unwrap();

        axis.write_attribute(Attribute::Position, 10.0.into())
            .await
            .unwrap();
        assert_eq!(lock(&sim).target(), 60.0);
        assert_eq!(axis.readings().await.target, 10.0);

        wait_on_target(&axis).await;
        assert_eq!(
            axis.read_attribute(Attribute::Position).await.unwrap(),
            AttributeValue::Double(10.0)
        );
        assert_eq!(
            axis.read_attribute(Attribute::DialPosition).await.unwrap(),
            AttributeValue::Double(60.0)
        );
        assert_eq!(
            axis.read_attribute(Attribute::PosError).await.unwrap(),
            AttributeValue::Double(0.0)
        );
    }

    #[tokio::test]
    async fn test_negative_sign_inverts_user_frame() {
        let (axis, sim) = attach(|config| {
            config.offset = 0.0;
            config.sign = Sign::Negative;
            config.servo_on = Some(true);
        })
        .await;
        axis.init().await.unwrap();

        axis.start(-30.0, Some(MovementParams::new().with_velocity(2.0e6)))
            .await
            .unwrap();
        assert_eq!(lock(&sim).target(), 30.0);

        wait_on_target(&axis).await;
        assert_eq!(
            axis.read_attribute(Attribute::Position).await.unwrap(),
            AttributeValue::Double(-30.0)
        );
        assert_eq!(
            axis.read_attribute(Attribute::Velocity).await.unwrap(),
            AttributeValue::Double(2.0e6)
        );
    }

    #[tokio::test]
    async fn test_controller_error_faults_until_acknowledged() {
        let (axis, _sim) = attach(|_| {}).await;
        axis.init().await.unwrap();

        let err = axis
            .write_attribute(Attribute::Position, 55.0.into())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Controller error 5"));

        let state = axis.get_state().await.unwrap();
        assert!(state.is_faulted());
        assert!(state.status.contains("Failed to write Position"));

        axis.acknowledge_error().await.unwrap();
        let state = axis.get_state().await.unwrap();
        assert_eq!(state.state, AxisState::Off);
        assert_eq!(state.status, "Device is ready");

        axis.read_attribute(Attribute::ServoOn).await.unwrap();
        assert_eq!(axis.get_state().await.unwrap().status, "Servo is off");
    }

    #[tokio::test]
    async fn test_read_only_write_sends_nothing() {
        let (axis, sim) = attach(|_| {}).await;
        axis.init().await.unwrap();
        let before = lock(&sim).lines_handled();

        assert!(axis
            .write_attribute(Attribute::OnTarget, true.into())
            .await
            .is_err());
        assert!(axis
            .write_attribute(Attribute::PosError, 1.0.into())
            .await
            .is_err());
        assert!(axis
            .write_attribute(Attribute::ServoOn, 1.0.into())
            .await
            .is_err());

        assert_eq!(lock(&sim).lines_handled(), before);
        assert!(!axis.get_state().await.unwrap().is_faulted());
    }

    #[tokio::test]
    async fn test_servo_write_is_memorized_across_reinit() {
        let (axis, sim) = attach(|_| {}).await;
        axis.init().await.unwrap();

        axis.write_attribute(Attribute::ServoOn, true.into())
            .await
            .unwrap();
        lock(&sim).handle_line("SVO 1 0");

        axis.init().await.unwrap();
        assert!(lock(&sim).servo());
    }

    #[tokio::test]
    async fn test_stop_tolerates_halt_error() {
        let (axis, _sim) = attach(|config| config.servo_on = Some(true)).await;
        axis.init().await.unwrap();

        axis.stop().await.unwrap();
        assert!(!axis.get_state().await.unwrap().is_faulted());
        assert_eq!(axis.get_error().await.unwrap(), "0: No error");
    }

    #[tokio::test]
    async fn test_latched_controller_error_surfaces_on_next_read() {
        let (axis, sim) = attach(|_| {}).await;
        axis.init().await.unwrap();

        lock(&sim).inject_error(7);
        assert_eq!(axis.get_error().await.unwrap(), "7: Position out of limits");

        lock(&sim).inject_error(6);
        assert!(axis.read_attribute(Attribute::Velocity).await.is_err());
        assert!(axis.get_state().await.unwrap().is_faulted());
    }

    #[tokio::test]
    async fn test_lost_link_requires_init() {
        use futures::{SinkExt, StreamExt};
        use tokio_util::codec::{Framed, LinesCodec};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, LinesCodec::new());
            // *IDN?, SAI? and *IDN? again, each followed by ERR?; then hang up.
            for reply in ["PI E-754", "0", "1", "0", "PI E-754", "0"] {
                framed.next().await;
                framed.send(reply).await.unwrap();
            }
        });

        let mut config = DeviceConfig::new("1");
        config.ctrl_host = "127.0.0.1".to_string();
        config.ctrl_port = port;
        config.timeout_ms = 500;
        let axis = PiE754Axis::new(config);
        axis.init().await.unwrap();

        assert!(axis.read_attribute(Attribute::Position).await.is_err());
        assert!(axis.get_state().await.unwrap().is_faulted());

        axis.acknowledge_error().await.unwrap();
        assert_eq!(axis.get_state().await.unwrap().state, AxisState::Init);
    }

    #[tokio::test]
    async fn test_unreachable_controller_faults_init() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = DeviceConfig::new("1");
        config.ctrl_host = "127.0.0.1".to_string();
        config.ctrl_port = port;
        config.timeout_ms = 500;
        let axis = PiE754Axis::new(config);

        assert!(axis.init().await.is_err());
        let state = axis.get_state().await.unwrap();
        assert!(state.is_faulted());
        assert!(state.status.contains("Cannot reach controller"));
    }

    #[tokio::test]
    async fn test_requests_after_failed_init_report_init_fault() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = DeviceConfig::new("1");
        config.ctrl_host = "127.0.0.1".to_string();
        config.ctrl_port = port;
        config.timeout_ms = 500;
        let axis = PiE754Axis::new(config);
        assert!(axis.init().await.is_err());

        let err = axis.read_attribute(Attribute::Position).await.unwrap_err();
        assert!(err.to_string().contains("Cannot reach controller"));
        assert!(axis.stop().await.is_err());

        let state = axis.get_state().await.unwrap();
        assert!(state.is_faulted());
        assert!(state.status.starts_with("Initialisation failed"));
        assert!(state.status.contains("Cannot reach controller"));
    }

    #[tokio::test]
    async fn test_first_fault_is_kept_until_acknowledged() {
        let (axis, sim) = attach(|_| {}).await;
        axis.init().await.unwrap();

        lock(&sim).inject_error(6);
        assert!(axis.read_attribute(Attribute::Velocity).await.is_err());
        lock(&sim).inject_error(7);
        assert!(axis.read_attribute(Attribute::Velocity).await.is_err());

        let status = axis.get_state().await.unwrap().status;
        assert!(status.contains("Controller error 6"));

        axis.acknowledge_error().await.unwrap();
        assert!(!axis.get_state().await.unwrap().is_faulted());
    }

    #[tokio::test]
    async fn test_unknown_axis_faults_init() {
        let (axis, _sim) = attach(|config| config.axis_name = "2".to_string()).await;
        let err = axis.init().await.unwrap_err();
        assert!(err.to_string().contains("Axis 2 not found"));
    }
}
