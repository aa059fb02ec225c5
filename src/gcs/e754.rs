//! Typed command set for the PI E-754 digital piezo controller.
//!
//! The E-754 drives a single closed-loop piezo axis. Only the commands the
//! device server needs are wrapped here; everything else stays reachable
//! through [`E754::device`].

use std::time::Duration;

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tracing::{debug, info};

use super::{
    device::{parse_single_bool, parse_single_value, GcsDevice},
    error::{GcsError, GcsResult},
};

/// Parameter holding the on-target settling window, in position units.
pub const SETTLING_WINDOW_PARAM: u32 = 0x0700_0900;

/// `ERR?` code left behind by `HLT`.
const STOPPED_BY_COMMAND: i32 = 10;

pub struct E754<S = TcpStream> {
    device: GcsDevice<S>,
    axes: Vec<String>,
}

impl E754<TcpStream> {
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> GcsResult<Self> {
        let device = GcsDevice::connect((host, port), timeout).await?;
        Self::init(device).await
    }
}

impl<S> E754<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub async fn init(mut device: GcsDevice<S>) -> GcsResult<Self> {
        let idn = device.query("*IDN?").await?;
        info!("Connected to: {}", idn.trim());

        let response = device.query("SAI?").await?;
        let axes: Vec<String> = response
            .lines()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        debug!("Available axes: {:?}", axes);

        Ok(Self { device, axes })
    }

    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    pub async fn idn(&mut self) -> GcsResult<String> {
        let response = self.device.query("*IDN?").await?;
        Ok(response.trim().to_string())
    }

    pub async fn position(&mut self, axis: &str) -> GcsResult<f64> {
        let response = self.device.query(&format!("POS? {axis}")).await?;
        parse_single_value(&response)
    }

    /// Position commanded by the last `MOV`.
    pub async fn target(&mut self, axis: &str) -> GcsResult<f64> {
        let response = self.device.query(&format!("MOV? {axis}")).await?;
        parse_single_value(&response)
    }

    pub async fn move_to(&mut self, axis: &str, position: f64) -> GcsResult<()> {
        self.device.command(&format!("MOV {axis} {position}")).await
    }

    pub async fn velocity(&mut self, axis: &str) -> GcsResult<f64> {
        let response = self.device.query(&format!("VEL? {axis}")).await?;
        parse_single_value(&response)
    }

    pub async fn set_velocity(&mut self, axis: &str, velocity: f64) -> GcsResult<()> {
        self.device.command(&format!("VEL {axis} {velocity}")).await
    }

    pub async fn acceleration(&mut self, axis: &str) -> GcsResult<f64> {
        let response = self.device.query(&format!("ACC? {axis}")).await?;
        parse_single_value(&response)
    }

    pub async fn set_acceleration(&mut self, axis: &str, acceleration: f64) -> GcsResult<()> {
        self.device
            .command(&format!("ACC {axis} {acceleration}"))
            .await
    }

    pub async fn servo(&mut self, axis: &str) -> GcsResult<bool> {
        let response = self.device.query(&format!("SVO? {axis}")).await?;
        parse_single_bool(&response)
    }

    pub async fn set_servo(&mut self, axis: &str, enabled: bool) -> GcsResult<()> {
        let state = if enabled { 1 } else { 0 };
        self.device.command(&format!("SVO {axis} {state}")).await
    }

    pub async fn on_target(&mut self, axis: &str) -> GcsResult<bool> {
        let response = self.device.query(&format!("ONT? {axis}")).await?;
        parse_single_bool(&response)
    }

    pub async fn settling_window(&mut self, axis: &str) -> GcsResult<f64> {
        let response = self
            .device
            .query(&format!("SPA? {axis} {SETTLING_WINDOW_PARAM:#010X}"))
            .await?;
        parse_single_value(&response)
    }

    pub async fn set_settling_window(&mut self, axis: &str, window: f64) -> GcsResult<()> {
        self.device
            .command(&format!("SPA {axis} {SETTLING_WINDOW_PARAM:#010X} {window}"))
            .await
    }

    /// Stop the axis. The controller flags a halt with error 10, which is
    /// the expected outcome here rather than a failure.
    pub async fn halt(&mut self, axis: &str) -> GcsResult<()> {
        self.device.send(&format!("HLT {axis}")).await?;
        match self.device.last_error().await? {
            0 | STOPPED_BY_COMMAND => Ok(()),
            code => Err(GcsError::controller(code)),
        }
    }

    pub async fn last_error(&mut self) -> GcsResult<i32> {
        self.device.last_error().await
    }
}
