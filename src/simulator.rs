//! Software stand-in for a single-axis E-754.
//!
//! Speaks enough GCS over TCP for the device server to run against it:
//! identification, position/target, velocity, acceleration, servo,
//! on-target, the settling-window parameter, halt and the error register.
//! Motion is a linear ramp from the start position toward the target.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::{
    net::{TcpListener, TcpStream, ToSocketAddrs},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info};

use crate::gcs::e754::SETTLING_WINDOW_PARAM;

const ERR_SYNTAX: i32 = 1;
const ERR_UNKNOWN_COMMAND: i32 = 2;
const ERR_MOVE_WITHOUT_SERVO: i32 = 5;
const ERR_PARAM_OUT_OF_RANGE: i32 = 6;
const ERR_POS_OUT_OF_LIMITS: i32 = 7;
const ERR_VEL_OUT_OF_LIMITS: i32 = 8;
const ERR_STOPPED: i32 = 10;
const ERR_INVALID_AXIS: i32 = 15;
const ERR_UNKNOWN_PARAM: i32 = 54;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub axis: String,
    pub initial_position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub settling_window: f64,
    pub travel: (f64, f64),
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            axis: "1".to_string(),
            initial_position: 50.0,
            velocity: 1000.0,
            acceleration: 10000.0,
            settling_window: 0.01,
            travel: (0.0, 100.0),
        }
    }
}

#[derive(Debug)]
pub struct SimulatedAxis {
    config: SimulatorConfig,
    origin: f64,
    target: f64,
    started: Instant,
    velocity: f64,
    acceleration: f64,
    settling_window: f64,
    servo: bool,
    error: i32,
    lines: u64,
}

impl SimulatedAxis {
    fn new(config: SimulatorConfig) -> Self {
        Self {
            origin: config.initial_position,
            target: config.initial_position,
            started: Instant::now(),
            velocity: config.velocity,
            acceleration: config.acceleration,
            settling_window: config.settling_window,
            servo: false,
            error: 0,
            lines: 0,
            config,
        }
    }

    pub fn position(&self) -> f64 {
        let travelled = self.velocity * self.started.elapsed().as_secs_f64();
        let remaining = self.target - self.origin;
        if travelled >= remaining.abs() {
            self.target
        } else {
            self.origin + travelled * remaining.signum()
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn servo(&self) -> bool {
        self.servo
    }

    pub fn settling_window(&self) -> f64 {
        self.settling_window
    }

    pub fn on_target(&self) -> bool {
        self.servo && (self.target - self.position()).abs() <= self.settling_window
    }

    /// GCS lines received so far.
    pub fn lines_handled(&self) -> u64 {
        self.lines
    }

    /// Latch an error code as if the controller had raised it.
    pub fn inject_error(&mut self, code: i32) {
        self.error = code;
    }

    fn freeze(&mut self) {
        let here = self.position();
        self.origin = here;
        self.target = here;
        self.started = Instant::now();
    }

    fn start_move(&mut self, target: f64) {
        self.origin = self.position();
        self.target = target;
        self.started = Instant::now();
    }

    fn raise(&mut self, code: i32) {
        if self.error == 0 {
            self.error = code;
        }
    }

    fn check_axis(&mut self, axis: &str) -> bool {
        if axis == self.config.axis {
            true
        } else {
            self.raise(ERR_INVALID_AXIS);
            false
        }
    }

    /// Apply one GCS line; returns the answer for queries.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        self.lines += 1;
        let mut parts = line.split_whitespace();
        let command = parts.next()?;
        let args: Vec<&str> = parts.collect();
        let axis = self.config.axis.clone();

        match command {
            "*IDN?" => Some(
                "(c)2024 Physik Instrumente (PI) GmbH & Co. KG, E-754.1CD, 0000000000, simulated"
                    .to_string(),
            ),
            "SAI?" => Some(axis),
            "ERR?" => {
                let code = self.error;
                self.error = 0;
                Some(code.to_string())
            }
            "POS?" => self.query_value(&args, |ax| ax.position()),
            "MOV?" => self.query_value(&args, |ax| ax.target),
            "VEL?" => self.query_value(&args, |ax| ax.velocity),
            "ACC?" => self.query_value(&args, |ax| ax.acceleration),
            "SVO?" => self.query_value(&args, |ax| if ax.servo { 1.0 } else { 0.0 }),
            "ONT?" => self.query_value(&args, |ax| if ax.on_target() { 1.0 } else { 0.0 }),
            "MOV" => {
                if let Some(target) = self.parse_setter(&args) {
                    let (min, max) = self.config.travel;
                    if !self.servo {
                        self.raise(ERR_MOVE_WITHOUT_SERVO);
                    } else if target < min || target > max {
                        self.raise(ERR_POS_OUT_OF_LIMITS);
                    } else {
                        self.start_move(target);
                    }
                }
                None
            }
            "VEL" => {
                if let Some(velocity) = self.parse_setter(&args) {
                    if velocity <= 0.0 {
                        self.raise(ERR_VEL_OUT_OF_LIMITS);
                    } else {
                        let target = self.target;
                        self.start_move(target);
                        self.velocity = velocity;
                    }
                }
                None
            }
            "ACC" => {
                if let Some(acceleration) = self.parse_setter(&args) {
                    if acceleration <= 0.0 {
                        self.raise(ERR_PARAM_OUT_OF_RANGE);
                    } else {
                        self.acceleration = acceleration;
                    }
                }
                None
            }
            "SVO" => {
                if let Some(state) = self.parse_setter(&args) {
                    self.freeze();
                    self.servo = state != 0.0;
                }
                None
            }
            "HLT" => {
                let valid = match args.as_slice() {
                    [] => true,
                    [ax] => self.check_axis(ax),
                    _ => {
                        self.raise(ERR_SYNTAX);
                        false
                    }
                };
                if valid {
                    self.freeze();
                    self.raise(ERR_STOPPED);
                }
                None
            }
            "SPA?" => match args.as_slice() {
                [ax, param] if self.check_axis(ax) => {
                    if is_settling_window(param) {
                        Some(format!("{ax} {param}={}", self.settling_window))
                    } else {
                        self.raise(ERR_UNKNOWN_PARAM);
                        None
                    }
                }
                [_, _] => None,
                _ => {
                    self.raise(ERR_SYNTAX);
                    None
                }
            },
            "SPA" => {
                match args.as_slice() {
                    [ax, param, value] if self.check_axis(ax) => {
                        match (is_settling_window(param), value.parse::<f64>()) {
                            (false, _) => self.raise(ERR_UNKNOWN_PARAM),
                            (true, Ok(window)) if window >= 0.0 => self.settling_window = window,
                            (true, Ok(_)) => self.raise(ERR_PARAM_OUT_OF_RANGE),
                            (true, Err(_)) => self.raise(ERR_SYNTAX),
                        }
                    }
                    [_, _, _] => {}
                    _ => self.raise(ERR_SYNTAX),
                }
                None
            }
            _ => {
                self.raise(ERR_UNKNOWN_COMMAND);
                None
            }
        }
    }

    fn query_value(&mut self, args: &[&str], value: impl Fn(&Self) -> f64) -> Option<String> {
        match args {
            [] => Some(format!("{}={}", self.config.axis, value(self))),
            [ax] if self.check_axis(ax) => Some(format!("{ax}={}", value(self))),
            [_] => None,
            _ => {
                self.raise(ERR_SYNTAX);
                None
            }
        }
    }

    fn parse_setter(&mut self, args: &[&str]) -> Option<f64> {
        match args {
            [ax, value] => {
                if !self.check_axis(ax) {
                    return None;
                }
                match value.parse() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        self.raise(ERR_SYNTAX);
                        None
                    }
                }
            }
            _ => {
                self.raise(ERR_SYNTAX);
                None
            }
        }
    }
}

fn is_settling_window(param: &str) -> bool {
    let digits = param
        .strip_prefix("0x")
        .or_else(|| param.strip_prefix("0X"))
        .unwrap_or(param);
    u32::from_str_radix(digits, 16).ok() == Some(SETTLING_WINDOW_PARAM)
}

pub type SimulatorHandle = Arc<Mutex<SimulatedAxis>>;

pub struct Simulator {
    listener: TcpListener,
    axis: SimulatorHandle,
}

impl Simulator {
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: SimulatorConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            axis: Arc::new(Mutex::new(SimulatedAxis::new(config))),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> SimulatorHandle {
        self.axis.clone()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                error!("Simulator stopped: {}", e);
            }
        })
    }

    pub async fn run(self) -> Result<()> {
        info!("E-754 simulator listening on: {}", self.listener.local_addr()?);

        loop {
            let (stream, addr) = self.listener.accept().await?;
            debug!("Simulator client connected: {}", addr);

            let axis = self.axis.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_client(stream, axis).await {
                    error!("Simulator client error: {}", e);
                }
                debug!("Simulator client disconnected: {}", addr);
            });
        }
    }

    async fn handle_client(stream: TcpStream, axis: SimulatorHandle) -> Result<()> {
        let mut framed = Framed::new(stream, LinesCodec::new());

        while let Some(line) = framed.next().await {
            let line = line?;
            let reply = lock(&axis).handle_line(line.trim());
            if let Some(reply) = reply {
                framed.send(reply).await?;
            }
        }

        Ok(())
    }
}

pub fn lock(axis: &SimulatorHandle) -> MutexGuard<'_, SimulatedAxis> {
    axis.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
