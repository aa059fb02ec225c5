//! In-memory axis for exercising the layers above [`Axis`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{bail, Result};
use tokio::sync::RwLock;

use super::{
    attribute::{Attribute, AttributeValue},
    movement_parameters::MovementParams,
    state::AxisState,
    state_info::AxisStateInfo,
    Axis,
};

pub struct MockAxis {
    name: String,
    position: RwLock<f64>,
    servo_on: RwLock<bool>,
    fault: RwLock<Option<String>>,
    reads: AtomicUsize,
    link_lost: AtomicBool,
}

impl MockAxis {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            position: RwLock::new(0.0),
            servo_on: RwLock::new(true),
            fault: RwLock::new(None),
            reads: AtomicUsize::new(0),
            link_lost: AtomicBool::new(false),
        }
    }

    /// Number of attribute reads that reached the axis.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Fail every later read and latch a fault, as a dropped link would.
    pub async fn lose_link(&self) {
        self.link_lost.store(true, Ordering::SeqCst);
        *self.fault.write().await = Some("Connection closed by controller".to_string());
    }
}

#[async_trait::async_trait]
impl Axis for MockAxis {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<()> {
        *self.fault.write().await = None;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn start(&self, target: f64, _params: Option<MovementParams>) -> Result<()> {
        if !*self.servo_on.read().await {
            *self.fault.write().await = Some("servo is off".to_string());
            bail!("servo is off");
        }
        *self.position.write().await = target;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn get_state(&self) -> Result<AxisStateInfo> {
        if let Some(message) = self.fault.read().await.clone() {
            return Ok(AxisStateInfo::fault(message));
        }
        if *self.servo_on.read().await {
            Ok(AxisStateInfo::new(AxisState::On))
        } else {
            Ok(AxisStateInfo::new(AxisState::Off))
        }
    }

    async fn read_attribute(&self, attribute: Attribute) -> Result<AttributeValue> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.link_lost.load(Ordering::SeqCst) {
            bail!("Connection closed by controller");
        }
        match attribute {
            Attribute::Position | Attribute::DialPosition => {
                Ok((*self.position.read().await).into())
            }
            Attribute::ServoOn => Ok((*self.servo_on.read().await).into()),
            Attribute::OnTarget => Ok(true.into()),
            _ => Ok(0.0.into()),
        }
    }

    async fn write_attribute(&self, attribute: Attribute, value: AttributeValue) -> Result<()> {
        attribute.check_write(&value)?;
        match (attribute, value) {
            (Attribute::Position, AttributeValue::Double(v)) => self.start(v, None).await,
            (Attribute::ServoOn, AttributeValue::Bool(on)) => {
                *self.servo_on.write().await = on;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn idn(&self) -> Result<String> {
        Ok("mock E-754".to_string())
    }

    async fn get_error(&self) -> Result<String> {
        Ok("0: No error".to_string())
    }

    async fn acknowledge_error(&self) -> Result<()> {
        *self.fault.write().await = None;
        Ok(())
    }
}
