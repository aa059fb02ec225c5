pub mod attribute;
pub mod config;
pub mod frame;
#[cfg(test)]
pub mod mock;
pub mod movement_parameters;
pub mod pi_e754;
pub mod state;
pub mod state_info;

use attribute::{Attribute, AttributeValue};
use movement_parameters::MovementParams;
use state_info::AxisStateInfo;

/// One controllable axis as seen by remote clients.
///
/// Positions crossing this trait are in the user frame unless the attribute
/// says otherwise (`DialPosition`).
#[async_trait::async_trait]
pub trait Axis: Send + Sync {
    fn name(&self) -> &str;

    /// Attach to the hardware. Safe to call again to reconnect.
    async fn init(&self) -> anyhow::Result<()>;
    async fn shutdown(&self) -> anyhow::Result<()>;

    async fn start(&self, target: f64, params: Option<MovementParams>) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;

    async fn get_state(&self) -> anyhow::Result<AxisStateInfo>;
    async fn read_attribute(&self, attribute: Attribute) -> anyhow::Result<AttributeValue>;
    async fn write_attribute(
        &self,
        attribute: Attribute,
        value: AttributeValue,
    ) -> anyhow::Result<()>;

    async fn idn(&self) -> anyhow::Result<String>;
    async fn get_error(&self) -> anyhow::Result<String>;
    async fn acknowledge_error(&self) -> anyhow::Result<()>;

    fn available_attributes(&self) -> Vec<Attribute> {
        Attribute::ALL.to_vec()
    }

    fn supported_movement_params(&self) -> Vec<String> {
        MovementParams::supported()
    }
}
