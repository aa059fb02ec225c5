pub mod command;
pub mod config;

use command::{Command, Reply};
use config::ManagerConfig;

use anyhow::Result;
use moka::future::Cache;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::axis::{
    attribute::{Attribute, AttributeValue},
    movement_parameters::MovementParams,
    Axis,
};

/// Funnels every request for the axis through one command loop so the
/// controller only ever sees one conversation at a time.
pub struct DeviceManager {
    axis: Arc<dyn Axis>,
    cmd_sender: mpsc::Sender<Command>,
}

impl DeviceManager {
    pub fn new(config: ManagerConfig, axis: Arc<dyn Axis>) -> Self {
        let mut builder = Cache::builder().max_capacity(config.cache_capacity);
        if config.caching_enabled() {
            builder = builder.time_to_live(config.read_cache_ttl());
        }
        let cache = builder.build();

        let (tx, rx) = mpsc::channel::<Command>(config.queue_depth.max(1));

        tokio::spawn(Self::command_loop(
            axis.clone(),
            cache,
            config.caching_enabled(),
            rx,
        ));

        DeviceManager {
            axis,
            cmd_sender: tx,
        }
    }

    pub fn axis_name(&self) -> &str {
        self.axis.name()
    }

    pub async fn send_command(&self, cmd: Command) -> Result<()> {
        self.cmd_sender.send(cmd).await?;
        Ok(())
    }

    /// Queue a command and wait for its reply.
    pub async fn request(&self, make: impl FnOnce(Reply) -> Command) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.send_command(make(tx)).await?;
        rx.await?
    }

    pub async fn initialize(&self) -> Result<Value> {
        self.request(|resp| Command::Init { resp }).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.request(|resp| Command::Shutdown { resp }).await?;
        Ok(())
    }

    async fn command_loop(
        axis: Arc<dyn Axis>,
        cache: Cache<Attribute, AttributeValue>,
        caching: bool,
        mut rx: mpsc::Receiver<Command>,
    ) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::ReadAttr { attr, resp } => {
                    let result = Self::handle_read(&axis, &cache, caching, attr).await;
                    let _ = resp.send(result);
                }
                Command::WriteAttr { attr, value, resp } => {
                    let result = Self::handle_write(&axis, &cache, attr, value).await;
                    let _ = resp.send(result);
                }
                Command::Move {
                    target,
                    params,
                    resp,
                } => {
                    let result = Self::handle_move(&axis, &cache, target, params).await;
                    let _ = resp.send(result);
                }
                Command::Stop { resp } => {
                    let result = Self::handle_stop(&axis, &cache).await;
                    let _ = resp.send(result);
                }
                Command::GetState { resp } => {
                    let result = Self::handle_get_state(&axis, &cache).await;
                    let _ = resp.send(result);
                }
                Command::GetIdn { resp } => {
                    let result = axis.idn().await.map(|idn| json!({"idn": idn}));
                    let _ = resp.send(result);
                }
                Command::GetError { resp } => {
                    let result = axis.get_error().await.map(|error| json!({"error": error}));
                    let _ = resp.send(result);
                }
                Command::AcknError { resp } => {
                    let result = Self::handle_ackn_error(&axis, &cache).await;
                    let _ = resp.send(result);
                }
                Command::Init { resp } => {
                    let result = Self::handle_init(&axis, &cache).await;
                    let _ = resp.send(result);
                }
                Command::ListAttributes { resp } => {
                    let result = Self::handle_list_attributes(&axis);
                    let _ = resp.send(result);
                }
                Command::Shutdown { resp } => {
                    cache.invalidate_all();
                    let result = axis
                        .shutdown()
                        .await
                        .map(|_| json!({"status": "ok", "action": "shutdown"}));
                    let _ = resp.send(result);
                }
            }
        }

        debug!("Command loop finished");
    }

    async fn handle_read(
        axis: &Arc<dyn Axis>,
        cache: &Cache<Attribute, AttributeValue>,
        caching: bool,
        attr: Attribute,
    ) -> Result<Value> {
        if caching {
            if let Some(value) = cache.get(&attr).await {
                return Ok(json!({"axis": axis.name(), "attribute": attr, "value": value}));
            }
        }

        // A failed read usually means a fault was latched; cached values are stale.
        let value = match axis.read_attribute(attr).await {
            Ok(value) => value,
            Err(e) => {
                cache.invalidate_all();
                return Err(e);
            }
        };
        if caching {
            cache.insert(attr, value).await;
        }

        Ok(json!({"axis": axis.name(), "attribute": attr, "value": value}))
    }

    async fn handle_write(
        axis: &Arc<dyn Axis>,
        cache: &Cache<Attribute, AttributeValue>,
        attr: Attribute,
        value: AttributeValue,
    ) -> Result<Value> {
        let result = axis.write_attribute(attr, value).await;
        cache.invalidate_all();
        result?;
        Ok(json!({"status": "ok", "action": "write", "attribute": attr, "value": value}))
    }

    async fn handle_move(
        axis: &Arc<dyn Axis>,
        cache: &Cache<Attribute, AttributeValue>,
        target: f64,
        params: Option<MovementParams>,
    ) -> Result<Value> {
        let result = axis.start(target, params).await;
        cache.invalidate_all();
        result?;
        Ok(json!({"status": "ok", "action": "move", "target": target}))
    }

    async fn handle_stop(
        axis: &Arc<dyn Axis>,
        cache: &Cache<Attribute, AttributeValue>,
    ) -> Result<Value> {
        let result = axis.stop().await;
        cache.invalidate_all();
        result?;
        Ok(json!({"status": "ok", "action": "stop"}))
    }

    async fn handle_get_state(
        axis: &Arc<dyn Axis>,
        cache: &Cache<Attribute, AttributeValue>,
    ) -> Result<Value> {
        let state_info = axis.get_state().await?;
        if state_info.is_faulted() {
            cache.invalidate_all();
        }
        Ok(json!({
            "axis": axis.name(),
            "state": state_info.state,
            "status": state_info.status,
        }))
    }

    async fn handle_ackn_error(
        axis: &Arc<dyn Axis>,
        cache: &Cache<Attribute, AttributeValue>,
    ) -> Result<Value> {
        axis.acknowledge_error().await?;
        cache.invalidate_all();
        Ok(json!({"status": "ok", "action": "ackn_error"}))
    }

    async fn handle_init(
        axis: &Arc<dyn Axis>,
        cache: &Cache<Attribute, AttributeValue>,
    ) -> Result<Value> {
        let result = axis.init().await;
        cache.invalidate_all();
        result?;
        Ok(json!({"status": "ok", "action": "init"}))
    }

    fn handle_list_attributes(axis: &Arc<dyn Axis>) -> Result<Value> {
        let attributes: Vec<Value> = axis
            .available_attributes()
            .into_iter()
            .map(|attr| {
                json!({
                    "name": attr,
                    "type": attr.kind(),
                    "writable": attr.is_writable(),
                    "memorized": attr.is_memorized(),
                    "expert": attr.is_expert(),
                })
            })
            .collect();

        Ok(json!({
            "axis": axis.name(),
            "attributes": attributes,
            "supported_movement_params": axis.supported_movement_params(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::mock::MockAxis;

    fn manager(read_cache_ttl_ms: u64) -> (DeviceManager, Arc<MockAxis>) {
        let axis = Arc::new(MockAxis::new("1"));
        let config = ManagerConfig {
            read_cache_ttl_ms,
            ..ManagerConfig::default()
        };
        (DeviceManager::new(config, axis.clone()), axis)
    }

    async fn read(manager: &DeviceManager, attr: Attribute) -> Value {
        manager
            .request(|resp| Command::ReadAttr { attr, resp })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_repeated_reads_are_cached() {
        let (manager, axis) = manager(60_000);

        read(&manager, Attribute::Position).await;
        let value = read(&manager, Attribute::Position).await;

        assert_eq!(value["value"], json!(0.0));
        assert_eq!(value["attribute"], "Position");
        assert_eq!(axis.reads(), 1);
    }

    #[tokio::test]
    async fn test_write_invalidates_cache() {
        let (manager, axis) = manager(60_000);
        read(&manager, Attribute::Position).await;

        manager
            .request(|resp| Command::WriteAttr {
                attr: Attribute::Position,
                value: AttributeValue::Double(4.5),
                resp,
            })
            .await
            .unwrap();

        let value = read(&manager, Attribute::Position).await;
        assert_eq!(value["value"], json!(4.5));
        assert_eq!(axis.reads(), 2);
    }

    #[tokio::test]
    async fn test_fault_seen_by_get_state_drops_cached_reads() {
        let (manager, axis) = manager(60_000);
        read(&manager, Attribute::Position).await;
        axis.lose_link().await;

        let state = manager
            .request(|resp| Command::GetState { resp })
            .await
            .unwrap();
        assert_eq!(state["state"], "FAULT");

        let err = manager
            .request(|resp| Command::ReadAttr {
                attr: Attribute::Position,
                resp,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Connection closed"));
        assert_eq!(axis.reads(), 2);
    }

    #[tokio::test]
    async fn test_failed_read_drops_cached_reads() {
        let (manager, axis) = manager(60_000);
        read(&manager, Attribute::Position).await;
        axis.lose_link().await;

        assert!(manager
            .request(|resp| Command::ReadAttr {
                attr: Attribute::ServoOn,
                resp,
            })
            .await
            .is_err());
        assert!(manager
            .request(|resp| Command::ReadAttr {
                attr: Attribute::Position,
                resp,
            })
            .await
            .is_err());
        assert_eq!(axis.reads(), 3);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let (manager, axis) = manager(0);

        read(&manager, Attribute::ServoOn).await;
        read(&manager, Attribute::ServoOn).await;

        assert_eq!(axis.reads(), 2);
    }

    #[tokio::test]
    async fn test_failed_move_is_reported_and_faults_state() {
        let (manager, _axis) = manager(0);
        manager
            .request(|resp| Command::WriteAttr {
                attr: Attribute::ServoOn,
                value: AttributeValue::Bool(false),
                resp,
            })
            .await
            .unwrap();

        let err = manager
            .request(|resp| Command::Move {
                target: 1.0,
                params: None,
                resp,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("servo is off"));

        let state = manager
            .request(|resp| Command::GetState { resp })
            .await
            .unwrap();
        assert_eq!(state["state"], "FAULT");

        manager
            .request(|resp| Command::AcknError { resp })
            .await
            .unwrap();
        let state = manager
            .request(|resp| Command::GetState { resp })
            .await
            .unwrap();
        assert_eq!(state["state"], "OFF");
    }

    #[tokio::test]
    async fn test_list_attributes_describes_access() {
        let (manager, _axis) = manager(0);

        let listing = manager
            .request(|resp| Command::ListAttributes { resp })
            .await
            .unwrap();
        let attributes = listing["attributes"].as_array().unwrap();

        assert_eq!(attributes.len(), Attribute::ALL.len());
        let on_target = attributes
            .iter()
            .find(|a| a["name"] == "OnTarget")
            .unwrap();
        assert_eq!(on_target["writable"], false);
        assert_eq!(on_target["type"], "boolean");
    }
}
