use crate::event::DoorCommand;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Registered actuator devices.
///
/// Each device connection owns the receiving half of its command queue and
/// drains it on its own task. Handoffs only enqueue, so any thread may issue
/// them without blocking; commands for one device arrive in enqueue order.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<DashMap<Uuid, mpsc::UnboundedSender<DoorCommand>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device connection; commands arrive on the receiver.
    pub fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<DoorCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.devices.insert(id, tx);
        info!(device_id = %id, devices = self.devices.len(), "Device registered");
        (id, rx)
    }

    /// Remove a device; removing twice is a no-op.
    pub fn deregister(&self, id: &Uuid) -> bool {
        let removed = self.devices.remove(id).is_some();
        if removed {
            info!(device_id = %id, "Device deregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Schedule `command` on every registered device. Returns how many
    /// device queues accepted it.
    pub fn handoff(&self, command: &DoorCommand) -> usize {
        let targets: Vec<(Uuid, mpsc::UnboundedSender<DoorCommand>)> = self
            .devices
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        if targets.is_empty() {
            warn!(command = ?command, "No device connected, dropping command");
            return 0;
        }

        let mut scheduled = 0;
        for (id, tx) in targets {
            if tx.send(command.clone()).is_ok() {
                scheduled += 1;
            } else {
                debug!(device_id = %id, "Device connection gone, dropping command");
                self.deregister(&id);
            }
        }
        scheduled
    }
}
