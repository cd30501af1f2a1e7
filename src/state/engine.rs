use crate::event::{AccessEvent, FaceRecord, HubMessage};
use crate::sensor::SensorReading;
use crate::state::snapshot::SensorSnapshot;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Default width of the vibration pulse.
pub const DEFAULT_PULSE_WIDTH: Duration = Duration::from_millis(500);

/// Hub state holds the authoritative sensor snapshot and fans out every
/// ingress event to connected clients.
pub struct HubState {
    /// Latest snapshot; written only by sensor ingress
    snapshot: RwLock<SensorSnapshot>,

    /// Broadcast channel for hub messages (snapshots, face and access events)
    hub_tx: broadcast::Sender<HubMessage>,

    /// Delay before a vibration pulse is cleared
    pulse_width: Duration,
}

impl HubState {
    /// Create hub state with broadcast channel
    pub fn new(pulse_width: Duration) -> Self {
        let (hub_tx, _) = broadcast::channel(1000);

        Self {
            snapshot: RwLock::new(SensorSnapshot::default()),
            hub_tx,
            pulse_width,
        }
    }

    /// Current snapshot (copy)
    pub fn snapshot(&self) -> SensorSnapshot {
        *self.snapshot.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to hub messages
    pub fn subscribe(&self) -> broadcast::Receiver<HubMessage> {
        self.hub_tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.hub_tx.receiver_count()
    }

    /// Apply one parsed sensor reading and broadcast the new snapshot.
    ///
    /// A vibration reading publishes the raised flag immediately and spawns
    /// the delayed clear, so it must be called inside a tokio runtime.
    pub fn apply_reading(self: &Arc<Self>, reading: SensorReading) {
        match reading {
            SensorReading::Radar { angle, distance } => {
                self.mutate(|s| {
                    s.radar.angle = angle;
                    s.radar.distance = distance;
                });
            }
            SensorReading::Environment { temp, hum, gas } => {
                self.mutate(|s| {
                    s.sensors.temp = temp;
                    s.sensors.hum = hum;
                    s.sensors.gas = gas;
                });
            }
            SensorReading::Vibration => {
                info!("Vibration detected");
                self.mutate(|s| s.sensors.vib = true);

                let state = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(state.pulse_width).await;
                    state.mutate(|s| s.sensors.vib = false);
                });
            }
        }
    }

    /// Relay a stored face event to all clients
    pub fn publish_face(&self, record: FaceRecord) {
        info!(name = %record.name, status = ?record.status, "Broadcasting face event");
        self.publish(HubMessage::FaceEvent(record));
    }

    /// Relay an access audit event to all clients
    pub fn publish_access(&self, event: AccessEvent) {
        info!(uid = %event.uid, name = %event.name, status = %event.status, "Broadcasting access event");
        self.publish(HubMessage::NfcEvent(event));
    }

    fn mutate(&self, f: impl FnOnce(&mut SensorSnapshot)) {
        let snapshot = {
            let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
            f(&mut guard);
            *guard
        };
        self.publish(HubMessage::Update(snapshot));
    }

    fn publish(&self, msg: HubMessage) {
        // No subscribers is fine
        if self.hub_tx.send(msg).is_err() {
            debug!("No hub subscribers connected");
        }
    }
}

impl Default for HubState {
    fn default() -> Self {
        Self::new(DEFAULT_PULSE_WIDTH)
    }
}
