use crate::subscribers::{SubscriberRegistry, SubscriberSet};
use crate::telegram::Messenger;
use homeguard::cooldown::CooldownGate;
use homeguard::event::{AccessEvent, FaceRecord, HubMessage, Identity};
use homeguard::state::SensorSnapshot;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const VIBRATION_KEY: &str = "vibration";

/// Face cooldown key shared by every unknown face
const UNKNOWN_FACE_KEY: &str = "unknown";

pub const VIBRATION_TEXT: &str = "📳     *EARTHQUAKE ALERT*      📳\nVibration detected!";
pub const UNKNOWN_FACE_CAPTION: &str = "🔴 *UNKNOWN FACE DETECTED*";

/// Alert timing and location settings
#[derive(Debug, Clone)]
pub struct AlertSettings {
    /// Base URL prefixed to hub image references
    pub hub_url: String,
    pub vibration_window: Duration,
    pub face_window: Duration,
    pub camera_lat: f64,
    pub camera_lon: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            hub_url: "http://localhost:5000".to_string(),
            vibration_window: Duration::from_secs(30),
            face_window: Duration::from_secs(20),
            camera_lat: 30.0444,
            camera_lon: 31.2357,
        }
    }
}

#[derive(Default)]
struct HubView {
    last_snapshot: Option<SensorSnapshot>,
    vibration_active: bool,
}

/// Turns hub messages into chat notifications for the matching subscriber set.
pub struct AlertDispatcher {
    messenger: Arc<dyn Messenger>,
    registry: Arc<SubscriberRegistry>,
    settings: AlertSettings,
    gate: CooldownGate,
    view: Mutex<HubView>,
}

impl AlertDispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, registry: Arc<SubscriberRegistry>, settings: AlertSettings) -> Self {
        Self {
            messenger,
            registry,
            settings,
            gate: CooldownGate::new(),
            view: Mutex::new(HubView::default()),
        }
    }

    /// Most recent snapshot seen on the hub stream
    pub fn last_snapshot(&self) -> Option<SensorSnapshot> {
        self.lock_view().last_snapshot
    }

    /// Dispatch one hub message observed at `now`. Returns the number of
    /// sends attempted.
    pub async fn handle(&self, msg: &HubMessage, now: Instant) -> usize {
        match msg {
            HubMessage::Update(snapshot) => self.on_update(snapshot, now).await,
            HubMessage::NfcEvent(event) => self.on_access(event).await,
            HubMessage::FaceEvent(record) => self.on_face(record, now).await,
        }
    }

    async fn on_update(&self, snapshot: &SensorSnapshot, now: Instant) -> usize {
        let rising = {
            let mut view = self.lock_view();
            view.last_snapshot = Some(*snapshot);
            let vib = snapshot.sensors.vib;
            let rising = vib && !view.vibration_active;
            view.vibration_active = vib;
            rising
        };
        if !rising {
            return 0;
        }

        // No subscribers: nothing sent and the cooldown stays unused
        let recipients = self.registry.members(SubscriberSet::Vibration);
        if recipients.is_empty() {
            return 0;
        }
        if !self.gate.try_fire(VIBRATION_KEY, self.settings.vibration_window, now) {
            debug!("Vibration alert suppressed by cooldown");
            return 0;
        }

        info!(recipients = recipients.len(), "Sending vibration alert");
        for chat in &recipients {
            self.messenger.send_message(*chat, VIBRATION_TEXT, None).await;
        }
        recipients.len()
    }

    async fn on_access(&self, event: &AccessEvent) -> usize {
        let recipients = self.registry.members(SubscriberSet::Nfc);
        if recipients.is_empty() {
            return 0;
        }

        let text = access_text(event);
        for chat in &recipients {
            self.messenger.send_message(*chat, &text, None).await;
        }
        recipients.len()
    }

    async fn on_face(&self, record: &FaceRecord, now: Instant) -> usize {
        let recipients = self.registry.members(SubscriberSet::Face);
        if recipients.is_empty() {
            return 0;
        }

        let identity = record.identity();
        let key = match &identity {
            Identity::Known(name) => format!("face:{}", name),
            Identity::Unknown => format!("face:{}", UNKNOWN_FACE_KEY),
        };
        if !self.gate.try_fire(&key, self.settings.face_window, now) {
            debug!(identity = %identity, "Face alert suppressed by cooldown");
            return 0;
        }

        match identity {
            Identity::Known(name) => {
                let text = known_face_text(&name);
                for chat in &recipients {
                    self.messenger.send_message(*chat, &text, None).await;
                }
                recipients.len()
            }
            Identity::Unknown => {
                let photo_url = format!("{}{}", self.settings.hub_url.trim_end_matches('/'), record.image_url);
                info!(recipients = recipients.len(), image = %photo_url, "Sending unknown face alert");
                for chat in &recipients {
                    self.messenger
                        .send_location(*chat, self.settings.camera_lat, self.settings.camera_lon)
                        .await;
                    self.messenger.send_photo(*chat, &photo_url, UNKNOWN_FACE_CAPTION).await;
                }
                recipients.len() * 2
            }
        }
    }

    /// Status reply from the last snapshot; `None` until one has arrived.
    pub fn status_text(&self) -> Option<String> {
        self.last_snapshot().map(|s| {
            format!(
                "📊 *System Status*\n\n🌡 Temp: {:.1} °C\n💧 Humidity: {:.1} %\n⛽ Gas: {}",
                s.sensors.temp, s.sensors.hum, s.sensors.gas
            )
        })
    }

    fn lock_view(&self) -> std::sync::MutexGuard<'_, HubView> {
        self.view.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Hands hub messages from the subscription callback to the dispatch task.
#[derive(Clone)]
pub struct AlertQueue {
    tx: mpsc::UnboundedSender<HubMessage>,
}

impl AlertQueue {
    /// Spawn the task that feeds queued messages to `dispatcher` in order.
    pub fn spawn(dispatcher: Arc<AlertDispatcher>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<HubMessage>();
        let handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                dispatcher.handle(&msg, Instant::now()).await;
            }
        });
        (Self { tx }, handle)
    }

    /// Queue one message; `false` once the dispatch task has stopped.
    pub fn push(&self, msg: HubMessage) -> bool {
        match self.tx.send(msg) {
            Ok(()) => true,
            Err(e) => {
                warn!(message = ?e.0, "Alert dispatcher stopped, dropping hub message");
                false
            }
        }
    }
}

pub fn access_text(event: &AccessEvent) -> String {
    format!(
        "🔐        *ACCESSED*         🔐\n\n*Status:* {}\n*Name:* {}\n*UID:* `{}`",
        event.status, event.name, event.uid
    )
}

pub fn known_face_text(name: &str) -> String {
    format!("🟢 *FACE ACCESS GRANTED*\n👤 Name: {}", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingMessenger, Sent};
    use homeguard::event::{AccessOutcome, FaceStatus};
    use homeguard::state::{Environment, Radar};
    use tempfile::TempDir;

    struct Fixture {
        dispatcher: AlertDispatcher,
        messenger: Arc<RecordingMessenger>,
        registry: Arc<SubscriberRegistry>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(SubscriberRegistry::open(dir.path()).unwrap());
        let messenger = Arc::new(RecordingMessenger::default());
        let settings = AlertSettings {
            hub_url: "http://hub:5000".to_string(),
            ..AlertSettings::default()
        };
        let dispatcher = AlertDispatcher::new(messenger.clone(), registry.clone(), settings);
        Fixture {
            dispatcher,
            messenger,
            registry,
            _dir: dir,
        }
    }

    fn snapshot(vib: bool) -> HubMessage {
        HubMessage::Update(SensorSnapshot {
            radar: Radar::default(),
            sensors: Environment {
                temp: 24.5,
                hum: 40.0,
                gas: 120,
                vib,
            },
        })
    }

    fn face(name: &str, status: FaceStatus) -> HubMessage {
        HubMessage::FaceEvent(FaceRecord {
            camera: "cam_01".to_string(),
            name: name.to_string(),
            status,
            image_url: "/faces/UNKNOWN_20240101_120000_000000.jpg".to_string(),
            time: "12:00:00".to_string(),
        })
    }

    #[tokio::test]
    async fn test_vibration_alert_on_rising_edge_only() {
        let f = fixture();
        f.registry.add(SubscriberSet::Vibration, 1).await.unwrap();
        let t0 = Instant::now();

        assert_eq!(f.dispatcher.handle(&snapshot(true), t0).await, 1);
        // Still asserted: no new edge
        assert_eq!(f.dispatcher.handle(&snapshot(true), t0).await, 0);
        assert_eq!(f.dispatcher.handle(&snapshot(false), t0).await, 0);

        assert_eq!(f.messenger.take(), vec![Sent::Message(1, VIBRATION_TEXT.to_string())]);
    }

    #[tokio::test]
    async fn test_vibration_cooldown() {
        let f = fixture();
        f.registry.add(SubscriberSet::Vibration, 1).await.unwrap();
        let t0 = Instant::now();

        for (offset, expected) in [(0, 1), (10, 0), (30, 1)] {
            let now = t0 + Duration::from_secs(offset);
            f.dispatcher.handle(&snapshot(true), now).await;
            f.dispatcher.handle(&snapshot(false), now).await;
            assert_eq!(f.messenger.take().len(), expected, "at +{}s", offset);
        }
    }

    #[tokio::test]
    async fn test_no_subscribers_keeps_cooldown_unused() {
        let f = fixture();
        let t0 = Instant::now();

        f.dispatcher.handle(&snapshot(true), t0).await;
        f.dispatcher.handle(&snapshot(false), t0).await;

        f.registry.add(SubscriberSet::Vibration, 1).await.unwrap();
        assert_eq!(f.dispatcher.handle(&snapshot(true), t0 + Duration::from_secs(1)).await, 1);
    }

    #[tokio::test]
    async fn test_every_access_event_reported() {
        let f = fixture();
        f.registry.add(SubscriberSet::Nfc, 3).await.unwrap();
        let event = AccessEvent::nfc("FFFFFFFF", AccessOutcome::Denied, &Identity::Unknown);

        let now = Instant::now();
        f.dispatcher.handle(&HubMessage::NfcEvent(event.clone()), now).await;
        f.dispatcher.handle(&HubMessage::NfcEvent(event), now).await;

        let sent = f.messenger.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0],
            Sent::Message(
                3,
                "🔐        *ACCESSED*         🔐\n\n*Status:* DENIED\n*Name:* Unknown\n*UID:* `FFFFFFFF`"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_known_face_short_notice() {
        let f = fixture();
        f.registry.add(SubscriberSet::Face, 9).await.unwrap();

        f.dispatcher.handle(&face("Hana", FaceStatus::Known), Instant::now()).await;

        assert_eq!(f.messenger.take(), vec![Sent::Message(9, known_face_text("Hana"))]);
    }

    #[tokio::test]
    async fn test_unknown_face_end_to_end_cooldown() {
        let f = fixture();
        f.registry.add(SubscriberSet::Face, 9).await.unwrap();
        let t0 = Instant::now();
        let unknown = face("UNKNOWN", FaceStatus::Unknown);

        f.dispatcher.handle(&unknown, t0).await;
        assert_eq!(
            f.messenger.take(),
            vec![
                Sent::Location(9),
                Sent::Photo(
                    9,
                    "http://hub:5000/faces/UNKNOWN_20240101_120000_000000.jpg".to_string(),
                    UNKNOWN_FACE_CAPTION.to_string()
                ),
            ]
        );

        f.dispatcher.handle(&unknown, t0 + Duration::from_secs(5)).await;
        assert!(f.messenger.take().is_empty());

        f.dispatcher.handle(&unknown, t0 + Duration::from_secs(21)).await;
        assert_eq!(f.messenger.take().len(), 2);
    }

    #[tokio::test]
    async fn test_face_cooldown_is_per_identity() {
        let f = fixture();
        f.registry.add(SubscriberSet::Face, 9).await.unwrap();
        let now = Instant::now();

        f.dispatcher.handle(&face("Hana", FaceStatus::Known), now).await;
        f.dispatcher.handle(&face("Ammar", FaceStatus::Known), now).await;
        f.dispatcher.handle(&face("Hana", FaceStatus::Known), now).await;

        assert_eq!(f.messenger.take().len(), 2);
    }

    #[tokio::test]
    async fn test_queue_feeds_dispatcher_until_stopped() {
        let f = fixture();
        let dispatcher = Arc::new(f.dispatcher);
        let (queue, handle) = AlertQueue::spawn(Arc::clone(&dispatcher));

        assert!(queue.push(snapshot(false)));
        for _ in 0..100 {
            if dispatcher.last_snapshot().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(dispatcher.last_snapshot().is_some());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!queue.push(snapshot(true)));
    }

    #[tokio::test]
    async fn test_status_text_requires_snapshot() {
        let f = fixture();
        assert!(f.dispatcher.status_text().is_none());

        f.dispatcher.handle(&snapshot(false), Instant::now()).await;
        let text = f.dispatcher.status_text().unwrap();
        assert!(text.contains("Temp: 24.5 °C"));
        assert!(text.contains("Humidity: 40.0 %"));
        assert!(text.contains("Gas: 120"));
    }
}
