use super::render::{encode_jpeg, FRAME_QUALITY};
use super::*;
use crate::cooldown::CooldownGate;
use crate::event::{FaceEvent, FaceStatus, Identity, UNKNOWN_FACE_NAME};
use crate::hub_client::{Delivery, EventSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Returns the same detections on every call and counts invocations
struct FixedRecognizer {
    detections: Vec<Detection>,
    calls: AtomicUsize,
}

impl FixedRecognizer {
    fn new(detections: Vec<Detection>) -> Arc<Self> {
        Arc::new(Self {
            detections,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for FixedRecognizer {
    async fn detect_and_identify(&self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }
}

struct FailingRecognizer;

#[async_trait]
impl Recognizer for FailingRecognizer {
    async fn detect_and_identify(&self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        anyhow::bail!("service down")
    }
}

struct RecordingSink {
    tx: mpsc::UnboundedSender<FaceEvent>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, event: &FaceEvent) -> Delivery {
        let _ = self.tx.send(event.clone());
        Delivery::Delivered
    }
}

struct Harness {
    pipeline: FramePipeline,
    events: mpsc::UnboundedReceiver<FaceEvent>,
    viewers: ViewerSet,
    roster_dir: TempDir,
}

fn harness(recognizer: Arc<dyn Recognizer>, process_every: u64, cooldown: Duration) -> Harness {
    let roster_dir = TempDir::new().unwrap();
    std::fs::write(roster_dir.path().join("Hana_1.jpg"), b"ref").unwrap();
    std::fs::write(roster_dir.path().join("Ammar_1.jpg"), b"ref").unwrap();

    let (tx, events) = mpsc::unbounded_channel();
    let viewers = ViewerSet::new();
    let ctx = PipelineContext {
        camera_id: "cam_01".to_string(),
        process_every,
        event_cooldown: cooldown,
        recognizer,
        roster: SharedRoster::load(roster_dir.path()),
        gate: Arc::new(CooldownGate::new()),
        sink: Arc::new(RecordingSink { tx }),
        viewers: viewers.clone(),
    };

    Harness {
        pipeline: FramePipeline::new(ctx),
        events,
        viewers,
        roster_dir,
    }
}

fn frame() -> Vec<u8> {
    encode_jpeg(&RgbImage::new(64, 64), FRAME_QUALITY).unwrap()
}

fn face(outcome: MatchOutcome) -> Detection {
    Detection {
        region: Region {
            top: 10,
            right: 40,
            bottom: 40,
            left: 10,
        },
        outcome,
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<FaceEvent>) -> FaceEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("face event not emitted")
        .expect("sink closed")
}

#[tokio::test]
async fn test_recognizes_every_nth_frame_and_annotates_all() {
    let recognizer = FixedRecognizer::new(vec![]);
    let mut h = harness(recognizer.clone(), 5, Duration::from_secs(5));
    let (_id, mut viewer_rx) = h.viewers.join();

    let mut forwarded = 0;
    for _ in 0..10 {
        assert_eq!(h.pipeline.handle_frame(&frame()).await, Some(1));
        while viewer_rx.try_recv().is_ok() {
            forwarded += 1;
        }
    }

    assert_eq!(recognizer.calls(), 2);
    assert_eq!(h.pipeline.frames_processed(), 10);
    assert_eq!(forwarded, 10);
}

#[tokio::test]
async fn test_undecodable_frame_is_dropped() {
    let recognizer = FixedRecognizer::new(vec![]);
    let mut h = harness(recognizer.clone(), 1, Duration::from_secs(5));

    assert!(h.pipeline.handle_frame(b"garbage").await.is_none());
    assert_eq!(h.pipeline.frames_processed(), 0);
    assert_eq!(recognizer.calls(), 0);
}

#[tokio::test]
async fn test_known_face_emits_once_within_cooldown() {
    let recognizer = FixedRecognizer::new(vec![face(MatchOutcome::Matched("Hana_1.jpg".to_string()))]);
    let mut h = harness(recognizer, 1, Duration::from_secs(60));

    for _ in 0..3 {
        h.pipeline.process(&frame()).await.unwrap();
    }

    let event = next_event(&mut h.events).await;
    assert_eq!(event.identity, Identity::Known("Hana".to_string()));
    assert_eq!(event.camera_id, "cam_01");
    assert!(!event.image.is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.events.try_recv().is_err());
    assert_eq!(h.pipeline.last_faces().len(), 1);
}

#[tokio::test]
async fn test_unmatched_face_reported_as_unknown() {
    let recognizer = FixedRecognizer::new(vec![
        face(MatchOutcome::Unmatched),
        face(MatchOutcome::Matched("Stranger_1.jpg".to_string())),
    ]);
    let mut h = harness(recognizer, 1, Duration::from_secs(60));

    h.pipeline.process(&frame()).await.unwrap();

    let event = next_event(&mut h.events).await;
    assert_eq!(event.identity, Identity::Unknown);
    let payload = event.to_payload();
    assert_eq!(payload.name, UNKNOWN_FACE_NAME);
    assert_eq!(payload.status, FaceStatus::Unknown);

    // Both detections share the Unknown cooldown key
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.events.try_recv().is_err());
    assert_eq!(h.pipeline.last_faces().len(), 2);
}

#[tokio::test]
async fn test_region_without_encoding_is_skipped() {
    let recognizer = FixedRecognizer::new(vec![face(MatchOutcome::NoEncoding)]);
    let mut h = harness(recognizer, 1, Duration::from_secs(5));

    h.pipeline.process(&frame()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.events.try_recv().is_err());
    assert!(h.pipeline.last_faces().is_empty());
}

#[tokio::test]
async fn test_empty_crop_does_not_consume_cooldown() {
    let off_frame = Detection {
        region: Region {
            top: 100,
            right: 120,
            bottom: 120,
            left: 100,
        },
        outcome: MatchOutcome::Matched("Ammar".to_string()),
    };
    let recognizer = FixedRecognizer::new(vec![off_frame]);
    let mut h = harness(recognizer, 1, Duration::from_secs(60));

    h.pipeline.process(&frame()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.events.try_recv().is_err());
    assert!(h.pipeline.context().gate.last_fired("Ammar").is_none());
}

#[tokio::test]
async fn test_unencodable_crop_does_not_consume_cooldown() {
    let wide = Detection {
        region: Region {
            top: 0,
            right: 70_000,
            bottom: 2,
            left: 0,
        },
        outcome: MatchOutcome::Matched("Ammar".to_string()),
    };
    let recognizer = FixedRecognizer::new(vec![wide]);
    let mut h = harness(recognizer.clone(), 1, Duration::from_secs(60));

    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(RgbImage::new(70_000, 2))
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    // The annotated frame is too wide to re-encode as well
    assert!(h.pipeline.process(&png).await.is_none());
    assert_eq!(recognizer.calls(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.events.try_recv().is_err());
    assert!(h.pipeline.context().gate.last_fired("Ammar").is_none());
}

#[tokio::test]
async fn test_recognition_failure_clears_boxes() {
    let mut h = harness(Arc::new(FailingRecognizer), 1, Duration::from_secs(5));

    assert!(h.pipeline.process(&frame()).await.is_some());
    assert!(h.pipeline.last_faces().is_empty());
}

#[tokio::test]
async fn test_roster_reload_replaces_identities() {
    let recognizer = FixedRecognizer::new(vec![face(MatchOutcome::Matched("Menna".to_string()))]);
    let mut h = harness(recognizer, 1, Duration::from_secs(60));

    h.pipeline.process(&frame()).await.unwrap();
    assert_eq!(next_event(&mut h.events).await.identity, Identity::Unknown);

    let roster = h.pipeline.context().roster.clone();
    std::fs::write(h.roster_dir.path().join("Menna_1.jpg"), b"ref").unwrap();
    assert_eq!(roster.reload(), 3);

    h.pipeline.process(&frame()).await.unwrap();
    assert_eq!(
        next_event(&mut h.events).await.identity,
        Identity::Known("Menna".to_string())
    );
}
