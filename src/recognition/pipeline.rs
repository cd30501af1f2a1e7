use super::render::{self, FaceBox, FRAME_QUALITY};
use super::{MatchOutcome, Recognizer, SharedRoster, ViewerSet};
use crate::cooldown::CooldownGate;
use crate::event::{FaceEvent, Identity};
use crate::hub_client::{Delivery, EventSink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Collaborators shared by every camera connection
#[derive(Clone)]
pub struct PipelineContext {
    pub camera_id: String,
    /// Recognize every Nth decoded frame
    pub process_every: u64,
    /// Minimum interval between face events for one identity
    pub event_cooldown: Duration,
    pub recognizer: Arc<dyn Recognizer>,
    pub roster: SharedRoster,
    pub gate: Arc<CooldownGate>,
    pub sink: Arc<dyn EventSink>,
    pub viewers: ViewerSet,
}

/// Per-connection recognition pipeline.
///
/// Frames between recognitions reuse the last computed boxes so the
/// annotation stays continuous.
pub struct FramePipeline {
    ctx: PipelineContext,
    frame_count: u64,
    last_faces: Vec<FaceBox>,
}

impl FramePipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            frame_count: 0,
            last_faces: Vec::new(),
        }
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_count
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn last_faces(&self) -> &[FaceBox] {
        &self.last_faces
    }

    /// Process one received frame and forward the annotated result to every
    /// viewer. Returns the number of viewers reached, or `None` when the
    /// frame could not be decoded.
    pub async fn handle_frame(&mut self, bytes: &[u8]) -> Option<usize> {
        let annotated = self.process(bytes).await?;
        Some(self.ctx.viewers.broadcast(annotated))
    }

    /// Decode, recognize on cadence, annotate and re-encode one frame.
    pub async fn process(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        let mut frame = render::decode_frame(bytes)?;
        self.frame_count += 1;

        if self.frame_count % self.ctx.process_every.max(1) == 0 {
            self.recognize(&frame).await;
        }

        render::annotate(&mut frame, &self.last_faces);
        match render::encode_jpeg(&frame, FRAME_QUALITY) {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                warn!(error = %e, "Failed to encode annotated frame");
                None
            }
        }
    }

    async fn recognize(&mut self, frame: &image::RgbImage) {
        let detections = match self.ctx.recognizer.detect_and_identify(frame).await {
            Ok(detections) => detections,
            Err(e) => {
                warn!(error = %e, "Face recognition failed");
                self.last_faces.clear();
                return;
            }
        };

        let roster = self.ctx.roster.current();
        self.last_faces.clear();

        for detection in detections {
            let identity = match detection.outcome {
                MatchOutcome::NoEncoding => continue,
                MatchOutcome::Matched(reference) => roster.identity_for(&reference),
                MatchOutcome::Unmatched => Identity::Unknown,
            };

            self.maybe_emit(frame, &detection.region, &identity);
            self.last_faces.push(FaceBox {
                region: detection.region,
                identity,
            });
        }
    }

    fn maybe_emit(&self, frame: &image::RgbImage, region: &super::Region, identity: &Identity) {
        // Only an encoded crop may consume the cooldown
        let Some(image) = render::encode_crop(frame, region) else {
            return;
        };
        if !self
            .ctx
            .gate
            .try_fire(identity.key(), self.ctx.event_cooldown, Instant::now())
        {
            debug!(identity = %identity, "Face event suppressed by cooldown");
            return;
        }

        info!(camera = %self.ctx.camera_id, identity = %identity, "Face detected");
        let event = FaceEvent::new(self.ctx.camera_id.clone(), identity.clone(), image);
        let sink = Arc::clone(&self.ctx.sink);
        tokio::spawn(async move {
            if sink.deliver(&event).await == Delivery::Failed {
                debug!(identity = %event.identity, "Face event dropped");
            }
        });
    }
}
