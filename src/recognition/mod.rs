//! Camera-side recognition ingestion.
//!
//! Each camera connection streams JPEG frames. Every Nth frame goes through
//! the injected [`Recognizer`]; detected identities pass the cooldown gate
//! before a face event is sent to the hub. Every frame is annotated and
//! forwarded to all connected viewers.

mod pipeline;
mod remote;
pub mod render;
mod roster;
mod server;
mod viewers;

#[cfg(test)]
mod tests;

pub use pipeline::{FramePipeline, PipelineContext};
pub use remote::HttpRecognizer;
pub use roster::{Roster, RosterEntry, SharedRoster};
pub use server::{create_camera_router, CameraAppState};
pub use viewers::ViewerSet;

use anyhow::Result;
use async_trait::async_trait;
use image::RgbImage;

/// Face bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// What the recognizer made of one detected region
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Matched an enrolled reference (file name or enrolled name)
    Matched(String),
    /// Encoded but matched nothing in the roster
    Unmatched,
    /// Region found but no encoding could be computed; skipped
    NoEncoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub region: Region,
    pub outcome: MatchOutcome,
}

/// Face detection and matching capability.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn detect_and_identify(&self, frame: &RgbImage) -> Result<Vec<Detection>>;
}

/// Recognizer used when no recognition service is configured.
pub struct NoopRecognizer;

#[async_trait]
impl Recognizer for NoopRecognizer {
    async fn detect_and_identify(&self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}
