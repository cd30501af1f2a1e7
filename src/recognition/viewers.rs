use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Frames buffered per viewer before new frames are dropped for it
pub const VIEWER_QUEUE_DEPTH: usize = 4;

type FrameSender = mpsc::Sender<Arc<Vec<u8>>>;

/// Process-wide set of connected frame viewers.
///
/// Each viewer is the bounded outgoing queue of one WebSocket connection. A
/// viewer that falls behind misses frames instead of buffering them.
/// Broadcasts iterate over a copy of the set, so connections may join or
/// leave while a frame is being fanned out.
#[derive(Clone, Default)]
pub struct ViewerSet {
    viewers: Arc<RwLock<HashMap<Uuid, FrameSender>>>,
}

impl ViewerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer; frames arrive on the returned receiver.
    pub fn join(&self) -> (Uuid, mpsc::Receiver<Arc<Vec<u8>>>) {
        let (tx, rx) = mpsc::channel(VIEWER_QUEUE_DEPTH);
        let id = Uuid::new_v4();
        self.viewers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        info!(viewer_id = %id, viewers = self.len(), "Viewer joined");
        (id, rx)
    }

    /// Remove a viewer; removing twice is a no-op.
    pub fn leave(&self, id: &Uuid) -> bool {
        let removed = self
            .viewers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some();
        if removed {
            info!(viewer_id = %id, "Viewer left");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.viewers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send one frame to every viewer without waiting. Viewers with a full
    /// queue skip this frame; viewers whose queue is closed are removed.
    /// Returns how many viewers received it.
    pub fn broadcast(&self, frame: Vec<u8>) -> usize {
        let frame = Arc::new(frame);
        let snapshot: Vec<(Uuid, FrameSender)> = self
            .viewers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx) in snapshot {
            match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => trace!(viewer_id = %id, "Viewer behind, skipping frame"),
                Err(TrySendError::Closed(_)) => dead.push(id),
            }
        }

        for id in dead {
            debug!(viewer_id = %id, "Dropping unreachable viewer");
            self.leave(&id);
        }
        delivered
    }
}
