//! Progress events for running batches.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use reel_models::BatchId;

/// Default number of buffered events per subscriber.
pub const DEFAULT_PROGRESS_CAPACITY: usize = 256;

/// Lifecycle event of a batch or one of its units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    BatchStarted {
        batch_id: BatchId,
        total_units: usize,
    },
    UnitStarted {
        batch_id: BatchId,
        unit_index: usize,
    },
    UnitRetrying {
        batch_id: BatchId,
        unit_index: usize,
        attempt: u32,
        error: String,
    },
    UnitSucceeded {
        batch_id: BatchId,
        unit_index: usize,
        artifact_url: String,
        credits_charged: u32,
    },
    UnitFailed {
        batch_id: BatchId,
        unit_index: usize,
        error: String,
    },
    BatchFinished {
        batch_id: BatchId,
        completed_units: usize,
        failed_units: usize,
    },
}

impl ProgressEvent {
    pub fn batch_id(&self) -> &BatchId {
        match self {
            ProgressEvent::BatchStarted { batch_id, .. }
            | ProgressEvent::UnitStarted { batch_id, .. }
            | ProgressEvent::UnitRetrying { batch_id, .. }
            | ProgressEvent::UnitSucceeded { batch_id, .. }
            | ProgressEvent::UnitFailed { batch_id, .. }
            | ProgressEvent::BatchFinished { batch_id, .. } => batch_id,
        }
    }

    /// Unit the event refers to, if any.
    pub fn unit_index(&self) -> Option<usize> {
        match self {
            ProgressEvent::UnitStarted { unit_index, .. }
            | ProgressEvent::UnitRetrying { unit_index, .. }
            | ProgressEvent::UnitSucceeded { unit_index, .. }
            | ProgressEvent::UnitFailed { unit_index, .. } => Some(*unit_index),
            ProgressEvent::BatchStarted { .. } | ProgressEvent::BatchFinished { .. } => None,
        }
    }
}

/// In-process fan-out of progress events.
///
/// Publishing never blocks and never fails; events are dropped when nobody
/// is subscribed, and slow subscribers observe `Lagged`.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    sender: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_CAPACITY)
    }
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ProgressEvent) {
        trace!(batch_id = %event.batch_id(), "Publishing progress event: {:?}", event);
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
