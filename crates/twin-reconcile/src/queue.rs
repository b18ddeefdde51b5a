//! Bounded inbound event queue.
//!
//! Transports push, the reconciliation loop drains once per tick. This is
//! how work produced by the transport (possibly on another thread) gets
//! back onto the single reconciliation thread.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::{DesiredScope, QueueError, TrackingId};

/// Everything a transport can hand to the reconciler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// Desired-state document (twin snapshot or patch).
    DesiredUpdate {
        scope: DesiredScope,
        payload: Vec<u8>,
    },
    /// Cloud-to-device message carrying a desired patch.
    CloudMessage { message_ref: u64, payload: Vec<u8> },
    /// Delivery outcome for a dispatched event message.
    Confirmation { tracking_id: TrackingId, ok: bool },
    /// Remote acknowledged a reported-state update.
    ReportedAck { status: u16 },
}

/// Producer handle. Cheap to clone.
#[derive(Clone, Debug)]
pub struct InboundSender {
    tx: mpsc::Sender<InboundEvent>,
}

impl InboundSender {
    /// Non-blocking enqueue.
    pub fn push(&self, event: InboundEvent) -> Result<(), QueueError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    pub fn desired(&self, scope: DesiredScope, payload: impl Into<Vec<u8>>) -> Result<(), QueueError> {
        self.push(InboundEvent::DesiredUpdate {
            scope,
            payload: payload.into(),
        })
    }

    pub fn confirm(&self, tracking_id: TrackingId, ok: bool) -> Result<(), QueueError> {
        self.push(InboundEvent::Confirmation { tracking_id, ok })
    }
}

/// Consumer handle, owned by the reconciler context.
#[derive(Debug)]
pub struct InboundReceiver {
    rx: mpsc::Receiver<InboundEvent>,
    capacity: usize,
}

impl InboundReceiver {
    /// Next queued event, if any. Never blocks.
    pub fn try_next(&mut self) -> Option<InboundEvent> {
        match self.rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Create a bounded queue. `capacity` is clamped to at least 1.
pub fn inbound_queue(capacity: usize) -> (InboundSender, InboundReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (InboundSender { tx }, InboundReceiver { rx, capacity })
}
