//! Delivery confirmation tracking.
//!
//! # Semantics
//!
//! - Every accepted dispatch increments `dispatched` and retains a
//!   [`DeliveryRecord`] as the message's transient resource.
//! - Every confirmation with `ok == true` increments `confirmed`.
//! - `settled()` is `confirmed == dispatched`. When it flips from false to
//!   true, every retained record is released in one batch.
//!
//! At most [`RETAINED_LIMIT`] records are held. Once a confirmation is lost
//! the counts never meet again, so past that limit the oldest record is
//! evicted (and counted) to keep memory flat.
//!
//! Only counts are compared. A confirmation is never matched to the record
//! it belongs to, so under loss or duplication the batch can be released
//! too early or never. Matching by tracking id would close that gap; it is
//! a behaviour change and is not done here.

use std::collections::VecDeque;

use serde::Serialize;

use crate::{Channel, MessageId, TrackingId};

/// Default cap on records held while unsettled.
pub const RETAINED_LIMIT: usize = 256;

/// Confirmation status of a retained record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Confirmed,
}

/// One dispatched message kept alive until the tracker settles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    pub tracking_id: TrackingId,
    pub message_id: MessageId,
    /// `None` for the boot notification.
    pub channel: Option<Channel>,
    pub state: DeliveryState,
}

impl DeliveryRecord {
    pub fn pending(tracking_id: TrackingId, message_id: MessageId, channel: Option<Channel>) -> Self {
        Self {
            tracking_id,
            message_id,
            channel,
            state: DeliveryState::Pending,
        }
    }
}

/// Records released on a false -> true transition of `settled()`.
///
/// The transition can happen on a confirmation or, after a surplus
/// confirmation, on a dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Released {
    pub records: Vec<DeliveryRecord>,
}

/// Counts dispatched vs confirmed messages.
#[derive(Clone, Debug)]
pub struct DeliveryTracker {
    dispatched: u64,
    confirmed: u64,
    retained: VecDeque<DeliveryRecord>,
    limit: usize,
    evicted: u64,
}

impl Default for DeliveryTracker {
    fn default() -> Self {
        Self::with_limit(RETAINED_LIMIT)
    }
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker holding at most `limit` records (at least 1).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            dispatched: 0,
            confirmed: 0,
            retained: VecDeque::new(),
            limit: limit.max(1),
            evicted: 0,
        }
    }

    /// Count an accepted dispatch and retain its record.
    ///
    /// Returns the released batch if this dispatch brings the counts level.
    pub fn on_dispatch(&mut self, record: DeliveryRecord) -> Option<Released> {
        let was_settled = self.settled();
        self.dispatched += 1;
        if self.retained.len() == self.limit {
            self.retained.pop_front();
            self.evicted += 1;
        }
        self.retained.push_back(record);
        self.release_on_transition(was_settled)
    }

    /// Count a confirmation. Failed confirmations are not counted.
    ///
    /// Returns the released batch when this confirmation settles the tracker.
    pub fn on_confirm(&mut self, ok: bool) -> Option<Released> {
        if !ok {
            return None;
        }
        let was_settled = self.settled();
        self.confirmed += 1;
        self.release_on_transition(was_settled)
    }

    fn release_on_transition(&mut self, was_settled: bool) -> Option<Released> {
        if was_settled || !self.settled() {
            return None;
        }
        let records = self
            .retained
            .drain(..)
            .map(|r| DeliveryRecord {
                state: DeliveryState::Confirmed,
                ..r
            })
            .collect();
        Some(Released { records })
    }

    pub fn settled(&self) -> bool {
        self.confirmed == self.dispatched
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn confirmed(&self) -> u64 {
        self.confirmed
    }

    /// Records still held because the tracker has not settled yet, oldest first.
    pub fn retained(&self) -> impl ExactSizeIterator<Item = &DeliveryRecord> + '_ {
        self.retained.iter()
    }

    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// Records dropped unreleased because the cap was reached.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
