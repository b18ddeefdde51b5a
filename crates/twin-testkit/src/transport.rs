//! Scripted transport: records everything, confirms on demand.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use twin_reconcile::{
    Disposition, DispatchError, InboundEvent, InboundSender, TrackingId, Transport,
};
use twin_schemas::EventEnvelope;

/// One accepted event dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub tracking_id: TrackingId,
    pub payload: Vec<u8>,
}

/// In-memory [`Transport`] for scenario tests.
///
/// - Accepted event dispatches get tracking ids `1, 2, 3, …` and stay
///   unconfirmed until [`ScriptedTransport::confirm`] (any order) or, with
///   auto-confirm on, the next `service_once`.
/// - Refusals can be scripted for event and reported-state dispatches.
#[derive(Debug)]
pub struct ScriptedTransport {
    inbound: InboundSender,
    next_tracking: u64,
    events: Vec<DispatchedEvent>,
    reported: Vec<Vec<u8>>,
    unconfirmed: Vec<TrackingId>,
    unacked_reports: usize,
    auto_confirm: bool,
    refuse_events: usize,
    refuse_reported: bool,
    settled: Vec<(u64, Disposition)>,
    service_calls: usize,
}

impl ScriptedTransport {
    pub fn new(inbound: InboundSender) -> Self {
        Self {
            inbound,
            next_tracking: 0,
            events: Vec::new(),
            reported: Vec::new(),
            unconfirmed: Vec::new(),
            unacked_reports: 0,
            auto_confirm: false,
            refuse_events: 0,
            refuse_reported: false,
            settled: Vec::new(),
            service_calls: 0,
        }
    }

    /// Confirm every dispatch (and ack every report) on the next service call.
    pub fn set_auto_confirm(&mut self, on: bool) {
        self.auto_confirm = on;
    }

    /// Refuse the next `n` event dispatches.
    pub fn refuse_next_events(&mut self, n: usize) {
        self.refuse_events = n;
    }

    pub fn set_refuse_reported(&mut self, on: bool) {
        self.refuse_reported = on;
    }

    /// Deliver a confirmation for `tracking_id` onto the inbound queue.
    pub fn confirm(&mut self, tracking_id: TrackingId, ok: bool) -> Result<()> {
        let Some(pos) = self.unconfirmed.iter().position(|t| *t == tracking_id) else {
            bail!("{tracking_id} is not awaiting confirmation");
        };
        self.unconfirmed.remove(pos);
        self.inbound
            .confirm(tracking_id, ok)
            .with_context(|| format!("enqueue confirmation for {tracking_id}"))
    }

    pub fn unconfirmed(&self) -> &[TrackingId] {
        &self.unconfirmed
    }

    pub fn events(&self) -> &[DispatchedEvent] {
        &self.events
    }

    /// Event payloads parsed back into envelopes, in dispatch order.
    pub fn envelopes(&self) -> Result<Vec<EventEnvelope>> {
        self.events
            .iter()
            .map(|e| serde_json::from_slice(&e.payload).context("event payload is not an envelope"))
            .collect()
    }

    /// Reported-state documents, in dispatch order.
    pub fn reported_documents(&self) -> Result<Vec<Value>> {
        self.reported
            .iter()
            .map(|r| serde_json::from_slice(r).context("reported payload is not JSON"))
            .collect()
    }

    pub fn settled_messages(&self) -> &[(u64, Disposition)] {
        &self.settled
    }

    pub fn service_calls(&self) -> usize {
        self.service_calls
    }
}

impl Transport for ScriptedTransport {
    fn service_once(&mut self) {
        self.service_calls += 1;
        if !self.auto_confirm {
            return;
        }

        while let Some(&tracking_id) = self.unconfirmed.first() {
            if self.inbound.confirm(tracking_id, true).is_err() {
                // Queue full: the rest go out on the next call.
                return;
            }
            self.unconfirmed.remove(0);
        }
        while self.unacked_reports > 0 {
            if self
                .inbound
                .push(InboundEvent::ReportedAck { status: 204 })
                .is_err()
            {
                return;
            }
            self.unacked_reports -= 1;
        }
    }

    fn dispatch(&mut self, payload: Vec<u8>) -> Result<TrackingId, DispatchError> {
        if self.refuse_events > 0 {
            self.refuse_events -= 1;
            return Err(DispatchError::QueueFull);
        }
        self.next_tracking += 1;
        let tracking_id = TrackingId(self.next_tracking);
        self.events.push(DispatchedEvent {
            tracking_id,
            payload,
        });
        self.unconfirmed.push(tracking_id);
        Ok(tracking_id)
    }

    fn dispatch_reported_state(&mut self, payload: Vec<u8>) -> Result<(), DispatchError> {
        if self.refuse_reported {
            return Err(DispatchError::Disconnected);
        }
        self.reported.push(payload);
        self.unacked_reports += 1;
        Ok(())
    }

    fn settle_message(&mut self, message_ref: u64, disposition: Disposition) {
        self.settled.push((message_ref, disposition));
    }
}
