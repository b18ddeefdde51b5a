//! Loopback hub: an in-process stand-in for the remote twin service.
//!
//! Every accepted payload is published on the SSE bus. With `auto_confirm`
//! on, each event dispatch is confirmed (and each reported-state update
//! acknowledged) on the next `service_once`, by pushing onto the same
//! inbound queue the reconciler drains. Confirmations therefore reach the
//! engine on the reconciliation task, never from inside a dispatch call.
//!
//! With `auto_confirm` off the hub keeps no per-dispatch state; an operator
//! confirms tracking ids through `POST /v1/confirmations` instead.

use std::collections::VecDeque;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use twin_reconcile::{
    Disposition, DispatchError, InboundEvent, InboundSender, QueueError, TrackingId, Transport,
};

use crate::state::BusMsg;

const REPORTED_ACK_STATUS: u16 = 204;

pub struct LoopbackHub {
    bus: broadcast::Sender<BusMsg>,
    inbound: InboundSender,
    auto_confirm: bool,
    next_tracking: u64,
    unconfirmed: VecDeque<TrackingId>,
    unacked_reports: usize,
}

impl LoopbackHub {
    pub fn new(bus: broadcast::Sender<BusMsg>, inbound: InboundSender, auto_confirm: bool) -> Self {
        Self {
            bus,
            inbound,
            auto_confirm,
            next_tracking: 0,
            unconfirmed: VecDeque::new(),
            unacked_reports: 0,
        }
    }

    /// Dispatches not yet confirmed back to the engine.
    pub fn pending_confirmations(&self) -> usize {
        self.unconfirmed.len()
    }

    /// Push queued confirmations; stops at the first full-queue refusal.
    fn flush_confirmations(&mut self) -> Result<(), QueueError> {
        while let Some(&tracking_id) = self.unconfirmed.front() {
            self.inbound.confirm(tracking_id, true)?;
            self.unconfirmed.pop_front();
        }
        while self.unacked_reports > 0 {
            self.inbound.push(InboundEvent::ReportedAck {
                status: REPORTED_ACK_STATUS,
            })?;
            self.unacked_reports -= 1;
        }
        Ok(())
    }
}

fn payload_json(payload: &[u8]) -> serde_json::Value {
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(payload).into_owned()))
}

impl Transport for LoopbackHub {
    fn service_once(&mut self) {
        if !self.auto_confirm {
            return;
        }
        match self.flush_confirmations() {
            Ok(()) => {}
            Err(QueueError::Full) => {
                debug!(
                    pending = self.unconfirmed.len(),
                    "inbound queue full; confirmations carried to next service call"
                );
            }
            Err(QueueError::Closed) => {
                warn!("inbound queue closed; dropping pending confirmations");
                self.unconfirmed.clear();
                self.unacked_reports = 0;
            }
        }
    }

    fn dispatch(&mut self, payload: Vec<u8>) -> Result<TrackingId, DispatchError> {
        self.next_tracking += 1;
        let tracking_id = TrackingId(self.next_tracking);
        let _ = self.bus.send(BusMsg::Telemetry {
            tracking_id: tracking_id.0,
            payload: payload_json(&payload),
        });
        if self.auto_confirm {
            self.unconfirmed.push_back(tracking_id);
        }
        Ok(tracking_id)
    }

    fn dispatch_reported_state(&mut self, payload: Vec<u8>) -> Result<(), DispatchError> {
        let _ = self.bus.send(BusMsg::Reported {
            payload: payload_json(&payload),
        });
        if self.auto_confirm {
            self.unacked_reports += 1;
        }
        Ok(())
    }

    fn settle_message(&mut self, message_ref: u64, disposition: Disposition) {
        info!(message_ref, ?disposition, "cloud message settled");
        let _ = self.bus.send(BusMsg::LogLine {
            level: "INFO".to_string(),
            msg: format!("message {message_ref} settled as {disposition:?}"),
        });
    }
}
