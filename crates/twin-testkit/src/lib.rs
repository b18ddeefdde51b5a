//! Test doubles and fixtures for the outlet twin.
//!
//! Deterministic, in-process, no network. Scenario tests for the whole
//! reconciliation path live in this crate's `tests/` directory.

mod actuator;
mod transport;

pub use actuator::RecordingActuator;
pub use transport::{DispatchedEvent, ScriptedTransport};

use serde_json::{json, Map, Value};
use twin_reconcile::{
    inbound_queue, tick, InboundSender, ReconcilerContext, ReconcilerSettings, TickReport,
};

/// Complete twin snapshot with `desired.outlet.<n>` set for each `(n, level)`.
pub fn complete_doc(outlets: &[(u32, bool)]) -> String {
    json!({ "desired": { "outlet": outlet_map(outlets), "$version": 1 }, "reported": {} })
        .to_string()
}

/// Patch document with top-level `outlet.<n>` for each `(n, level)`.
pub fn partial_doc(outlets: &[(u32, bool)]) -> String {
    json!({ "outlet": outlet_map(outlets), "$version": 2 }).to_string()
}

fn outlet_map(outlets: &[(u32, bool)]) -> Value {
    let mut map = Map::new();
    for (n, level) in outlets {
        map.insert(n.to_string(), Value::Bool(*level));
    }
    Value::Object(map)
}

/// Context, doubles and the producer handle wired together.
pub struct Harness {
    pub ctx: ReconcilerContext,
    pub transport: ScriptedTransport,
    pub actuator: RecordingActuator,
    pub inbound: InboundSender,
}

impl Harness {
    pub fn new(queue_capacity: usize) -> Self {
        let (inbound, rx) = inbound_queue(queue_capacity);
        Self {
            ctx: ReconcilerContext::new(rx, ReconcilerSettings::default()),
            transport: ScriptedTransport::new(inbound.clone()),
            actuator: RecordingActuator::new(),
            inbound,
        }
    }

    pub fn tick(&mut self) -> TickReport {
        tick(&mut self.ctx, &mut self.transport, &mut self.actuator)
    }

    /// Tick once so the boot notification is out of the way.
    pub fn booted(queue_capacity: usize) -> Self {
        let mut h = Self::new(queue_capacity);
        let report = h.tick();
        assert!(report.boot_dispatched, "boot dispatch failed in harness");
        h
    }
}
