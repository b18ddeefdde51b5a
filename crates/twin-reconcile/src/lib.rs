//! twin-reconcile
//!
//! Keeps N relay outputs in step with a remotely authored desired-state
//! document and reports the applied state back.
//!
//! Architectural decisions:
//! - Absent outlet keys mean "unchanged", never "off"
//! - One telemetry message per changed channel, ascending channel order
//! - Boot notification (`messageId == 0`) is always the first dispatch
//! - Delivery is settled by counts only (dispatched == confirmed)
//! - All failures are absorbed and logged; nothing propagates out of a tick
//!
//! Deterministic logic. The only IO happens behind the [`Transport`] and
//! [`ActuatorPort`] traits supplied by the caller.

pub mod codec;
mod delivery;
mod diff;
mod error;
mod ports;
mod queue;
mod reconciler;
mod store;
mod types;

pub use delivery::{DeliveryRecord, DeliveryState, DeliveryTracker, Released, RETAINED_LIMIT};
pub use diff::DiffEngine;
pub use error::{ActuatorError, ChannelError, DecodeError, DispatchError, QueueError};
pub use ports::{ActuatorPort, Disposition, Transport};
pub use queue::{inbound_queue, InboundEvent, InboundReceiver, InboundSender};
pub use reconciler::{
    tick, Phase, Reconciler, ReconcilerContext, ReconcilerSettings, TickReport, TwinSnapshot,
};
pub use store::TwinStore;
pub use types::*;

pub use twin_schemas::DesiredScope;
