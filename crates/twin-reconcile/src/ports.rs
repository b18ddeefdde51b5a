//! Boundaries to the outside world.
//!
//! The reconciliation core never talks to hardware or the network directly.
//! Callers plug in a [`Transport`] (remote twin service) and an
//! [`ActuatorPort`] (relay outputs); test doubles live in `twin-testkit`.

use serde::{Deserialize, Serialize};

use crate::{ActuatorError, Channel, DispatchError, TrackingId};

/// Raw digital output write.
///
/// Best-effort: an error is logged by the caller and the cycle continues.
pub trait ActuatorPort {
    fn write(&mut self, channel: Channel, level: bool) -> Result<(), ActuatorError>;
}

/// Outcome reported back for a cloud-to-device message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Handled; do not redeliver.
    Accepted,
    /// Not handled and never will be; do not redeliver.
    Rejected,
    /// Not handled this time; the transport may redeliver.
    Abandoned,
}

/// Remote twin service connection.
///
/// # Contract
/// - `service_once` is bounded and non-blocking. It flushes outbound work
///   and pushes inbound events (desired updates, confirmations) onto the
///   [`crate::InboundSender`] the transport was built with. It never calls
///   back into the reconciler.
/// - `dispatch` returns the tracking id that a later
///   [`crate::InboundEvent::Confirmation`] will carry.
pub trait Transport {
    fn service_once(&mut self);

    fn dispatch(&mut self, payload: Vec<u8>) -> Result<TrackingId, DispatchError>;

    fn dispatch_reported_state(&mut self, payload: Vec<u8>) -> Result<(), DispatchError>;

    /// Report how a cloud-to-device message was handled.
    fn settle_message(&mut self, message_ref: u64, disposition: Disposition);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn service_once(&mut self) {
        (**self).service_once()
    }

    fn dispatch(&mut self, payload: Vec<u8>) -> Result<TrackingId, DispatchError> {
        (**self).dispatch(payload)
    }

    fn dispatch_reported_state(&mut self, payload: Vec<u8>) -> Result<(), DispatchError> {
        (**self).dispatch_reported_state(payload)
    }

    fn settle_message(&mut self, message_ref: u64, disposition: Disposition) {
        (**self).settle_message(message_ref, disposition)
    }
}

impl<A: ActuatorPort + ?Sized> ActuatorPort for Box<A> {
    fn write(&mut self, channel: Channel, level: bool) -> Result<(), ActuatorError> {
        (**self).write(channel, level)
    }
}
