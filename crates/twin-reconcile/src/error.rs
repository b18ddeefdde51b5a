//! Error taxonomy for the reconciliation core.
//!
//! None of these escape [`crate::tick`]: the loop absorbs them and logs.
//! They are public so ports and tests can construct and match on them.

use thiserror::Error;

/// Desired-state payload could not be turned into a patch.
///
/// Callers keep the prior state and move on.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not valid JSON at all.
    #[error("malformed desired-state payload: {0}")]
    Malformed(String),

    /// Valid JSON, but the root is not an object.
    #[error("desired-state payload root is not a JSON object")]
    NotAnObject,
}

/// The transport refused to take an outbound message.
///
/// The message is dropped; there is no retry.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("transport outbound queue is full")]
    QueueFull,

    #[error("transport is disconnected")]
    Disconnected,

    #[error("transport rejected message: {0}")]
    Rejected(String),
}

/// Best-effort actuator write failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("channel {0} is not wired to an output")]
    ChannelOutOfRange(usize),

    #[error("output write failed: {0}")]
    Io(String),
}

/// Index outside `[0, CHANNEL_COUNT)`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel index {index} out of range (count = {count})")]
    OutOfRange { index: usize, count: usize },
    #[error("outlet {outlet} out of range (outlets are 1..={count})")]
    OutletOutOfRange { outlet: u32, count: usize },
}

/// Producer side of the inbound queue could not enqueue an event.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("inbound queue is full")]
    Full,

    #[error("inbound queue is closed")]
    Closed,
}
