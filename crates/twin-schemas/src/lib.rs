//! Wire shapes exchanged with the remote twin service.
//!
//! Only data lives here. Building and parsing documents is done by
//! `twin-reconcile::codec`; this crate fixes the key names and the
//! envelope layout so both sides (device and test doubles) agree on them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root key under which a complete twin snapshot nests its desired values.
pub const DESIRED_KEY: &str = "desired";

/// Object key holding the per-outlet booleans (`outlet.<n>`, `n` is 1-based).
pub const OUTLET_KEY: &str = "outlet";

/// Auxiliary telemetry keys emitted as placeholders in every reported document.
pub const DEFAULT_AUX_FIELDS: &[&str] = &["temperature", "humidity"];

// ---------------------------------------------------------------------------
// DesiredScope
// ---------------------------------------------------------------------------

/// Which shape a desired-state document arrives in.
///
/// The first update after subscribing is a full twin snapshot with values
/// under `desired.*`; later updates are patches rooted at the top level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredScope {
    Complete,
    Partial,
}

impl DesiredScope {
    /// Namespace prefix the values are rooted under, if any.
    pub fn root_key(&self) -> Option<&'static str> {
        match self {
            DesiredScope::Complete => Some(DESIRED_KEY),
            DesiredScope::Partial => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DesiredScope::Complete => "complete",
            DesiredScope::Partial => "partial",
        }
    }
}

impl fmt::Display for DesiredScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised scope string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownScope(pub String);

impl fmt::Display for UnknownScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown desired scope '{}'; expected complete | partial",
            self.0
        )
    }
}

impl std::error::Error for UnknownScope {}

impl FromStr for DesiredScope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "complete" => Ok(DesiredScope::Complete),
            "partial" => Ok(DesiredScope::Partial),
            other => Err(UnknownScope(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Event envelopes
// ---------------------------------------------------------------------------

/// Per-channel event: `{"messageId": 3, "outlet": 2, "state": true}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelEvent {
    pub message_id: u64,
    /// 1-based outlet number.
    pub outlet: u32,
    pub state: bool,
}

/// Boot notification: `{"messageId": 0, "boot": true}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootEvent {
    pub message_id: u64,
    pub boot: bool,
}

/// Any event message the device emits.
///
/// Untagged: the two shapes are told apart by their fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventEnvelope {
    Channel(ChannelEvent),
    Boot(BootEvent),
}

impl EventEnvelope {
    pub fn message_id(&self) -> u64 {
        match self {
            EventEnvelope::Channel(ev) => ev.message_id,
            EventEnvelope::Boot(ev) => ev.message_id,
        }
    }

    pub fn is_boot(&self) -> bool {
        matches!(self, EventEnvelope::Boot(ev) if ev.boot)
    }
}
