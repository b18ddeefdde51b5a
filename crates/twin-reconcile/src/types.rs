use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ChannelError;

/// Number of relay outputs on the board. Fixed at build time.
pub const CHANNEL_COUNT: usize = 4;

/// Monotonically increasing id carried in every event message.
/// `0` is reserved for the boot notification.
pub type MessageId = u64;

/// Boot notification id.
pub const BOOT_MESSAGE_ID: MessageId = 0;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// One physical output, `0..CHANNEL_COUNT`.
///
/// On the wire channels are named by 1-based outlet number (`outlet.1` is
/// channel 0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Channel(usize);

impl Channel {
    pub fn new(index: usize) -> Result<Self, ChannelError> {
        if index < CHANNEL_COUNT {
            Ok(Self(index))
        } else {
            Err(ChannelError::OutOfRange {
                index,
                count: CHANNEL_COUNT,
            })
        }
    }

    /// Channel for a 1-based outlet number.
    pub fn from_outlet(outlet: u32) -> Result<Self, ChannelError> {
        match (outlet as usize).checked_sub(1) {
            Some(index) if index < CHANNEL_COUNT => Ok(Self(index)),
            _ => Err(ChannelError::OutletOutOfRange {
                outlet,
                count: CHANNEL_COUNT,
            }),
        }
    }

    pub fn index(self) -> usize {
        self.0
    }

    /// 1-based outlet number used in documents and telemetry.
    pub fn outlet(self) -> u32 {
        self.0 as u32 + 1
    }

    /// Every channel, ascending.
    pub fn all() -> impl Iterator<Item = Channel> {
        (0..CHANNEL_COUNT).map(Channel)
    }
}

impl TryFrom<usize> for Channel {
    type Error = ChannelError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Channel::new(index)
    }
}

impl From<Channel> for usize {
    fn from(ch: Channel) -> usize {
        ch.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "outlet.{}", self.outlet())
    }
}

// ---------------------------------------------------------------------------
// StateVector
// ---------------------------------------------------------------------------

/// On/off level of every channel. Always fully populated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateVector([bool; CHANNEL_COUNT]);

impl StateVector {
    pub fn new(levels: [bool; CHANNEL_COUNT]) -> Self {
        Self(levels)
    }

    /// Every output off. The boot state.
    pub fn all_off() -> Self {
        Self([false; CHANNEL_COUNT])
    }

    pub fn get(&self, channel: Channel) -> bool {
        self.0[channel.index()]
    }

    pub(crate) fn set(&mut self, channel: Channel, level: bool) {
        self.0[channel.index()] = level;
    }

    pub fn as_array(&self) -> &[bool; CHANNEL_COUNT] {
        &self.0
    }

    /// `(channel, level)` pairs, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, bool)> + '_ {
        Channel::all().map(move |ch| (ch, self.get(ch)))
    }
}

// ---------------------------------------------------------------------------
// StatePatch
// ---------------------------------------------------------------------------

/// Decoded desired document: one optional level per channel.
///
/// `None` means the document did not mention that outlet, which is NOT the
/// same as `Some(false)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StatePatch([Option<bool>; CHANNEL_COUNT]);

impl StatePatch {
    pub fn empty() -> Self {
        Self([None; CHANNEL_COUNT])
    }

    /// Patch that mentions every channel with the levels from `state`.
    pub fn full(state: &StateVector) -> Self {
        let mut patch = Self::empty();
        for (ch, level) in state.iter() {
            patch.set(ch, level);
        }
        patch
    }

    /// Builder form of [`StatePatch::set`].
    pub fn with(mut self, channel: Channel, level: bool) -> Self {
        self.set(channel, level);
        self
    }

    pub fn set(&mut self, channel: Channel, level: bool) {
        self.0[channel.index()] = Some(level);
    }

    pub fn get(&self, channel: Channel) -> Option<bool> {
        self.0[channel.index()]
    }

    /// `true` when the document mentioned no outlet at all.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Channel-wise merge: mentioned values win, absent ones keep `prior`.
    pub fn merged_over(&self, prior: &StateVector) -> StateVector {
        let mut out = *prior;
        for ch in Channel::all() {
            if let Some(level) = self.get(ch) {
                out.set(ch, level);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// Which channels differ from the previously stored state.
///
/// Slot `i` is either `None` or `Some(channel i)`; [`ChangeSet::mark`] is the
/// only way to fill a slot, so a slot can never name another channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChangeSet([Option<Channel>; CHANNEL_COUNT]);

impl ChangeSet {
    pub fn empty() -> Self {
        Self([None; CHANNEL_COUNT])
    }

    pub(crate) fn mark(&mut self, channel: Channel) {
        self.0[channel.index()] = Some(channel);
    }

    /// Raw slot view.
    pub fn slots(&self) -> &[Option<Channel>; CHANNEL_COUNT] {
        &self.0
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0[channel.index()].is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|s| s.is_some()).count()
    }

    /// Changed channels, ascending.
    pub fn changed(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.iter().flatten().copied()
    }

    /// Reset every slot to `None`.
    pub fn clear(&mut self) {
        self.0 = [None; CHANNEL_COUNT];
    }
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// One per changed channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub message_id: MessageId,
    pub channel: Channel,
    pub new_state: bool,
}

/// Opaque id the transport hands back for each accepted dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackingId(pub u64);

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trk-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(i: usize) -> Channel {
        Channel::new(i).unwrap()
    }

    #[test]
    fn channel_range_is_enforced() {
        assert!(Channel::new(CHANNEL_COUNT).is_err());
        for outlet in [0, CHANNEL_COUNT as u32 + 1, u32::MAX] {
            assert_eq!(
                Channel::from_outlet(outlet),
                Err(ChannelError::OutletOutOfRange {
                    outlet,
                    count: CHANNEL_COUNT
                })
            );
        }
        assert_eq!(
            Channel::from_outlet(0).unwrap_err().to_string(),
            "outlet 0 out of range (outlets are 1..=4)"
        );
        assert_eq!(Channel::from_outlet(1).unwrap(), ch(0));
        assert_eq!(ch(3).outlet(), 4);
        assert_eq!(ch(2).to_string(), "outlet.3");
    }

    #[test]
    fn patch_merge_keeps_absent_channels() {
        let prior = StateVector::new([true, false, true, false]);
        let patch = StatePatch::empty().with(ch(0), false).with(ch(1), true);
        assert_eq!(
            patch.merged_over(&prior),
            StateVector::new([false, true, true, false])
        );
        assert_eq!(StatePatch::empty().merged_over(&prior), prior);
    }

    #[test]
    fn change_set_slots_are_self_referential() {
        let mut cs = ChangeSet::empty();
        cs.mark(ch(2));
        cs.mark(ch(0));
        assert_eq!(cs.slots(), &[Some(ch(0)), None, Some(ch(2)), None]);
        assert_eq!(cs.changed().collect::<Vec<_>>(), vec![ch(0), ch(2)]);
        assert_eq!(cs.len(), 2);
        cs.clear();
        assert!(cs.is_empty());
    }

    #[test]
    fn channel_serde_rejects_out_of_range_index() {
        assert_eq!(serde_json::to_string(&ch(1)).unwrap(), "1");
        assert!(serde_json::from_str::<Channel>("9").is_err());
    }
}
