use crate::{Channel, ChangeSet, StatePatch, StateVector};

/// Authoritative local copy of the applied output levels.
///
/// Starts with every channel off. [`TwinStore::apply_patch`] is the only
/// mutator; it completes in one call, so no half-applied state is ever
/// observable between ticks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TwinStore {
    state: StateVector,
}

impl TwinStore {
    pub fn new() -> Self {
        Self {
            state: StateVector::all_off(),
        }
    }

    pub fn current(&self) -> StateVector {
        self.state
    }

    /// Overwrite every channel the patch mentions with a different value and
    /// mark it changed. Absent or equal channels keep their slot `None`.
    pub fn apply_patch(&mut self, patch: &StatePatch) -> ChangeSet {
        let mut changes = ChangeSet::empty();
        for ch in Channel::all() {
            match patch.get(ch) {
                Some(level) if level != self.state.get(ch) => {
                    self.state.set(ch, level);
                    changes.mark(ch);
                }
                _ => {}
            }
        }
        changes
    }
}
