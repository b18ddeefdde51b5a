use tracing::debug;

use crate::{ChangeSet, StatePatch, TwinStore};

/// Applies decoded patches to the store and counts effective twin updates.
///
/// The counter moves once per patch that changed at least one channel; a
/// patch that changes nothing leaves it where it is.
#[derive(Clone, Debug, Default)]
pub struct DiffEngine {
    twin_updates: u64,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, store: &mut TwinStore, patch: &StatePatch) -> ChangeSet {
        let changes = store.apply_patch(patch);
        if changes.is_empty() {
            debug!("desired update matches current state; nothing to apply");
        } else {
            self.twin_updates += 1;
            debug!(
                twin_updates = self.twin_updates,
                changed = changes.len(),
                "desired update changed outputs"
            );
        }
        changes
    }

    /// Number of patches that changed at least one channel.
    pub fn twin_updates(&self) -> u64 {
        self.twin_updates
    }
}
