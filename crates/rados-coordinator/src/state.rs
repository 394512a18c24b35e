//! The per-key lifecycle state and the absence-is-idle convention.

use rados_core::ContentHash;
use std::collections::HashMap;

/// Whether a delete has been admitted for a key, and whether its physical removal
/// is still outstanding. A plain tagged variant suffices here: the coordinator
/// itself knows the fixed follow-up action, so there's nothing to close over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeleteState {
    #[default]
    None,
    Pending,
}

/// In-memory state for one content hash. All fields at their zero value is
/// equivalent to the key being absent from the table entirely.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyState {
    pub want_create: bool,
    pub creating: bool,
    pub readers: u32,
    pub want_delete: bool,
    pub deleting: DeleteState,
}

impl KeyState {
    pub fn is_idle(&self) -> bool {
        !self.want_create
            && !self.creating
            && self.readers == 0
            && !self.want_delete
            && self.deleting == DeleteState::None
    }
}

/// Read the state for `key`, defaulting to idle if absent.
pub fn get_state(table: &HashMap<ContentHash, KeyState>, key: &ContentHash) -> KeyState {
    table.get(key).copied().unwrap_or_default()
}

/// Write `state` back. A key whose state has returned to idle is removed from the
/// table rather than stored, preserving the "absence == idle" invariant.
pub fn set_state(table: &mut HashMap<ContentHash, KeyState>, key: ContentHash, state: KeyState) {
    if state.is_idle() {
        table.remove(&key);
    } else {
        table.insert(key, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_reads_as_idle_default() {
        let table = HashMap::new();
        let key = ContentHash::from_bytes([1; 32]);
        let state = get_state(&table, &key);
        assert!(state.is_idle());
    }

    #[test]
    fn idle_state_is_not_stored() {
        let mut table = HashMap::new();
        let key = ContentHash::from_bytes([2; 32]);
        set_state(&mut table, key, KeyState::default());
        assert!(!table.contains_key(&key));
    }

    #[test]
    fn non_idle_state_is_stored_and_removed_once_idle_again() {
        let mut table = HashMap::new();
        let key = ContentHash::from_bytes([3; 32]);

        let mut state = KeyState::default();
        state.creating = true;
        set_state(&mut table, key, state);
        assert!(table.contains_key(&key));

        state.creating = false;
        set_state(&mut table, key, state);
        assert!(!table.contains_key(&key));
    }
}
