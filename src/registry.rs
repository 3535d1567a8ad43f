use std::collections::BTreeMap;

use gpui::{FocusHandle, WeakFocusHandle};

use crate::value::FieldKey;

#[derive(Clone, Default)]
struct ComponentBinding {
    focus: Option<WeakFocusHandle>,
    revision: u64,
}

/// Non-owning table of rendered field components.
///
/// Holds only weak focus handles: dropping the input element invalidates the
/// binding without the registry being involved.
#[derive(Clone, Default)]
pub(crate) struct FieldRegistry {
    bindings: BTreeMap<FieldKey, ComponentBinding>,
}

impl FieldRegistry {
    /// Returns true when an earlier binding was replaced.
    pub(crate) fn store(&mut self, key: FieldKey, handle: &FocusHandle) -> bool {
        let binding = self.bindings.entry(key).or_default();
        binding.focus.replace(handle.downgrade()).is_some()
    }

    pub(crate) fn bump(&mut self, key: FieldKey) -> u64 {
        let binding = self.bindings.entry(key).or_default();
        binding.revision = binding.revision.wrapping_add(1);
        binding.revision
    }

    pub(crate) fn revision(&self, key: FieldKey) -> u64 {
        self.bindings.get(&key).map_or(0, |binding| binding.revision)
    }

    pub(crate) fn focus_handle(&self, key: FieldKey) -> Option<FocusHandle> {
        self.bindings
            .get(&key)
            .and_then(|binding| binding.focus.as_ref())
            .and_then(WeakFocusHandle::upgrade)
    }

    pub(crate) fn is_mounted(&self, key: FieldKey) -> bool {
        self.focus_handle(key).is_some()
    }
}
