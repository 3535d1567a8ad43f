use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::value::{FieldKey, FieldValue, FormValues};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConditionAction {
    Hide,
    Disable,
}

pub type CompareFn = Arc<dyn Fn(&FieldValue, &FormValues) -> bool + Send + Sync>;

/// One or more fields targeted by a [`Condition`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConditionTarget(Vec<FieldKey>);

impl ConditionTarget {
    pub fn keys(&self) -> &[FieldKey] {
        &self.0
    }
}

impl From<&'static str> for ConditionTarget {
    fn from(key: &'static str) -> Self {
        Self(vec![FieldKey::new(key)])
    }
}

impl From<FieldKey> for ConditionTarget {
    fn from(key: FieldKey) -> Self {
        Self(vec![key])
    }
}

impl<const N: usize> From<[&'static str; N]> for ConditionTarget {
    fn from(keys: [&'static str; N]) -> Self {
        Self(keys.into_iter().map(FieldKey::new).collect())
    }
}

impl<const N: usize> From<[FieldKey; N]> for ConditionTarget {
    fn from(keys: [FieldKey; N]) -> Self {
        Self(keys.to_vec())
    }
}

impl From<Vec<FieldKey>> for ConditionTarget {
    fn from(keys: Vec<FieldKey>) -> Self {
        Self(keys)
    }
}

/// Derives the hidden or disabled state of `target` from the value of `name`.
///
/// `compare` runs while the form's state lock is held, so it must not call
/// back into the `FormApi`.
#[derive(Clone)]
pub struct Condition {
    pub name: FieldKey,
    pub target: ConditionTarget,
    pub action: ConditionAction,
    pub compare: CompareFn,
}

impl Condition {
    pub fn new(
        name: impl Into<FieldKey>,
        target: impl Into<ConditionTarget>,
        action: ConditionAction,
        compare: impl Fn(&FieldValue, &FormValues) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            action,
            compare: Arc::new(compare),
        }
    }

    pub fn hide(
        name: impl Into<FieldKey>,
        target: impl Into<ConditionTarget>,
        compare: impl Fn(&FieldValue, &FormValues) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, target, ConditionAction::Hide, compare)
    }

    pub fn disable(
        name: impl Into<FieldKey>,
        target: impl Into<ConditionTarget>,
        compare: impl Fn(&FieldValue, &FormValues) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, target, ConditionAction::Disable, compare)
    }

    pub fn is_met(&self, values: &FormValues) -> bool {
        let value = values.get(&self.name).unwrap_or(&FieldValue::Empty);
        (self.compare)(value, values)
    }

    pub(crate) fn referenced_keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        std::iter::once(self.name).chain(self.target.keys().iter().copied())
    }
}

impl Debug for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Hidden and disabled flags derived from the declared conditions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DerivedState {
    hidden: BTreeSet<FieldKey>,
    disabled: BTreeSet<FieldKey>,
}

impl DerivedState {
    pub fn is_hidden(&self, key: FieldKey) -> bool {
        self.hidden.contains(&key)
    }

    pub fn is_disabled(&self, key: FieldKey) -> bool {
        self.disabled.contains(&key)
    }

    pub fn hidden(&self) -> &BTreeSet<FieldKey> {
        &self.hidden
    }

    pub fn disabled(&self) -> &BTreeSet<FieldKey> {
        &self.disabled
    }

    /// Fields whose hidden or disabled flag differs between the two states.
    pub fn changed_since(&self, previous: &DerivedState) -> BTreeSet<FieldKey> {
        let hidden = self.hidden.symmetric_difference(&previous.hidden);
        let disabled = self.disabled.symmetric_difference(&previous.disabled);
        hidden.chain(disabled).copied().collect()
    }
}

/// Any met condition applies its action; hide and disable are tracked
/// separately.
pub fn evaluate(conditions: &[Condition], values: &FormValues) -> DerivedState {
    let mut state = DerivedState::default();
    for condition in conditions {
        if !condition.is_met(values) {
            continue;
        }
        let flags = match condition.action {
            ConditionAction::Hide => &mut state.hidden,
            ConditionAction::Disable => &mut state.disabled,
        };
        flags.extend(condition.target.keys().iter().copied());
    }
    state
}
