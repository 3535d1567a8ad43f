use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use gpui::{FocusHandle, Window};

use crate::condition::{self, Condition, DerivedState};
use crate::model::FormModel;
use crate::registry::FieldRegistry;
use crate::schema::{FormFieldError, Schema};
use crate::value::{FieldKey, FieldPath, FieldValue, FormValues, FromFieldValue, object_entry};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

/// When the interaction paths (`change_field`, `touch`) validate a field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_mode: ValidationMode,
    /// Programmatic `set_field`/`set_fields` also mark fields touched.
    pub touch_on_set: bool,
    /// Hidden fields never carry validation errors.
    pub skip_hidden_fields: bool,
    pub focus_first_error_on_submit: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_mode: ValidationMode::OnSubmit,
            touch_on_set: false,
            skip_hidden_fields: false,
            focus_first_error_on_submit: true,
        }
    }
}

/// Everything a field component needs to render.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldState {
    pub value: FieldValue,
    pub touched: bool,
    pub error: Option<FormFieldError>,
    pub visible: bool,
    pub disabled: bool,
    pub revision: u64,
}

#[derive(Clone, Debug)]
pub struct FormSnapshot {
    pub values: FormValues,
    pub touched: BTreeSet<FieldKey>,
    pub errors: BTreeMap<FieldKey, FormFieldError>,
    pub submit_state: SubmitState,
    pub submit_count: u32,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
    UnknownField(FieldKey),
    InvalidPath(String),
    FieldType {
        key: FieldKey,
        expected: &'static str,
    },
    InvalidStateTransition {
        from: SubmitState,
        to: SubmitState,
    },
    AlreadySubmitting,
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
            FormError::UnknownField(key) => write!(f, "unknown form field `{key}`"),
            FormError::InvalidPath(path) => write!(f, "invalid field path `{path}`"),
            FormError::FieldType { key, expected } => {
                write!(f, "field `{key}` does not hold a value of type {expected}")
            }
            FormError::InvalidStateTransition { from, to } => {
                write!(f, "invalid submit state transition: {from:?} -> {to:?}")
            }
            FormError::AlreadySubmitting => f.write_str("form submit is already in progress"),
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

pub(crate) type ChangeListener = Arc<dyn Fn(FieldKey, &FieldValue) + Send + Sync>;
pub(crate) type ComponentListener = Arc<dyn Fn(FieldKey, u64) + Send + Sync>;

pub(crate) struct FormState {
    pub(crate) id: FormId,
    pub(crate) initial_values: FormValues,
    pub(crate) values: FormValues,
    pub(crate) touched: BTreeSet<FieldKey>,
    pub(crate) errors: BTreeMap<FieldKey, FormFieldError>,
    pub(crate) derived: DerivedState,
    pub(crate) submit_state: SubmitState,
    pub(crate) submit_count: u32,
    pub(crate) ticket: ValidationTicket,
    pub(crate) published: bool,
}

impl FormState {
    pub(crate) fn ensure_known(&self, key: FieldKey) -> FormResult<()> {
        if self.values.contains_key(&key) {
            return Ok(());
        }
        log::warn!("form {:?}: rejected access to unknown field `{key}`", self.id);
        Err(FormError::UnknownField(key))
    }

    pub(crate) fn next_ticket(&mut self) -> ValidationTicket {
        self.ticket = ValidationTicket(self.ticket.0.wrapping_add(1));
        self.ticket
    }
}

/// Handle to one form's state. Clones share the same store.
#[derive(Clone)]
pub struct FormApi {
    pub(crate) options: FormOptions,
    pub(crate) schema: Arc<Schema>,
    pub(crate) state: Arc<RwLock<FormState>>,
    pub(crate) conditions: Arc<RwLock<Vec<Condition>>>,
    pub(crate) registry: Arc<RwLock<FieldRegistry>>,
    pub(crate) change_listeners: Arc<RwLock<Vec<ChangeListener>>>,
    pub(crate) component_listeners: Arc<RwLock<Vec<ComponentListener>>>,
}

impl FormApi {
    /// Creates the store. Keys that only the schema declares start out
    /// `Empty`, so every schema field is addressable.
    pub fn new(initial_values: FormValues, schema: Schema, options: FormOptions) -> Self {
        let mut initial_values = initial_values;
        for key in schema.keys() {
            if !initial_values.contains_key(&key) {
                initial_values.insert(key, FieldValue::Empty);
            }
        }

        Self {
            options,
            schema: Arc::new(schema),
            state: Arc::new(RwLock::new(FormState {
                id: FormId::next(),
                values: initial_values.clone(),
                initial_values,
                touched: BTreeSet::new(),
                errors: BTreeMap::new(),
                derived: DerivedState::default(),
                submit_state: SubmitState::Idle,
                submit_count: 0,
                ticket: ValidationTicket::default(),
                published: false,
            })),
            conditions: Arc::new(RwLock::new(Vec::new())),
            registry: Arc::new(RwLock::new(FieldRegistry::default())),
            change_listeners: Arc::new(RwLock::new(Vec::new())),
            component_listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn from_model<T>(model: &T, schema: Schema, options: FormOptions) -> Self
    where
        T: FormModel,
    {
        let mut values = model.to_values();
        for key in T::field_keys() {
            if !values.contains_key(key) {
                values.insert(*key, FieldValue::Empty);
            }
        }
        Self::new(values, schema, options)
    }

    pub fn builder(schema: Schema) -> FormBuilder {
        FormBuilder::new(schema)
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn internal(&self) -> FormInternals<'_> {
        FormInternals { api: self }
    }

    pub fn register_condition(&self, condition: Condition) -> FormResult<()> {
        self.register_conditions([condition])
    }

    /// Every key a condition references must be a known field; the whole
    /// list is rejected otherwise.
    pub fn register_conditions(
        &self,
        conditions: impl IntoIterator<Item = Condition>,
    ) -> FormResult<()> {
        let conditions = conditions.into_iter().collect::<Vec<_>>();
        {
            let state = read_lock(&self.state, "checking condition fields")?;
            for condition in &conditions {
                for key in condition.referenced_keys() {
                    state.ensure_known(key)?;
                }
            }
        }
        write_lock(&self.conditions, "registering conditions")?.extend(conditions);
        self.recompute_conditions()
    }

    pub fn on_form_change(
        &self,
        listener: impl Fn(FieldKey, &FieldValue) + Send + Sync + 'static,
    ) -> FormResult<()> {
        write_lock(&self.change_listeners, "registering change listener")?.push(Arc::new(listener));
        Ok(())
    }

    /// Listener for `update_component` signals, receiving the field and its
    /// new render revision. Condition flips, resets and validation results
    /// are signalled here too. Nothing redraws on its own: the owning view
    /// should call `cx.notify()` from this listener, since only `Field` change
    /// handlers refresh the window themselves.
    pub fn on_component_update(
        &self,
        listener: impl Fn(FieldKey, u64) + Send + Sync + 'static,
    ) -> FormResult<()> {
        write_lock(&self.component_listeners, "registering component listener")?
            .push(Arc::new(listener));
        Ok(())
    }

    pub fn values(&self) -> FormResult<FormValues> {
        Ok(read_lock(&self.state, "reading form values")?.values.clone())
    }

    pub fn get_field(&self, key: impl Into<FieldKey>) -> FormResult<FieldValue> {
        let key = key.into();
        let state = read_lock(&self.state, "reading field value")?;
        state.ensure_known(key)?;
        Ok(state.values.get(&key).cloned().unwrap_or_default())
    }

    pub fn get_as<V>(&self, key: impl Into<FieldKey>) -> FormResult<V>
    where
        V: FromFieldValue,
    {
        let key = key.into();
        let value = self.get_field(key)?;
        V::from_field_value(&value).ok_or(FormError::FieldType {
            key,
            expected: std::any::type_name::<V>(),
        })
    }

    pub fn model<T>(&self) -> FormResult<T>
    where
        T: FormModel,
    {
        T::from_values(&read_lock(&self.state, "reading form model")?.values)
    }

    /// Reads `keys`, either as top-level fields (empty `path`) or as entries of
    /// the object found at `path`. Keys that do not resolve under a path are
    /// left out of the result.
    pub fn get_fields<K>(
        &self,
        keys: impl IntoIterator<Item = K>,
        path: &str,
    ) -> FormResult<FormValues>
    where
        K: Into<FieldKey>,
    {
        let path = FieldPath::parse(path)?;
        let state = read_lock(&self.state, "reading field batch")?;
        let mut result = FormValues::new();

        if path.is_empty() {
            for key in keys {
                let key = key.into();
                state.ensure_known(key)?;
                let value = state.values.get(&key).cloned().unwrap_or_default();
                result.insert(key, value);
            }
            return Ok(result);
        }

        let Some(base) = state.values.resolve(&path).and_then(FieldValue::as_object) else {
            return Ok(result);
        };
        for key in keys {
            let key = key.into();
            if let Some(value) = object_entry(base, key.as_str()) {
                result.insert(key, value.clone());
            }
        }
        Ok(result)
    }

    pub fn set_field(
        &self,
        key: impl Into<FieldKey>,
        value: impl Into<FieldValue>,
    ) -> FormResult<()> {
        let key = key.into();
        let value = value.into();
        let touch = self.options.touch_on_set;
        let ((), flipped) = self.write_state("writing field value", |state| {
            state.ensure_known(key)?;
            state.values.insert(key, value.clone());
            if touch {
                state.touched.insert(key);
            }
            Ok(())
        })?;
        self.notify_components(&flipped)?;
        self.emit_changes(&[(key, value)])
    }

    /// Writes every value and the derived condition state under one lock.
    /// Change listeners only run after the whole batch is in place; an unknown
    /// key rejects the batch before anything is written.
    pub fn set_fields(&self, values: FormValues) -> FormResult<()> {
        let touch = self.options.touch_on_set;
        let ((), flipped) = self.write_state("writing field batch", |state| {
            for key in values.keys() {
                state.ensure_known(key)?;
            }
            for (key, value) in &values {
                state.values.insert(*key, value.clone());
                if touch {
                    state.touched.insert(*key);
                }
            }
            Ok(())
        })?;
        self.notify_components(&flipped)?;
        self.emit_changes(&values.into_iter().collect::<Vec<_>>())
    }

    /// User-interaction write: stores the value, marks the field touched and
    /// validates it when the validation mode is `OnChange`.
    pub fn change_field(
        &self,
        key: impl Into<FieldKey>,
        value: impl Into<FieldValue>,
    ) -> FormResult<()> {
        let key = key.into();
        let value = value.into();
        let ((), flipped) = self.write_state("writing changed field", |state| {
            state.ensure_known(key)?;
            state.values.insert(key, value.clone());
            state.touched.insert(key);
            Ok(())
        })?;
        self.notify_components(&flipped)?;
        if self.options.validate_mode == ValidationMode::OnChange {
            self.validate_field(key)?;
        }
        self.emit_changes(&[(key, value)])
    }

    /// Marks a field touched, typically on blur.
    pub fn touch(&self, key: impl Into<FieldKey>) -> FormResult<()> {
        let key = key.into();
        {
            let mut state = write_lock(&self.state, "touching field")?;
            state.ensure_known(key)?;
            state.touched.insert(key);
        }
        if self.options.validate_mode == ValidationMode::OnBlur {
            self.validate_field(key)?;
        }
        self.notify_component(key)?;
        Ok(())
    }

    pub fn reset_field(&self, key: impl Into<FieldKey>) -> FormResult<()> {
        let key = key.into();
        let ((), flipped) = self.write_state("resetting field", |state| {
            state.ensure_known(key)?;
            let initial = state.initial_values.get(&key).cloned().unwrap_or_default();
            state.values.insert(key, initial);
            state.touched.remove(&key);
            state.errors.remove(&key);
            Ok(())
        })?;
        self.notify_components(&flipped)?;
        self.notify_component(key)?;
        Ok(())
    }

    pub fn reset_fields(&self) -> FormResult<()> {
        let (keys, _) = self.write_state("resetting form", |state| {
            state.values = state.initial_values.clone();
            state.touched.clear();
            state.errors.clear();
            state.submit_state = SubmitState::Idle;
            state.next_ticket();
            Ok(state.values.keys().collect::<Vec<_>>())
        })?;
        self.notify_components(&keys)
    }

    /// Sets every field to `Empty`. Touched state, errors, schema and
    /// conditions stay as they are.
    pub fn clear_fields(&self) -> FormResult<()> {
        let (keys, _) = self.write_state("clearing form values", |state| {
            state.values.clear_values();
            Ok(state.values.keys().collect::<Vec<_>>())
        })?;
        self.notify_components(&keys)
    }

    pub fn touched(&self) -> FormResult<Vec<FieldKey>> {
        Ok(read_lock(&self.state, "reading touched fields")?
            .touched
            .iter()
            .copied()
            .collect())
    }

    pub fn is_touched(&self, key: impl Into<FieldKey>) -> FormResult<bool> {
        let key = key.into();
        let state = read_lock(&self.state, "reading touched flag")?;
        state.ensure_known(key)?;
        Ok(state.touched.contains(&key))
    }

    pub fn reset_touched(&self) -> FormResult<()> {
        let keys = {
            let mut state = write_lock(&self.state, "resetting touched fields")?;
            std::mem::take(&mut state.touched)
        };
        self.notify_components(&keys.into_iter().collect::<Vec<_>>())
    }

    pub fn get_touched_values(&self) -> FormResult<FormValues> {
        let state = read_lock(&self.state, "reading touched values")?;
        Ok(state
            .values
            .iter()
            .filter(|(key, _)| state.touched.contains(*key))
            .map(|(key, value)| (*key, value.clone()))
            .collect())
    }

    pub fn field_state(&self, key: impl Into<FieldKey>) -> FormResult<FieldState> {
        let key = key.into();
        let revision = read_lock(&self.registry, "reading render revision")?.revision(key);
        let state = read_lock(&self.state, "reading field state")?;
        state.ensure_known(key)?;
        Ok(FieldState {
            value: state.values.get(&key).cloned().unwrap_or_default(),
            touched: state.touched.contains(&key),
            error: state.errors.get(&key).cloned(),
            visible: !state.derived.is_hidden(key),
            disabled: state.derived.is_disabled(key),
            revision,
        })
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            values: state.values.clone(),
            touched: state.touched.clone(),
            errors: state.errors.clone(),
            submit_state: state.submit_state,
            submit_count: state.submit_count,
            is_valid: state.errors.is_empty(),
        })
    }

    pub fn submit(&self, f: impl FnOnce(&FormValues) -> FormResult<()>) -> FormResult<()> {
        self.begin_submit("preparing submit")?;
        let is_valid = self.validate()?;
        self.finish_submit(is_valid, f)
    }

    pub async fn submit_async<F, Fut>(&self, f: F) -> FormResult<()>
    where
        F: FnOnce(&FormValues) -> Fut,
        Fut: Future<Output = FormResult<()>>,
    {
        self.begin_submit("preparing async submit")?;
        let is_valid = self.validate_async().await?.is_valid();
        if !is_valid {
            let mut state = write_lock(&self.state, "handling async submit validation failure")?;
            transition_submit_state(&mut state, SubmitState::Failed)?;
            return Ok(());
        }

        let values = {
            let mut state = write_lock(&self.state, "moving async submit state to submitting")?;
            transition_submit_state(&mut state, SubmitState::Submitting)?;
            state.values.clone()
        };
        let submit_result = f(&values).await;
        self.complete_submit(submit_result)
    }

    pub fn submit_in(
        &self,
        window: &mut Window,
        cx: &mut gpui::App,
        f: impl FnOnce(&FormValues) -> FormResult<()>,
    ) -> FormResult<()> {
        let result = self.submit(f);
        if self.options.focus_first_error_on_submit {
            let _ = self.focus_first_error(window, cx)?;
        }
        result
    }

    pub fn focus_field(
        &self,
        key: impl Into<FieldKey>,
        window: &mut Window,
        cx: &mut gpui::App,
    ) -> FormResult<bool> {
        let key = key.into();
        let handle = read_lock(&self.registry, "reading focus binding")?.focus_handle(key);
        let Some(handle) = handle else {
            return Ok(false);
        };
        window.focus(&handle);
        Ok(true)
    }

    /// Focuses the first field, in key order, that has an error and a live
    /// component binding.
    pub fn focus_first_error(&self, window: &mut Window, cx: &mut gpui::App) -> FormResult<bool> {
        let error_keys = read_lock(&self.state, "reading first error key")?
            .errors
            .keys()
            .copied()
            .collect::<Vec<_>>();
        let handle = {
            let registry = read_lock(&self.registry, "reading focus bindings")?;
            error_keys.into_iter().find_map(|key| registry.focus_handle(key))
        };
        let Some(handle) = handle else {
            return Ok(false);
        };
        window.focus(&handle);
        Ok(true)
    }

    fn begin_submit(&self, context: &'static str) -> FormResult<()> {
        let mut state = write_lock(&self.state, context)?;
        if state.submit_state == SubmitState::Submitting {
            return Err(FormError::AlreadySubmitting);
        }
        transition_submit_state(&mut state, SubmitState::Validating)?;
        state.submit_count = state.submit_count.saturating_add(1);
        Ok(())
    }

    fn finish_submit(
        &self,
        is_valid: bool,
        f: impl FnOnce(&FormValues) -> FormResult<()>,
    ) -> FormResult<()> {
        if !is_valid {
            let mut state = write_lock(&self.state, "handling submit validation failure")?;
            transition_submit_state(&mut state, SubmitState::Failed)?;
            return Ok(());
        }

        let values = {
            let mut state = write_lock(&self.state, "moving submit state to submitting")?;
            transition_submit_state(&mut state, SubmitState::Submitting)?;
            state.values.clone()
        };
        self.complete_submit(f(&values))
    }

    fn complete_submit(&self, submit_result: FormResult<()>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "completing submit")?;
        if submit_result.is_ok() {
            transition_submit_state(&mut state, SubmitState::Succeeded)?;
        } else {
            transition_submit_state(&mut state, SubmitState::Failed)?;
        }
        submit_result
    }

    pub(crate) fn mark_published(&self) -> FormResult<bool> {
        let mut state = write_lock(&self.state, "publishing form api")?;
        Ok(!std::mem::replace(&mut state.published, true))
    }

    /// Re-evaluates every condition and signals the components whose derived
    /// state flipped.
    pub(crate) fn recompute_conditions(&self) -> FormResult<()> {
        let ((), flipped) = self.write_state("applying derived field state", |_| Ok(()))?;
        self.notify_components(&flipped)
    }

    /// Runs `write` and re-derives condition state under the same state lock,
    /// so no reader sees new values next to stale hidden or disabled flags.
    /// Returns the fields whose derived state flipped. Condition callbacks run
    /// while the lock is held and must not call back into the form.
    fn write_state<R>(
        &self,
        context: &'static str,
        write: impl FnOnce(&mut FormState) -> FormResult<R>,
    ) -> FormResult<(R, Vec<FieldKey>)> {
        let conditions = read_lock(&self.conditions, "reading conditions")?.clone();
        let mut state = write_lock(&self.state, context)?;
        let result = write(&mut *state)?;
        if conditions.is_empty() && state.derived == DerivedState::default() {
            return Ok((result, Vec::new()));
        }
        let derived = condition::evaluate(&conditions, &state.values);
        let flipped = derived.changed_since(&state.derived);
        state.derived = derived;
        if !flipped.is_empty() {
            log::trace!("condition pass flipped {} field(s)", flipped.len());
        }
        Ok((result, flipped.into_iter().collect()))
    }

    pub(crate) fn notify_component(&self, key: FieldKey) -> FormResult<u64> {
        let revision = write_lock(&self.registry, "bumping render revision")?.bump(key);
        let listeners = read_lock(&self.component_listeners, "reading component listeners")?.clone();
        log::trace!("field `{key}` requested render revision {revision}");
        for listener in listeners {
            listener(key, revision);
        }
        Ok(revision)
    }

    pub(crate) fn notify_components(&self, keys: &[FieldKey]) -> FormResult<()> {
        for key in keys {
            self.notify_component(*key)?;
        }
        Ok(())
    }

    fn emit_changes(&self, changes: &[(FieldKey, FieldValue)]) -> FormResult<()> {
        let listeners = read_lock(&self.change_listeners, "reading change listeners")?.clone();
        for (key, value) in changes {
            for listener in &listeners {
                listener(*key, value);
            }
        }
        for (key, _) in changes {
            self.notify_component(*key)?;
        }
        Ok(())
    }
}

/// Hooks used by field components rather than by application code.
pub struct FormInternals<'a> {
    api: &'a FormApi,
}

impl<'a> FormInternals<'a> {
    /// Binds the rendered input of `key`, replacing any earlier binding. Only a
    /// weak handle is kept.
    pub fn store_component(&self, key: impl Into<FieldKey>, handle: &FocusHandle) -> FormResult<()> {
        let key = key.into();
        read_lock(&self.api.state, "checking component field")?.ensure_known(key)?;
        let replaced = write_lock(&self.api.registry, "storing component binding")?.store(key, handle);
        if replaced {
            log::trace!("field `{key}` component binding replaced");
        }
        Ok(())
    }

    /// Asks the component bound to `key` to re-render from the latest state.
    pub fn update_component(&self, key: impl Into<FieldKey>) -> FormResult<u64> {
        let key = key.into();
        read_lock(&self.api.state, "checking updated field")?.ensure_known(key)?;
        self.api.notify_component(key)
    }

    pub fn schema(&self) -> &'a Schema {
        &self.api.schema
    }

    pub fn is_field_visible(&self, key: impl Into<FieldKey>) -> FormResult<bool> {
        let key = key.into();
        let state = read_lock(&self.api.state, "reading field visibility")?;
        state.ensure_known(key)?;
        Ok(!state.derived.is_hidden(key))
    }

    pub fn is_field_disabled(&self, key: impl Into<FieldKey>) -> FormResult<bool> {
        let key = key.into();
        let state = read_lock(&self.api.state, "reading field disabled flag")?;
        state.ensure_known(key)?;
        Ok(state.derived.is_disabled(key))
    }

    pub fn is_component_mounted(&self, key: impl Into<FieldKey>) -> FormResult<bool> {
        Ok(read_lock(&self.api.registry, "reading component binding")?.is_mounted(key.into()))
    }

    pub fn render_revision(&self, key: impl Into<FieldKey>) -> FormResult<u64> {
        Ok(read_lock(&self.api.registry, "reading render revision")?.revision(key.into()))
    }
}

/// Assembles a [`FormApi`] from the same inputs a `Form` component takes.
pub struct FormBuilder {
    schema: Schema,
    initial_values: FormValues,
    options: FormOptions,
    conditions: Vec<Condition>,
    change_listeners: Vec<ChangeListener>,
}

impl FormBuilder {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            initial_values: FormValues::new(),
            options: FormOptions::default(),
            conditions: Vec::new(),
            change_listeners: Vec::new(),
        }
    }

    pub fn initial_values(mut self, values: FormValues) -> Self {
        self.initial_values = values;
        self
    }

    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub fn on_form_change(
        mut self,
        listener: impl Fn(FieldKey, &FieldValue) + Send + Sync + 'static,
    ) -> Self {
        self.change_listeners.push(Arc::new(listener));
        self
    }

    pub fn build(self) -> FormResult<FormApi> {
        let api = FormApi::new(self.initial_values, self.schema, self.options);
        api.register_conditions(self.conditions)?;
        write_lock(&api.change_listeners, "registering change listeners")?
            .extend(self.change_listeners);
        Ok(api)
    }
}

pub(crate) fn transition_submit_state(
    state: &mut FormState,
    next: SubmitState,
) -> FormResult<()> {
    let current = state.submit_state;
    if current == next {
        return Ok(());
    }

    let allowed = matches!(
        (current, next),
        (SubmitState::Idle, SubmitState::Validating)
            | (SubmitState::Validating, SubmitState::Submitting)
            | (SubmitState::Validating, SubmitState::Failed)
            | (SubmitState::Submitting, SubmitState::Succeeded)
            | (SubmitState::Submitting, SubmitState::Failed)
            | (SubmitState::Succeeded, SubmitState::Validating)
            | (SubmitState::Failed, SubmitState::Validating)
            | (_, SubmitState::Idle)
    );
    if !allowed {
        return Err(FormError::InvalidStateTransition {
            from: current,
            to: next,
        });
    }
    log::debug!("form {:?} submit state {current:?} -> {next:?}", state.id);
    state.submit_state = next;
    Ok(())
}

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
