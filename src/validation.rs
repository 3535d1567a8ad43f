use std::collections::{BTreeMap, BTreeSet};

use futures_timer::Delay;
use gpui::SharedString;

use crate::condition::DerivedState;
use crate::schema::FormFieldError;
use crate::store::{FormApi, FormResult, ValidationTicket, read_lock, write_lock};
use crate::value::{FieldKey, FormValues};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    Invalid,
    /// A newer validation pass started before this one finished; its results
    /// were dropped.
    Superseded,
}

impl ValidationOutcome {
    pub fn is_valid(self) -> bool {
        self == ValidationOutcome::Valid
    }
}

enum ErrorScope<'a> {
    All,
    Fields(&'a [FieldKey]),
}

enum AsyncVerdict {
    Passed,
    Failed(FormFieldError),
    Superseded,
}

impl FormApi {
    /// Runs every synchronous schema rule and replaces the whole error map,
    /// custom errors included.
    pub fn validate(&self) -> FormResult<bool> {
        let (values, derived) = self.validation_input(&[], "reading values for form validation")?;
        let mut errors = self.schema.validate(&values);
        if self.options.skip_hidden_fields {
            errors.retain(|key, _| !derived.is_hidden(*key));
        }
        log::debug!("form validation found {} error(s)", errors.len());
        self.write_errors(ErrorScope::All, errors, None)?;
        self.is_valid()
    }

    pub fn validate_field(&self, key: impl Into<FieldKey>) -> FormResult<bool> {
        self.validate_list_of_fields([key.into()])
    }

    /// Validates the listed fields against one snapshot and stores all their
    /// errors in a single write.
    pub fn validate_list_of_fields<K>(&self, keys: impl IntoIterator<Item = K>) -> FormResult<bool>
    where
        K: Into<FieldKey>,
    {
        let keys = keys.into_iter().map(Into::into).collect::<Vec<FieldKey>>();
        let (values, derived) = self.validation_input(&keys, "reading values for field validation")?;
        let errors = keys
            .iter()
            .filter_map(|key| {
                self.field_verdict(*key, &values, &derived)
                    .map(|error| (*key, error))
            })
            .collect::<BTreeMap<_, _>>();
        let is_valid = errors.is_empty();
        log::debug!(
            "validated {} field(s), {} error(s)",
            keys.len(),
            errors.len()
        );
        self.write_errors(ErrorScope::Fields(&keys), errors, None)?;
        Ok(is_valid)
    }

    /// Full validation including async rules. Errors are applied in one write
    /// once every rule has finished, and only if no other validation started
    /// in the meantime.
    pub async fn validate_async(&self) -> FormResult<ValidationOutcome> {
        let (ticket, values, derived) = self.start_async_pass("starting async form validation")?;
        let mut errors = self.schema.validate(&values);
        if self.options.skip_hidden_fields {
            errors.retain(|key, _| !derived.is_hidden(*key));
        }

        for key in self.schema.async_keys() {
            if errors.contains_key(&key) || self.is_skipped(key, &derived) {
                continue;
            }
            match self.run_async_rules(key, ticket, &values).await? {
                AsyncVerdict::Passed => {}
                AsyncVerdict::Failed(error) => {
                    errors.insert(key, error);
                }
                AsyncVerdict::Superseded => return Ok(ValidationOutcome::Superseded),
            }
        }

        self.finish_async_pass(ErrorScope::All, errors, ticket)
    }

    pub async fn validate_field_async(
        &self,
        key: impl Into<FieldKey>,
    ) -> FormResult<ValidationOutcome> {
        let key = key.into();
        read_lock(&self.state, "checking async validation field")?.ensure_known(key)?;
        let (ticket, values, derived) = self.start_async_pass("starting async field validation")?;

        let mut errors = BTreeMap::new();
        if let Some(error) = self.field_verdict(key, &values, &derived) {
            errors.insert(key, error);
        } else if !self.is_skipped(key, &derived) {
            match self.run_async_rules(key, ticket, &values).await? {
                AsyncVerdict::Passed => {}
                AsyncVerdict::Failed(error) => {
                    errors.insert(key, error);
                }
                AsyncVerdict::Superseded => return Ok(ValidationOutcome::Superseded),
            }
        }

        self.finish_async_pass(ErrorScope::Fields(&[key]), errors, ticket)
    }

    pub fn get_error(&self, key: impl Into<FieldKey>) -> FormResult<Option<FormFieldError>> {
        let key = key.into();
        let state = read_lock(&self.state, "reading field error")?;
        state.ensure_known(key)?;
        Ok(state.errors.get(&key).cloned())
    }

    pub fn get_errors(&self) -> FormResult<BTreeMap<FieldKey, FormFieldError>> {
        Ok(read_lock(&self.state, "reading form errors")?.errors.clone())
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading form validity")?
            .errors
            .is_empty())
    }

    /// Sets an error outside schema validation. It stays until the field is
    /// validated again or errors are reset.
    pub fn set_custom_field_error(
        &self,
        key: impl Into<FieldKey>,
        message: impl Into<SharedString>,
    ) -> FormResult<()> {
        let key = key.into();
        read_lock(&self.state, "checking custom error field")?.ensure_known(key)?;
        let errors = BTreeMap::from([(key, FormFieldError::Message(message.into()))]);
        self.write_errors(ErrorScope::Fields(&[key]), errors, None)?;
        Ok(())
    }

    pub fn reset_errors(&self) -> FormResult<()> {
        self.write_errors(ErrorScope::All, BTreeMap::new(), None)?;
        Ok(())
    }

    fn validation_input(
        &self,
        keys: &[FieldKey],
        context: &'static str,
    ) -> FormResult<(FormValues, DerivedState)> {
        let state = read_lock(&self.state, context)?;
        for key in keys {
            state.ensure_known(*key)?;
        }
        Ok((state.values.clone(), state.derived.clone()))
    }

    fn start_async_pass(
        &self,
        context: &'static str,
    ) -> FormResult<(ValidationTicket, FormValues, DerivedState)> {
        let mut state = write_lock(&self.state, context)?;
        let ticket = state.next_ticket();
        Ok((ticket, state.values.clone(), state.derived.clone()))
    }

    fn finish_async_pass(
        &self,
        scope: ErrorScope<'_>,
        errors: BTreeMap<FieldKey, FormFieldError>,
        ticket: ValidationTicket,
    ) -> FormResult<ValidationOutcome> {
        let is_valid = errors.is_empty();
        if !self.write_errors(scope, errors, Some(ticket))? {
            log::debug!("async validation {ticket:?} superseded before completion");
            return Ok(ValidationOutcome::Superseded);
        }
        Ok(if is_valid {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid
        })
    }

    fn is_skipped(&self, key: FieldKey, derived: &DerivedState) -> bool {
        self.options.skip_hidden_fields && derived.is_hidden(key)
    }

    fn field_verdict(
        &self,
        key: FieldKey,
        values: &FormValues,
        derived: &DerivedState,
    ) -> Option<FormFieldError> {
        if self.is_skipped(key, derived) {
            return None;
        }
        self.schema.validate_field(key, values)
    }

    async fn run_async_rules(
        &self,
        key: FieldKey,
        ticket: ValidationTicket,
        values: &FormValues,
    ) -> FormResult<AsyncVerdict> {
        let value = values.get(&key).cloned().unwrap_or_default();
        for entry in self.schema.async_rules(key) {
            if !entry.debounce.is_zero() {
                Delay::new(entry.debounce).await;
                if !self.is_latest_ticket(ticket)? {
                    return Ok(AsyncVerdict::Superseded);
                }
            }
            if let Err(error) = (entry.rule)(value.clone(), values.clone()).await {
                return Ok(AsyncVerdict::Failed(error));
            }
        }
        Ok(AsyncVerdict::Passed)
    }

    fn is_latest_ticket(&self, ticket: ValidationTicket) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking latest validation ticket")?.ticket == ticket)
    }

    /// Stores validation results and cancels in-flight async passes. With an
    /// `expected` ticket nothing is written unless that ticket is still the
    /// latest; the return value says whether the write happened.
    fn write_errors(
        &self,
        scope: ErrorScope<'_>,
        mut errors: BTreeMap<FieldKey, FormFieldError>,
        expected: Option<ValidationTicket>,
    ) -> FormResult<bool> {
        let changed = {
            let mut state = write_lock(&self.state, "writing validation result")?;
            if expected.is_some_and(|ticket| ticket != state.ticket) {
                return Ok(false);
            }
            state.next_ticket();
            let previous = state.errors.clone();
            match scope {
                ErrorScope::All => state.errors = errors,
                ErrorScope::Fields(keys) => {
                    for key in keys {
                        match errors.remove(key) {
                            Some(error) => {
                                state.errors.insert(*key, error);
                            }
                            None => {
                                state.errors.remove(key);
                            }
                        }
                    }
                }
            }
            changed_error_keys(&previous, &state.errors)
        };
        self.notify_components(&changed)?;
        Ok(true)
    }
}

fn changed_error_keys(
    previous: &BTreeMap<FieldKey, FormFieldError>,
    current: &BTreeMap<FieldKey, FormFieldError>,
) -> Vec<FieldKey> {
    previous
        .keys()
        .chain(current.keys())
        .copied()
        .filter(|key| previous.get(key) != current.get(key))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
