use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use gpui::SharedString;
use regex::Regex;
use rust_decimal::Decimal;

use crate::value::{FieldKey, FieldValue, FormValues, ValueKind, object_entry};

/// Error attached to a field. `Indexed` points at one entry of a list field,
/// `key` naming the entry's sub-field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FormFieldError {
    Message(SharedString),
    Indexed {
        key: SharedString,
        index: usize,
        message: SharedString,
    },
}

impl FormFieldError {
    pub fn message(&self) -> &SharedString {
        match self {
            FormFieldError::Message(message) => message,
            FormFieldError::Indexed { message, .. } => message,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            FormFieldError::Message(_) => None,
            FormFieldError::Indexed { index, .. } => Some(*index),
        }
    }
}

impl Display for FormFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormFieldError::Message(message) => f.write_str(message.as_ref()),
            FormFieldError::Indexed {
                key,
                index,
                message,
            } => write!(f, "{key}[{index}]: {message}"),
        }
    }
}

impl From<&'static str> for FormFieldError {
    fn from(message: &'static str) -> Self {
        FormFieldError::Message(message.into())
    }
}

impl From<String> for FormFieldError {
    fn from(message: String) -> Self {
        FormFieldError::Message(message.into())
    }
}

impl From<SharedString> for FormFieldError {
    fn from(message: SharedString) -> Self {
        FormFieldError::Message(message)
    }
}

pub type BoxedValidationFuture = Pin<Box<dyn Future<Output = Result<(), FormFieldError>> + Send>>;

pub(crate) type RuleTestFn = Arc<dyn Fn(&FieldValue, &FormValues) -> bool + Send + Sync>;
pub(crate) type AsyncRuleFn =
    Arc<dyn Fn(FieldValue, FormValues) -> BoxedValidationFuture + Send + Sync>;

#[derive(Clone)]
pub(crate) struct AsyncRule {
    pub(crate) debounce: Duration,
    pub(crate) rule: AsyncRuleFn,
}

#[derive(Clone)]
enum Rule {
    Required(SharedString),
    MinLength(usize, SharedString),
    MaxLength(usize, SharedString),
    Matches(Regex, SharedString),
    Email(SharedString),
    Min(Decimal, SharedString),
    Max(Decimal, SharedString),
    OneOf(Vec<FieldValue>, SharedString),
    MinItems(usize, SharedString),
    MaxItems(usize, SharedString),
    Test(RuleTestFn, SharedString),
}

impl Rule {
    fn check(&self, value: &FieldValue, values: &FormValues) -> Result<(), SharedString> {
        let passed = match self {
            Rule::Required(_) => !value.is_blank(),
            Rule::MinLength(min, _) => value
                .as_str()
                .is_none_or(|text| text.chars().count() >= *min),
            Rule::MaxLength(max, _) => value
                .as_str()
                .is_none_or(|text| text.chars().count() <= *max),
            Rule::Matches(pattern, _) => value.as_str().is_none_or(|text| pattern.is_match(text)),
            Rule::Email(_) => value.as_str().is_none_or(looks_like_email),
            Rule::Min(min, _) => value.as_number().is_none_or(|number| number >= *min),
            Rule::Max(max, _) => value.as_number().is_none_or(|number| number <= *max),
            Rule::OneOf(allowed, _) => allowed.contains(value),
            Rule::MinItems(min, _) => value.as_list().is_none_or(|items| items.len() >= *min),
            Rule::MaxItems(max, _) => value.as_list().is_none_or(|items| items.len() <= *max),
            Rule::Test(test, _) => test(value, values),
        };
        if passed {
            Ok(())
        } else {
            Err(self.message().clone())
        }
    }

    fn message(&self) -> &SharedString {
        match self {
            Rule::Required(message)
            | Rule::MinLength(_, message)
            | Rule::MaxLength(_, message)
            | Rule::Matches(_, message)
            | Rule::Email(message)
            | Rule::Min(_, message)
            | Rule::Max(_, message)
            | Rule::OneOf(_, message)
            | Rule::MinItems(_, message)
            | Rule::MaxItems(_, message)
            | Rule::Test(_, message) => message,
        }
    }
}

fn looks_like_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !text.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

#[derive(Clone)]
enum ItemRules {
    Scalar(Box<FieldRules>),
    Keyed(Vec<(SharedString, FieldRules)>),
}

/// Validation rules for one field.
///
/// Blank values only fail `required`; every other rule, the type check and
/// the item rules pass on a blank value. Rules run in declaration order and
/// the first failure wins.
#[derive(Clone, Default)]
pub struct FieldRules {
    kind: Option<(ValueKind, SharedString)>,
    rules: Vec<Rule>,
    items: Option<ItemRules>,
}

impl FieldRules {
    pub fn mixed() -> Self {
        Self::default()
    }

    pub fn text() -> Self {
        Self::typed(ValueKind::Text, "must be a text")
    }

    pub fn number() -> Self {
        Self::typed(ValueKind::Number, "must be a number")
    }

    pub fn boolean() -> Self {
        Self::typed(ValueKind::Bool, "must be a boolean")
    }

    pub fn list() -> Self {
        Self::typed(ValueKind::List, "must be a list")
    }

    pub fn object() -> Self {
        Self::typed(ValueKind::Object, "must be an object")
    }

    fn typed(kind: ValueKind, message: &'static str) -> Self {
        Self {
            kind: Some((kind, message.into())),
            ..Self::default()
        }
    }

    pub fn type_error(mut self, message: impl Into<SharedString>) -> Self {
        if let Some((_, current)) = self.kind.as_mut() {
            *current = message.into();
        }
        self
    }

    pub fn required(self, message: impl Into<SharedString>) -> Self {
        self.rule(Rule::Required(message.into()))
    }

    pub fn min_length(self, min: usize, message: impl Into<SharedString>) -> Self {
        self.rule(Rule::MinLength(min, message.into()))
    }

    pub fn max_length(self, max: usize, message: impl Into<SharedString>) -> Self {
        self.rule(Rule::MaxLength(max, message.into()))
    }

    pub fn matches(self, pattern: Regex, message: impl Into<SharedString>) -> Self {
        self.rule(Rule::Matches(pattern, message.into()))
    }

    pub fn email(self, message: impl Into<SharedString>) -> Self {
        self.rule(Rule::Email(message.into()))
    }

    pub fn min(self, min: impl Into<Decimal>, message: impl Into<SharedString>) -> Self {
        self.rule(Rule::Min(min.into(), message.into()))
    }

    pub fn max(self, max: impl Into<Decimal>, message: impl Into<SharedString>) -> Self {
        self.rule(Rule::Max(max.into(), message.into()))
    }

    pub fn one_of<V>(
        self,
        allowed: impl IntoIterator<Item = V>,
        message: impl Into<SharedString>,
    ) -> Self
    where
        V: Into<FieldValue>,
    {
        let allowed = allowed.into_iter().map(Into::into).collect();
        self.rule(Rule::OneOf(allowed, message.into()))
    }

    pub fn min_items(self, min: usize, message: impl Into<SharedString>) -> Self {
        self.rule(Rule::MinItems(min, message.into()))
    }

    pub fn max_items(self, max: usize, message: impl Into<SharedString>) -> Self {
        self.rule(Rule::MaxItems(max, message.into()))
    }

    /// Custom rule. The closure sees the field value and the whole value map.
    pub fn test(
        self,
        message: impl Into<SharedString>,
        test: impl Fn(&FieldValue, &FormValues) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rule(Rule::Test(Arc::new(test), message.into()))
    }

    /// Rules applied to every entry of a list of scalars.
    pub fn each(mut self, rules: FieldRules) -> Self {
        self.items = Some(ItemRules::Scalar(Box::new(rules)));
        self
    }

    /// Rules applied to `key` inside every object entry of a list.
    pub fn each_field(mut self, key: impl Into<SharedString>, rules: FieldRules) -> Self {
        match self.items.as_mut() {
            Some(ItemRules::Keyed(keyed)) => keyed.push((key.into(), rules)),
            _ => self.items = Some(ItemRules::Keyed(vec![(key.into(), rules)])),
        }
        self
    }

    fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|rule| matches!(rule, Rule::Required(_)))
    }

    pub fn check(
        &self,
        key: FieldKey,
        value: &FieldValue,
        values: &FormValues,
    ) -> Result<(), FormFieldError> {
        self.check_value(value, values)?;
        if value.is_blank() {
            return Ok(());
        }

        let (Some(items), Some(entries)) = (self.items.as_ref(), value.as_list()) else {
            return Ok(());
        };
        for (index, entry) in entries.iter().enumerate() {
            match items {
                ItemRules::Scalar(rules) => {
                    if let Err(error) = rules.check(key, entry, values) {
                        return Err(FormFieldError::Indexed {
                            key: key.as_str().into(),
                            index,
                            message: error.message().clone(),
                        });
                    }
                }
                ItemRules::Keyed(keyed) => {
                    for (sub_key, rules) in keyed {
                        let sub_value = entry
                            .as_object()
                            .and_then(|object| object_entry(object, sub_key.as_ref()))
                            .unwrap_or(&FieldValue::Empty);
                        if let Err(error) = rules.check(key, sub_value, values) {
                            return Err(FormFieldError::Indexed {
                                key: sub_key.clone(),
                                index,
                                message: error.message().clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_value(&self, value: &FieldValue, values: &FormValues) -> Result<(), FormFieldError> {
        if value.is_blank() {
            return match self.rules.iter().find(|rule| matches!(rule, Rule::Required(_))) {
                Some(required) => Err(FormFieldError::Message(required.message().clone())),
                None => Ok(()),
            };
        }

        if let Some((kind, message)) = self.kind.as_ref() {
            if value.kind() != *kind {
                return Err(FormFieldError::Message(message.clone()));
            }
        }

        for rule in &self.rules {
            rule.check(value, values).map_err(FormFieldError::Message)?;
        }
        Ok(())
    }
}

/// Declarative rule set keyed by field name.
#[derive(Clone, Default)]
pub struct Schema {
    fields: BTreeMap<FieldKey, FieldRules>,
    async_fields: BTreeMap<FieldKey, Vec<AsyncRule>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<FieldKey>, rules: FieldRules) -> Self {
        self.fields.insert(key.into(), rules);
        self
    }

    /// Async rule for a field, run by `FormApi::validate_async` after the
    /// field's synchronous rules pass. A non-zero debounce delays the rule and
    /// drops it when a newer validation pass started in the meantime.
    pub fn field_async<F, Fut>(mut self, key: impl Into<FieldKey>, debounce_ms: u64, rule: F) -> Self
    where
        F: Fn(FieldValue, FormValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), FormFieldError>> + Send + 'static,
    {
        let rule: AsyncRuleFn = Arc::new(
            move |value: FieldValue, values: FormValues| -> BoxedValidationFuture {
                Box::pin(rule(value, values))
            },
        );
        self.async_fields
            .entry(key.into())
            .or_default()
            .push(AsyncRule {
                debounce: Duration::from_millis(debounce_ms),
                rule,
            });
        self
    }

    pub fn keys(&self) -> BTreeSet<FieldKey> {
        self.fields
            .keys()
            .chain(self.async_fields.keys())
            .copied()
            .collect()
    }

    pub fn has_rule(&self, key: FieldKey) -> bool {
        self.fields.contains_key(&key) || self.async_fields.contains_key(&key)
    }

    pub fn rules(&self, key: FieldKey) -> Option<&FieldRules> {
        self.fields.get(&key)
    }

    pub fn has_async_rules(&self) -> bool {
        !self.async_fields.is_empty()
    }

    /// Checks every field with a synchronous rule. Fields without errors are
    /// absent from the result.
    pub fn validate(&self, values: &FormValues) -> BTreeMap<FieldKey, FormFieldError> {
        self.fields
            .keys()
            .filter_map(|key| {
                self.validate_field(*key, values)
                    .map(|error| (*key, error))
            })
            .collect()
    }

    pub fn validate_field(&self, key: FieldKey, values: &FormValues) -> Option<FormFieldError> {
        let rules = self.fields.get(&key)?;
        let value = values.get(&key).unwrap_or(&FieldValue::Empty);
        rules.check(key, value, values).err()
    }

    pub(crate) fn async_rules(&self, key: FieldKey) -> Vec<AsyncRule> {
        self.async_fields.get(&key).cloned().unwrap_or_default()
    }

    pub(crate) fn async_keys(&self) -> Vec<FieldKey> {
        self.async_fields.keys().copied().collect()
    }
}
