use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt::{Display, Formatter};

use gpui::SharedString;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::store::{FormError, FormResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl From<&'static str> for FieldKey {
    fn from(value: &'static str) -> Self {
        Self(value)
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Empty,
    Bool,
    Number,
    Text,
    List,
    Object,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Empty => "empty",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::List => "list",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Payload of a single form field.
///
/// `Empty` stands in for "no value": cleared fields, keys declared only by the
/// schema, and optional values that are absent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum FieldValue {
    #[default]
    Empty,
    Bool(bool),
    Number(Decimal),
    Text(SharedString),
    List(Vec<FieldValue>),
    Object(BTreeMap<SharedString, FieldValue>),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Empty => ValueKind::Empty,
            FieldValue::Bool(_) => ValueKind::Bool,
            FieldValue::Number(_) => ValueKind::Number,
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::List(_) => ValueKind::List,
            FieldValue::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    /// Empty, or text with no characters.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&SharedString> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_text().map(|text| text.as_ref())
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<SharedString, FieldValue>> {
        match self {
            FieldValue::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a direct child of a list or object value.
    pub fn child(&self, segment: &PathSegment) -> Option<&FieldValue> {
        match (self, segment) {
            (FieldValue::List(items), PathSegment::Index(index)) => items.get(*index),
            (FieldValue::Object(entries), PathSegment::Key(key)) => {
                object_entry(entries, key.as_ref())
            }
            (FieldValue::Object(entries), PathSegment::Index(index)) => {
                object_entry(entries, &index.to_string())
            }
            _ => None,
        }
    }

    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<SharedString>,
        V: Into<FieldValue>,
    {
        FieldValue::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

pub(crate) fn object_entry<'a>(
    entries: &'a BTreeMap<SharedString, FieldValue>,
    key: &str,
) -> Option<&'a FieldValue> {
    entries.get(key)
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Bool(value) => write!(f, "{value}"),
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value.as_ref()),
            FieldValue::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            FieldValue::Object(entries) => {
                f.write_str("{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

macro_rules! impl_integer_field_value {
    ($($ty:ty => $to:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Number(Decimal::from(value))
                }
            }

            impl FromFieldValue for $ty {
                fn from_field_value(value: &FieldValue) -> Option<Self> {
                    value.as_number().and_then(|number| {
                        number.fract().is_zero().then(|| number.$to()).flatten()
                    })
                }
            }
        )*
    };
}

impl_integer_field_value!(
    i32 => to_i32,
    i64 => to_i64,
    u32 => to_u32,
    u64 => to_u64,
    usize => to_usize,
);

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        decimal_from_f64(value).map_or(FieldValue::Empty, FieldValue::Number)
    }
}

impl From<&'static str> for FieldValue {
    fn from(value: &'static str) -> Self {
        FieldValue::Text(value.into())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value.into())
    }
}

impl From<SharedString> for FieldValue {
    fn from(value: SharedString) -> Self {
        FieldValue::Text(value)
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Empty, Into::into)
    }
}

impl<T> From<Vec<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Vec<T>) -> Self {
        FieldValue::List(value.into_iter().map(Into::into).collect())
    }
}

/// Typed read-back of a [`FieldValue`], used by `#[derive(FormModel)]`.
pub trait FromFieldValue: Sized {
    fn from_field_value(value: &FieldValue) -> Option<Self>;
}

impl FromFieldValue for FieldValue {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromFieldValue for bool {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Empty => Some(false),
            other => other.as_bool(),
        }
    }
}

impl FromFieldValue for Decimal {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_number()
    }
}

impl FromFieldValue for f64 {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_number().and_then(|number| number.to_f64())
    }
}

impl FromFieldValue for SharedString {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Empty => Some(SharedString::default()),
            other => other.as_text().cloned(),
        }
    }
}

impl FromFieldValue for String {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Empty => Some(String::new()),
            other => other.as_str().map(str::to_owned),
        }
    }
}

impl<T> FromFieldValue for Option<T>
where
    T: FromFieldValue,
{
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Empty => Some(None),
            other => T::from_field_value(other).map(Some),
        }
    }
}

impl<T> FromFieldValue for Vec<T>
where
    T: FromFieldValue,
{
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Empty => Some(Vec::new()),
            FieldValue::List(items) => items.iter().map(T::from_field_value).collect(),
            _ => None,
        }
    }
}

fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|decimal| decimal.normalize())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathSegment {
    Key(SharedString),
    Index(usize),
}

/// A location inside the value map: `address.city`, `contacts[1].phone` or
/// `contacts.1.phone`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn parse(path: &str) -> FormResult<Self> {
        let mut segments = Vec::new();
        if path.is_empty() {
            return Ok(Self(segments));
        }

        for part in path.split('.') {
            let (head, mut rest) = match part.find('[') {
                Some(position) => part.split_at(position),
                None => (part, ""),
            };
            if head.is_empty() && rest.is_empty() {
                return Err(FormError::InvalidPath(path.to_string()));
            }
            if !head.is_empty() {
                segments.push(match head.parse::<usize>() {
                    Ok(index) => PathSegment::Index(index),
                    Err(_) => PathSegment::Key(SharedString::from(head.to_string())),
                });
            }
            while !rest.is_empty() {
                let Some(close) = rest.find(']') else {
                    return Err(FormError::InvalidPath(path.to_string()));
                };
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| FormError::InvalidPath(path.to_string()))?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(FormError::InvalidPath(path.to_string()));
                }
            }
        }
        Ok(Self(segments))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

/// Field name to value map. This is the canonical form state.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FormValues(BTreeMap<FieldKey, FieldValue>);

impl FormValues {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<FieldKey>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(
        &mut self,
        key: impl Into<FieldKey>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&FieldValue>
    where
        FieldKey: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.0.get(key)
    }

    pub(crate) fn clear_values(&mut self) {
        for value in self.0.values_mut() {
            *value = FieldValue::Empty;
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        FieldKey: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.0.contains_key(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<FieldValue>
    where
        FieldKey: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, FieldKey, FieldValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolves a nested path. The first segment names the field.
    pub fn resolve(&self, path: &FieldPath) -> Option<&FieldValue> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = match first {
            PathSegment::Key(key) => {
                let name: &str = key.as_ref();
                self.get(name)?
            }
            PathSegment::Index(index) => self.get(index.to_string().as_str())?,
        };
        for segment in rest {
            current = current.child(segment)?;
        }
        Some(current)
    }
}

impl FromIterator<(FieldKey, FieldValue)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (FieldKey, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(FieldKey, FieldValue)> for FormValues {
    fn extend<I: IntoIterator<Item = (FieldKey, FieldValue)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for FormValues {
    type Item = (FieldKey, FieldValue);
    type IntoIter = btree_map::IntoIter<FieldKey, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FormValues {
    type Item = (&'a FieldKey, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, FieldKey, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
