use crate::store::FormResult;
use crate::value::{FieldKey, FormValues};

/// A struct whose fields map one-to-one onto form fields.
///
/// Usually derived with `#[derive(FormModel)]`, which also generates a
/// `<Model>Fields` accessor type returning each field's [`FieldKey`].
pub trait FormModel: Clone + 'static {
    type Fields;

    fn fields() -> Self::Fields;
    fn field_keys() -> &'static [FieldKey];
    fn to_values(&self) -> FormValues;
    fn from_values(values: &FormValues) -> FormResult<Self>;
}
