pub mod condition;
pub mod prelude;
pub mod schema;
pub mod value;

mod components;
mod model;
mod registry;
mod store;
mod validation;

pub use calmform_derive::FormModel;
pub use components::{ComponentProps, Field, Form};
pub use condition::{Condition, ConditionAction, ConditionTarget, DerivedState};
pub use model::FormModel;
pub use schema::{BoxedValidationFuture, FieldRules, FormFieldError, Schema};
pub use store::{
    FieldState, FormApi, FormBuilder, FormError, FormId, FormInternals, FormOptions, FormResult,
    FormSnapshot, SubmitState, ValidationMode, ValidationTicket,
};
pub use validation::ValidationOutcome;
pub use value::{FieldKey, FieldPath, FieldValue, FormValues, FromFieldValue, PathSegment, ValueKind};

#[cfg(test)]
mod tests;
