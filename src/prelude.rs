pub use crate::{
    ComponentProps, Condition, Field, FieldKey, FieldRules, FieldValue, Form, FormApi,
    FormFieldError, FormModel, FormOptions, FormResult, FormValues, Schema, ValidationMode,
};
