use calmform::{FieldValue, FormModel, FormValues};

#[derive(Clone, calmform::FormModel)]
struct DemoForm {
    email: String,
    remember: bool,
}

fn main() {
    let fields = DemoForm::fields();
    assert_eq!(fields.email().as_str(), "email");
    assert_eq!(DemoForm::field_keys().len(), 2);

    let model = DemoForm {
        email: "a@calm.form".to_string(),
        remember: true,
    };
    let values = model.to_values();
    assert_eq!(values.get("email"), Some(&FieldValue::from("a@calm.form")));

    let restored = DemoForm::from_values(&FormValues::new().with("email", "b@calm.form"))
        .expect("missing bool reads as false");
    assert_eq!(restored.email, "b@calm.form");
    assert!(!restored.remember);
}
