use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::executor::block_on;
use futures::future::join;
use gpui::SharedString;
use rust_decimal::Decimal;

use crate::components::FieldChange;
use crate::{
    Condition, FieldKey, FieldRules, FieldValue, FormApi, FormError, FormFieldError, FormModel,
    FormOptions, FormValues, Schema, SubmitState, ValidationMode, ValidationOutcome,
};

#[allow(dead_code)]
#[derive(Clone, Debug, PartialEq, crate::FormModel)]
struct SignupForm {
    email: SharedString,
    password: SharedString,
    newsletter: bool,
    age: Decimal,
    tags: Vec<SharedString>,
}

fn base_model() -> SignupForm {
    SignupForm {
        email: "user@example.com".into(),
        password: "secret".into(),
        newsletter: false,
        age: Decimal::from(30),
        tags: vec!["rust".into()],
    }
}

fn signup_schema() -> Schema {
    Schema::new()
        .field(
            "email",
            FieldRules::text()
                .required("Email is required")
                .email("Email is invalid"),
        )
        .field(
            "password",
            FieldRules::text()
                .required("Password is required")
                .min_length(6, "Password too short"),
        )
        .field("age", FieldRules::number().min(18, "Too young"))
}

fn signup_values() -> FormValues {
    FormValues::new()
        .with("email", "")
        .with("password", "")
        .with("newsletter", false)
        .with("company", "")
}

fn signup_form() -> FormApi {
    FormApi::new(signup_values(), signup_schema(), FormOptions::default())
}

fn message(error: Option<FormFieldError>) -> Option<SharedString> {
    error.map(|error| error.message().clone())
}

#[test]
fn schema_only_fields_start_empty_and_are_addressable() {
    let form = signup_form();
    assert_eq!(
        form.get_field("age").expect("age should be known"),
        FieldValue::Empty
    );
    assert_eq!(
        form.get_field("unknown"),
        Err(FormError::UnknownField(FieldKey::new("unknown")))
    );
}

#[test]
fn set_field_then_validate_field_tracks_error() {
    let form = signup_form();
    assert!(!form.validate_field("email").expect("validate email"));
    assert_eq!(
        message(form.get_error("email").expect("read error")),
        Some("Email is required".into())
    );

    form.set_field("email", "not-an-email").expect("set email");
    assert!(!form.validate_field("email").expect("validate email"));
    assert_eq!(
        message(form.get_error("email").expect("read error")),
        Some("Email is invalid".into())
    );

    form.set_field("email", "a@b.co").expect("set email");
    assert!(form.validate_field("email").expect("validate email"));
    assert_eq!(form.get_error("email").expect("read error"), None);
}

#[test]
fn validate_replaces_all_errors() {
    let form = signup_form();
    assert!(!form.validate().expect("validate form"));
    let errors = form.get_errors().expect("read errors");
    assert!(errors.contains_key("email"));
    assert!(errors.contains_key("password"));
    assert!(!errors.contains_key("age"));

    form.set_fields(
        FormValues::new()
            .with("email", "a@b.co")
            .with("password", "longenough"),
    )
    .expect("set fields");
    assert!(form.validate().expect("validate form"));
    assert!(form.get_errors().expect("read errors").is_empty());
}

#[test]
fn validate_list_of_fields_leaves_other_errors_alone() {
    let form = signup_form();
    form.set_custom_field_error("company", "Taken")
        .expect("set custom error");
    assert!(!form
        .validate_list_of_fields(["email", "password"])
        .expect("validate list"));

    let errors = form.get_errors().expect("read errors");
    assert_eq!(errors.len(), 3);
    assert_eq!(
        message(errors.get("company").cloned()),
        Some("Taken".into())
    );
}

#[test]
fn custom_errors_survive_until_revalidated_or_reset() {
    let form = signup_form();
    form.set_custom_field_error("newsletter", "Server rejected")
        .expect("set custom error");
    form.set_field("newsletter", true).expect("set newsletter");
    assert_eq!(
        message(form.get_error("newsletter").expect("read error")),
        Some("Server rejected".into())
    );

    form.reset_errors().expect("reset errors");
    assert!(form.get_errors().expect("read errors").is_empty());
    assert!(form.is_valid().expect("read validity"));
}

#[test]
fn custom_errors_are_replaced_by_the_next_validation_of_that_field() {
    let form = FormApi::new(
        signup_values()
            .with("email", "a@b.co")
            .with("password", "longenough"),
        signup_schema(),
        FormOptions::default(),
    );
    form.set_custom_field_error("email", "Email taken")
        .expect("set email error");
    form.set_custom_field_error("password", "Password leaked")
        .expect("set password error");

    assert!(form.validate_field("password").expect("validate password"));
    assert_eq!(form.get_error("password").expect("read error"), None);
    assert_eq!(
        message(form.get_error("email").expect("read error")),
        Some("Email taken".into())
    );

    assert!(form.validate_field("email").expect("validate email"));
    assert_eq!(form.get_error("email").expect("read error"), None);

    form.set_custom_field_error("email", "Email taken")
        .expect("set email error again");
    assert!(form.validate().expect("validate form"));
    assert_eq!(form.get_error("email").expect("read error"), None);
}

#[test]
fn number_rules_accept_floats_equal_to_their_bound() {
    let schema = Schema::new().field(
        "price",
        FieldRules::number()
            .min(Decimal::new(1999, 2), "Too cheap")
            .max(Decimal::new(10000, 2), "Too expensive"),
    );
    let form = FormApi::new(
        FormValues::new().with("price", 19.99_f64),
        schema,
        FormOptions::default(),
    );
    assert!(form.validate_field("price").expect("validate price"));

    let schema = Schema::new().field(
        "ratio",
        FieldRules::number().max(Decimal::new(1, 1), "Ratio too high"),
    );
    let form = FormApi::new(FormValues::new(), schema, FormOptions::default());
    form.set_field("ratio", 0.1_f64).expect("set ratio");
    assert!(form.validate_field("ratio").expect("validate ratio"));
}

#[test]
fn derived_state_never_lags_behind_values() {
    let form = FormApi::builder(Schema::new())
        .initial_values(signup_values())
        .condition(Condition::hide("newsletter", "newsletter", |value, _| {
            value.as_bool() == Some(true)
        }))
        .build()
        .expect("build form");

    std::thread::scope(|scope| {
        let writer = form.clone();
        scope.spawn(move || {
            for round in 0..500 {
                writer
                    .set_fields(FormValues::new().with("newsletter", round % 2 == 0))
                    .expect("toggle newsletter");
            }
        });
        for _ in 0..500 {
            let state = form.field_state("newsletter").expect("field state");
            assert_eq!(state.visible, state.value.as_bool() != Some(true));
        }
    });
}

#[test]
fn condition_flips_reach_component_listeners() {
    let form = FormApi::builder(Schema::new())
        .initial_values(signup_values())
        .condition(Condition::hide("newsletter", "company", |value, _| {
            value.as_bool() != Some(true)
        }))
        .build()
        .expect("build form");
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    form.on_component_update(move |key, _| {
        sink.lock().expect("update sink lock").push(key);
    })
    .expect("register component listener");

    form.set_field("newsletter", true).expect("show company");
    let updates = updates.lock().expect("update sink lock");
    assert!(updates.contains(&FieldKey::new("company")));
    assert!(updates.contains(&FieldKey::new("newsletter")));
}

#[test]
fn reset_field_restores_initial_value_and_clears_state() {
    let form = FormApi::new(
        signup_values().with("email", "first@example.com"),
        signup_schema(),
        FormOptions::default(),
    );
    form.change_field("email", "bad").expect("change email");
    form.validate_field("email").expect("validate email");
    assert!(form.is_touched("email").expect("read touched"));
    assert!(form.get_error("email").expect("read error").is_some());

    form.reset_field("email").expect("reset email");
    assert_eq!(
        form.get_field("email").expect("read email"),
        FieldValue::from("first@example.com")
    );
    assert!(!form.is_touched("email").expect("read touched"));
    assert_eq!(form.get_error("email").expect("read error"), None);
}

#[test]
fn reset_fields_restores_every_initial_value() {
    let form = signup_form();
    form.change_field("email", "x@y.z").expect("change email");
    form.change_field("newsletter", true).expect("change newsletter");
    form.validate().expect("validate form");

    form.reset_fields().expect("reset form");
    assert_eq!(form.values().expect("read values"), {
        let mut expected = signup_values();
        expected.insert("age", FieldValue::Empty);
        expected
    });
    assert!(form.touched().expect("read touched").is_empty());
    assert!(form.get_errors().expect("read errors").is_empty());
    assert_eq!(
        form.snapshot().expect("snapshot").submit_state,
        SubmitState::Idle
    );
}

#[test]
fn clear_fields_empties_values_but_keeps_touched_and_errors() {
    let form = signup_form();
    form.change_field("email", "bad").expect("change email");
    form.validate_field("email").expect("validate email");

    form.clear_fields().expect("clear form");
    let values = form.values().expect("read values");
    assert!(values.iter().all(|(_, value)| value.is_empty()));
    assert_eq!(values.len(), 5);
    assert!(form.is_touched("email").expect("read touched"));
    assert!(form.get_error("email").expect("read error").is_some());
}

#[test]
fn set_fields_is_atomic_for_listeners() {
    let form = signup_form();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = form.clone();
    let sink = seen.clone();
    form.on_form_change(move |key, _| {
        let email = observer.get_field("email").expect("read email in listener");
        let password = observer
            .get_field("password")
            .expect("read password in listener");
        sink.lock()
            .expect("listener sink lock")
            .push((key, email, password));
    })
    .expect("register listener");

    form.set_fields(
        FormValues::new()
            .with("email", "a@b.co")
            .with("password", "hunter22"),
    )
    .expect("set fields");

    let seen = seen.lock().expect("listener sink lock");
    assert_eq!(seen.len(), 2);
    for (_, email, password) in seen.iter() {
        assert_eq!(email, &FieldValue::from("a@b.co"));
        assert_eq!(password, &FieldValue::from("hunter22"));
    }
}

#[test]
fn set_fields_with_unknown_key_writes_nothing() {
    let form = signup_form();
    let result = form.set_fields(
        FormValues::new()
            .with("email", "a@b.co")
            .with("nickname", "ferris"),
    );
    assert_eq!(
        result,
        Err(FormError::UnknownField(FieldKey::new("nickname")))
    );
    assert_eq!(
        form.get_field("email").expect("read email"),
        FieldValue::from("")
    );
}

#[test]
fn get_fields_reads_top_level_and_nested_values() {
    let address = FieldValue::object([("city", FieldValue::from("Oslo")), ("zip", "0150".into())]);
    let form = FormApi::new(
        signup_values().with("address", address),
        Schema::new(),
        FormOptions::default(),
    );

    let top = form
        .get_fields(["email", "newsletter"], "")
        .expect("read top level");
    assert_eq!(top.len(), 2);
    assert_eq!(top.get("newsletter"), Some(&FieldValue::Bool(false)));

    let nested = form
        .get_fields(["city", "country"], "address")
        .expect("read nested");
    assert_eq!(nested.len(), 1);
    assert_eq!(nested.get("city"), Some(&FieldValue::from("Oslo")));

    assert!(matches!(
        form.get_fields(["city"], "address..city"),
        Err(FormError::InvalidPath(_))
    ));
}

#[test]
fn touched_values_only_include_touched_fields() {
    let form = signup_form();
    form.change_field("email", "a@b.co").expect("change email");
    form.touch("newsletter").expect("touch newsletter");
    form.set_field("password", "untouched").expect("set password");

    let touched = form.get_touched_values().expect("read touched values");
    assert_eq!(touched.len(), 2);
    assert_eq!(touched.get("email"), Some(&FieldValue::from("a@b.co")));
    assert!(!touched.contains_key("password"));

    form.reset_touched().expect("reset touched");
    assert!(form.get_touched_values().expect("read touched").is_empty());
}

#[test]
fn touch_on_set_marks_programmatic_writes() {
    let form = FormApi::new(
        signup_values(),
        signup_schema(),
        FormOptions {
            touch_on_set: true,
            ..FormOptions::default()
        },
    );
    form.set_field("password", "abc").expect("set password");
    assert!(form.is_touched("password").expect("read touched"));
}

#[test]
fn on_change_mode_validates_user_changes() {
    let form = FormApi::new(
        signup_values(),
        signup_schema(),
        FormOptions {
            validate_mode: ValidationMode::OnChange,
            ..FormOptions::default()
        },
    );
    form.change_field("password", "abc").expect("change password");
    assert_eq!(
        message(form.get_error("password").expect("read error")),
        Some("Password too short".into())
    );
    form.set_field("email", "bad").expect("set email");
    assert_eq!(form.get_error("email").expect("read error"), None);
}

#[test]
fn on_blur_mode_validates_when_touched() {
    let form = FormApi::new(
        signup_values(),
        signup_schema(),
        FormOptions {
            validate_mode: ValidationMode::OnBlur,
            ..FormOptions::default()
        },
    );
    form.change_field("email", "bad").expect("change email");
    assert_eq!(form.get_error("email").expect("read error"), None);
    form.touch("email").expect("blur email");
    assert_eq!(
        message(form.get_error("email").expect("read error")),
        Some("Email is invalid".into())
    );
}

#[test]
fn hide_condition_flips_visibility() {
    let form = FormApi::builder(signup_schema())
        .initial_values(signup_values())
        .condition(Condition::hide("newsletter", "company", |value, _| {
            value.as_bool() != Some(true)
        }))
        .build()
        .expect("build form");

    assert!(!form.internal().is_field_visible("company").expect("visibility"));
    form.set_field("newsletter", true).expect("set newsletter");
    assert!(form.internal().is_field_visible("company").expect("visibility"));
    assert!(form.field_state("company").expect("field state").visible);
}

#[test]
fn hide_and_disable_conditions_combine() {
    let form = FormApi::builder(Schema::new())
        .initial_values(signup_values())
        .conditions([
            Condition::disable("newsletter", ["email", "company"], |value, _| {
                value.as_bool() == Some(true)
            }),
            Condition::disable("password", "company", |value, _| value.is_blank()),
        ])
        .build()
        .expect("build form");

    let internal = form.internal();
    assert!(!internal.is_field_disabled("email").expect("disabled"));
    assert!(internal.is_field_disabled("company").expect("disabled"));

    form.set_fields(
        FormValues::new()
            .with("newsletter", true)
            .with("password", "set"),
    )
    .expect("set fields");
    assert!(internal.is_field_disabled("email").expect("disabled"));
    assert!(internal.is_field_disabled("company").expect("disabled"));
}

#[test]
fn conditions_on_unknown_fields_are_rejected() {
    let result = FormApi::builder(Schema::new())
        .initial_values(signup_values())
        .condition(Condition::hide("newsletter", "phone", |_, _| true))
        .build();
    assert!(matches!(
        result,
        Err(FormError::UnknownField(key)) if key == FieldKey::new("phone")
    ));
}

#[test]
fn skip_hidden_fields_drops_their_errors() {
    let schema = signup_schema().field("company", FieldRules::text().required("Company required"));
    let form = FormApi::builder(schema)
        .initial_values(signup_values())
        .options(FormOptions {
            skip_hidden_fields: true,
            ..FormOptions::default()
        })
        .condition(Condition::hide("newsletter", "company", |value, _| {
            value.as_bool() != Some(true)
        }))
        .build()
        .expect("build form");

    form.validate().expect("validate form");
    assert_eq!(form.get_error("company").expect("read error"), None);

    form.set_field("newsletter", true).expect("show company");
    form.validate().expect("validate form");
    assert_eq!(
        message(form.get_error("company").expect("read error")),
        Some("Company required".into())
    );
}

#[test]
fn update_component_bumps_revision_and_notifies() {
    let form = signup_form();
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    form.on_component_update(move |key, revision| {
        sink.lock().expect("update sink lock").push((key, revision));
    })
    .expect("register component listener");

    let internal = form.internal();
    assert_eq!(internal.render_revision("email").expect("revision"), 0);
    assert_eq!(internal.update_component("email").expect("update"), 1);
    assert_eq!(internal.update_component("email").expect("update"), 2);
    assert!(!internal.is_component_mounted("email").expect("mounted"));
    assert_eq!(
        internal.update_component("missing"),
        Err(FormError::UnknownField(FieldKey::new("missing")))
    );

    let updates = updates.lock().expect("update sink lock");
    assert_eq!(
        updates.as_slice(),
        &[(FieldKey::new("email"), 1), (FieldKey::new("email"), 2)]
    );
}

#[test]
fn field_change_normalizes_validates_and_updates_dependents() {
    let form = signup_form();
    let callbacks = Rc::new(AtomicUsize::new(0));
    let counter = callbacks.clone();
    let change = FieldChange {
        name: FieldKey::new("email"),
        validate: true,
        update: vec![FieldKey::new("password")],
        on_change: Some(Rc::new(move |value: &FieldValue, _: &FormApi| {
            assert_eq!(value, &FieldValue::from("bad"));
            counter.fetch_add(1, Ordering::SeqCst);
        })),
        normalize: Some(Rc::new(|value: FieldValue| match value.as_str() {
            Some(text) => FieldValue::from(text.trim().to_lowercase()),
            None => value,
        })),
    };

    let stored = change
        .apply(&form, FieldValue::from("  BAD "))
        .expect("apply change");
    assert_eq!(stored, FieldValue::from("bad"));
    assert_eq!(form.get_field("email").expect("read email"), stored);
    assert!(form.is_touched("email").expect("read touched"));
    assert!(form.get_error("email").expect("read error").is_some());
    assert_eq!(callbacks.load(Ordering::SeqCst), 1);
    assert_eq!(
        form.internal().render_revision("password").expect("revision"),
        1
    );
}

#[test]
fn submit_runs_handler_only_when_valid() {
    let form = signup_form();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    form.submit(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .expect("submit invalid form");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.submit_state, SubmitState::Failed);
    assert!(!snapshot.is_valid);

    form.set_fields(
        FormValues::new()
            .with("email", "a@b.co")
            .with("password", "longenough"),
    )
    .expect("fix values");
    let counter = calls.clone();
    form.submit(move |values| {
        assert_eq!(values.get("email"), Some(&FieldValue::from("a@b.co")));
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .expect("submit valid form");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.submit_state, SubmitState::Succeeded);
    assert_eq!(snapshot.submit_count, 2);
}

#[test]
fn submit_handler_error_marks_failure() {
    let form = FormApi::new(signup_values(), Schema::new(), FormOptions::default());
    let result = form.submit(|_| Err(FormError::UnknownField(FieldKey::new("server"))));
    assert!(result.is_err());
    assert_eq!(
        form.snapshot().expect("snapshot").submit_state,
        SubmitState::Failed
    );
}

#[test]
fn async_rules_run_after_sync_rules_pass() {
    let schema = signup_schema().field_async(
        "email",
        0,
        |value: FieldValue, _values: FormValues| async move {
            if value.as_str() == Some("taken@example.com") {
                Err(FormFieldError::from("Email already registered"))
            } else {
                Ok(())
            }
        },
    );
    let form = FormApi::new(
        signup_values().with("password", "longenough").with("age", 20),
        schema,
        FormOptions::default(),
    );

    form.set_field("email", "taken@example.com").expect("set email");
    assert_eq!(
        block_on(form.validate_async()).expect("validate async"),
        ValidationOutcome::Invalid
    );
    assert_eq!(
        message(form.get_error("email").expect("read error")),
        Some("Email already registered".into())
    );

    form.set_field("email", "free@example.com").expect("set email");
    assert_eq!(
        block_on(form.validate_field_async("email")).expect("validate field async"),
        ValidationOutcome::Valid
    );
    assert!(form.is_valid().expect("read validity"));
}

#[test]
fn newer_validation_supersedes_debounced_async_pass() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let schema = Schema::new().field_async(
        "email",
        50,
        move |_value: FieldValue, _values: FormValues| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FormFieldError::from("Rejected"))
            }
        },
    );
    let form = FormApi::new(signup_values(), schema, FormOptions::default());

    let stale = form.validate_field_async("email");
    let fresh = async {
        futures_timer::Delay::new(Duration::from_millis(10)).await;
        form.validate_field_async("email").await
    };
    let (stale, fresh) = block_on(join(stale, fresh));

    assert_eq!(stale.expect("stale pass"), ValidationOutcome::Superseded);
    assert_eq!(fresh.expect("fresh pass"), ValidationOutcome::Invalid);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        message(form.get_error("email").expect("read error")),
        Some("Rejected".into())
    );
}

#[test]
fn derived_model_round_trips_through_the_store() {
    let model = base_model();
    let form = FormApi::from_model(&model, Schema::new(), FormOptions::default());
    let fields = SignupForm::fields();

    assert_eq!(SignupForm::field_keys().len(), 5);
    assert_eq!(fields.email().as_str(), "email");
    assert_eq!(
        form.get_as::<SharedString>(fields.email()).expect("typed read"),
        SharedString::from("user@example.com")
    );

    form.set_field(fields.age(), 42).expect("set age");
    form.set_field(fields.tags(), vec!["rust", "gpui"])
        .expect("set tags");
    let updated = form.model::<SignupForm>().expect("rebuild model");
    assert_eq!(updated.age, Decimal::from(42));
    assert_eq!(updated.tags.len(), 2);
    assert_eq!(updated.email, model.email);

    form.set_field(fields.newsletter(), "yes").expect("set newsletter");
    assert!(matches!(
        form.model::<SignupForm>(),
        Err(FormError::FieldType { key, .. }) if key == fields.newsletter()
    ));
}

#[test]
fn internal_schema_is_exposed_read_only() {
    let form = signup_form();
    let schema = form.internal().schema();
    assert!(schema.has_rule(FieldKey::new("email")));
    assert!(
        schema
            .rules(FieldKey::new("password"))
            .is_some_and(|rules| rules.is_required())
    );
}

#[test]
fn form_ids_are_unique() {
    let first = signup_form().form_id().expect("first id");
    let second = signup_form().form_id().expect("second id");
    assert_ne!(first, second);
}
