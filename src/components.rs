use std::rc::Rc;

use gpui::{
    AnyElement, Component, FocusHandle, IntoElement, ParentElement, RenderOnce, Window, div,
};

use crate::schema::FormFieldError;
use crate::store::{FormApi, FormResult};
use crate::value::{FieldKey, FieldValue};

type ValueChangeHandler = Rc<dyn Fn(FieldValue, &mut Window, &mut gpui::App)>;
type FieldRenderFn = Rc<dyn Fn(ComponentProps, &mut Window, &mut gpui::App) -> AnyElement>;
type FieldChangeHandler = Rc<dyn Fn(&FieldValue, &FormApi)>;
type NormalizeFn = Rc<dyn Fn(FieldValue) -> FieldValue>;
type ApiHandler = Rc<dyn Fn(&FormApi)>;

/// Props handed to a [`Field`]'s render function.
#[derive(Clone)]
pub struct ComponentProps {
    pub name: FieldKey,
    pub value: FieldValue,
    pub error: Option<FormFieldError>,
    pub touched: bool,
    pub disabled: bool,
    on_change: ValueChangeHandler,
}

impl ComponentProps {
    /// Feeds a new value from the rendered input back into the form.
    pub fn change(&self, value: impl Into<FieldValue>, window: &mut Window, cx: &mut gpui::App) {
        (self.on_change)(value.into(), window, cx);
    }

    pub fn on_change(&self) -> impl Fn(FieldValue, &mut Window, &mut gpui::App) + 'static {
        let handler = self.on_change.clone();
        move |value, window, cx| handler(value, window, cx)
    }
}

/// Provider component. Owns nothing but a handle to the form's store.
pub struct Form {
    api: FormApi,
    on_api: Option<ApiHandler>,
    children: Vec<AnyElement>,
}

impl Form {
    pub fn new(api: &FormApi) -> Self {
        Self {
            api: api.clone(),
            on_api: None,
            children: Vec::new(),
        }
    }

    /// Called once per store, on the first render.
    pub fn on_api(mut self, handler: impl Fn(&FormApi) + 'static) -> Self {
        self.on_api = Some(Rc::new(handler));
        self
    }

    pub fn child(mut self, content: impl IntoElement + 'static) -> Self {
        self.children.push(content.into_any_element());
        self
    }
}

impl ParentElement for Form {
    fn extend(&mut self, elements: impl IntoIterator<Item = AnyElement>) {
        self.children.extend(elements);
    }
}

impl RenderOnce for Form {
    fn render(self, _window: &mut Window, _cx: &mut gpui::App) -> impl IntoElement {
        if let Some(handler) = self.on_api.as_ref() {
            match self.api.mark_published() {
                Ok(true) => handler(&self.api),
                Ok(false) => {}
                Err(error) => log::warn!("form api was not published: {error}"),
            }
        }
        div().children(self.children)
    }
}

impl IntoElement for Form {
    type Element = Component<Self>;

    fn into_element(self) -> Self::Element {
        Component::new(self)
    }
}

/// Render-prop binding between one form field and an input element.
pub struct Field {
    api: FormApi,
    name: FieldKey,
    validate: bool,
    update: Vec<FieldKey>,
    disabled: bool,
    on_change: Option<FieldChangeHandler>,
    normalize: Option<NormalizeFn>,
    focus_handle: Option<FocusHandle>,
    render: FieldRenderFn,
}

impl Field {
    pub fn new(
        api: &FormApi,
        name: impl Into<FieldKey>,
        render: impl Fn(ComponentProps, &mut Window, &mut gpui::App) -> AnyElement + 'static,
    ) -> Self {
        Self {
            api: api.clone(),
            name: name.into(),
            validate: false,
            update: Vec::new(),
            disabled: false,
            on_change: None,
            normalize: None,
            focus_handle: None,
            render: Rc::new(render),
        }
    }

    /// Validate this field after every change.
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Fields asked to re-render after this one changes.
    pub fn update<K>(mut self, keys: impl IntoIterator<Item = K>) -> Self
    where
        K: Into<FieldKey>,
    {
        self.update = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn on_change(mut self, handler: impl Fn(&FieldValue, &FormApi) + 'static) -> Self {
        self.on_change = Some(Rc::new(handler));
        self
    }

    pub fn normalize(mut self, normalize: impl Fn(FieldValue) -> FieldValue + 'static) -> Self {
        self.normalize = Some(Rc::new(normalize));
        self
    }

    /// Handle of the rendered input, bound so the form can focus it.
    pub fn focus_handle(mut self, handle: &FocusHandle) -> Self {
        self.focus_handle = Some(handle.clone());
        self
    }

    /// `None` while a condition hides the field.
    fn props(&self) -> FormResult<Option<ComponentProps>> {
        let state = self.api.field_state(self.name)?;
        if !state.visible {
            return Ok(None);
        }
        Ok(Some(ComponentProps {
            name: self.name,
            value: state.value,
            error: state.error,
            touched: state.touched,
            disabled: self.disabled || state.disabled,
            on_change: self.change_handler(),
        }))
    }

    fn change_handler(&self) -> ValueChangeHandler {
        let api = self.api.clone();
        let change = FieldChange {
            name: self.name,
            validate: self.validate,
            update: self.update.clone(),
            on_change: self.on_change.clone(),
            normalize: self.normalize.clone(),
        };
        Rc::new(move |value, window, _cx| {
            if let Err(error) = change.apply(&api, value) {
                log::warn!("field `{}` change was not applied: {error}", change.name);
            }
            window.refresh();
        })
    }
}

impl RenderOnce for Field {
    fn render(self, window: &mut Window, cx: &mut gpui::App) -> impl IntoElement {
        if let Some(handle) = self.focus_handle.as_ref() {
            if let Err(error) = self.api.internal().store_component(self.name, handle) {
                log::warn!("field `{}` was not bound: {error}", self.name);
            }
        }
        match self.props() {
            Ok(Some(props)) => (self.render)(props, window, cx),
            Ok(None) => div().into_any_element(),
            Err(error) => {
                log::warn!("field `{}` could not render: {error}", self.name);
                div().into_any_element()
            }
        }
    }
}

impl IntoElement for Field {
    type Element = Component<Self>;

    fn into_element(self) -> Self::Element {
        Component::new(self)
    }
}

/// What a field does with a value coming from its input.
pub(crate) struct FieldChange {
    pub(crate) name: FieldKey,
    pub(crate) validate: bool,
    pub(crate) update: Vec<FieldKey>,
    pub(crate) on_change: Option<FieldChangeHandler>,
    pub(crate) normalize: Option<NormalizeFn>,
}

impl FieldChange {
    /// Normalizes, writes as a user interaction, optionally validates, runs the
    /// field callback and finally signals the `update` fields.
    pub(crate) fn apply(&self, api: &FormApi, value: FieldValue) -> FormResult<FieldValue> {
        let value = match self.normalize.as_ref() {
            Some(normalize) => normalize(value),
            None => value,
        };
        api.change_field(self.name, value.clone())?;
        if self.validate {
            api.validate_field(self.name)?;
        }
        if let Some(on_change) = self.on_change.as_ref() {
            on_change(&value, api);
        }
        for key in &self.update {
            api.internal().update_component(*key)?;
        }
        Ok(value)
    }
}
