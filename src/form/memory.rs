use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockWriteGuard};

use super::controller::{FormController, FormResult, read_lock, write_lock};
use super::model::FormModel;
use super::value::{FieldName, FieldValue, FormId, MessageKey};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Input,
    Group,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldState {
    pub kind: FieldKind,
    pub view_value: FieldValue,
    pub dirty: bool,
    pub valid: bool,
    pub validating: bool,
    pub error: Option<MessageKey>,
}

impl FieldState {
    fn input(view_value: FieldValue) -> Self {
        Self {
            kind: FieldKind::Input,
            view_value,
            dirty: false,
            valid: true,
            validating: false,
            error: None,
        }
    }

    fn group() -> Self {
        Self {
            kind: FieldKind::Group,
            view_value: FieldValue::Group(BTreeMap::new()),
            ..Self::input(FieldValue::Undefined)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormSnapshot {
    pub id: FormId,
    pub name: Option<String>,
    pub fields: BTreeMap<FieldName, FieldState>,
    pub errors: BTreeMap<FieldName, MessageKey>,
    pub is_valid: bool,
    pub is_dirty: bool,
    pub first_error: Option<FieldName>,
}

#[derive(Default)]
struct FormState {
    fields: BTreeMap<FieldName, FieldState>,
    errors: BTreeMap<FieldName, MessageKey>,
}

impl FormState {
    fn ensure_field(&mut self, field: &str) -> &mut FieldState {
        self.fields
            .entry(FieldName::new(field))
            .or_insert_with(|| FieldState::input(FieldValue::Undefined))
    }
}

/// Self-contained form state for hosts without their own form controller.
pub struct InMemoryForm {
    id: FormId,
    name: Option<String>,
    state: RwLock<FormState>,
}

impl InMemoryForm {
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_name(Some(name.into()))
    }

    pub fn unnamed() -> Self {
        Self::with_name(None)
    }

    fn with_name(name: Option<String>) -> Self {
        Self {
            id: FormId::next(),
            name,
            state: RwLock::new(FormState::default()),
        }
    }

    pub fn from_model<M>(name: impl Into<String>, model: &M) -> Self
    where
        M: FormModel,
    {
        let form = Self::named(name);
        {
            let mut state = form.seed_state();
            for (field, value) in model.view_values() {
                state.fields.insert(field, FieldState::input(value));
            }
        }
        form
    }

    pub fn with_field(self, field: impl Into<FieldName>, value: impl Into<FieldValue>) -> Self {
        self.seed_state()
            .fields
            .insert(field.into(), FieldState::input(value.into()));
        self
    }

    pub fn with_group(self, group: impl Into<FieldName>) -> Self {
        self.seed_state()
            .fields
            .entry(group.into())
            .or_insert_with(FieldState::group);
        self
    }

    fn seed_state(&self) -> RwLockWriteGuard<'_, FormState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn field_state(&self, field: &str) -> FormResult<Option<FieldState>> {
        Ok(read_lock(&self.state, "reading field state")?
            .fields
            .get(field)
            .cloned())
    }

    pub fn form_error(&self, field: &str) -> FormResult<Option<MessageKey>> {
        Ok(read_lock(&self.state, "reading form error")?
            .errors
            .get(field)
            .cloned())
    }

    pub fn reset_field(&self, field: &str) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting field")?;
        state.errors.remove(field);
        if let Some(meta) = state.fields.get_mut(field) {
            meta.dirty = false;
            meta.valid = true;
            meta.validating = false;
            meta.error = None;
        }
        Ok(())
    }

    pub fn clear_errors(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "clearing all field errors")?;
        state.errors.clear();
        for meta in state.fields.values_mut() {
            meta.valid = true;
            meta.validating = false;
            meta.error = None;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            id: self.id,
            name: self.name.clone(),
            fields: state.fields.clone(),
            errors: state.errors.clone(),
            is_valid: state.errors.is_empty(),
            is_dirty: state.fields.values().any(|meta| meta.dirty),
            first_error: state.errors.keys().next().cloned(),
        })
    }
}

impl FormController for InMemoryForm {
    fn id(&self) -> FormId {
        self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn view_value(&self, field: &str) -> FormResult<Option<FieldValue>> {
        Ok(read_lock(&self.state, "reading view value")?
            .fields
            .get(field)
            .map(|meta| meta.view_value.clone()))
    }

    fn contains_field(&self, field: &str) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking field")?
            .fields
            .contains_key(field))
    }

    /// Replaces the view value, adding the field if the form lacks it.
    fn set_view_value(&self, field: &str, value: FieldValue) -> FormResult<()> {
        write_lock(&self.state, "writing view value")?
            .ensure_field(field)
            .view_value = value;
        Ok(())
    }

    fn mark_dirty(&self, field: &str) -> FormResult<()> {
        write_lock(&self.state, "marking field dirty")?
            .ensure_field(field)
            .dirty = true;
        Ok(())
    }

    fn set_validity(&self, field: &str, valid: bool) -> FormResult<()> {
        write_lock(&self.state, "writing field validity")?
            .ensure_field(field)
            .valid = valid;
        Ok(())
    }

    fn set_error(&self, field: &str, message: Option<MessageKey>) -> FormResult<()> {
        write_lock(&self.state, "writing field error")?
            .ensure_field(field)
            .error = message;
        Ok(())
    }

    fn set_validating(&self, field: &str, validating: bool) -> FormResult<()> {
        write_lock(&self.state, "writing validating flag")?
            .ensure_field(field)
            .validating = validating;
        Ok(())
    }

    fn register_group(&self, group: &str) -> FormResult<()> {
        write_lock(&self.state, "registering group field")?
            .fields
            .entry(FieldName::new(group))
            .or_insert_with(FieldState::group);
        Ok(())
    }

    fn set_form_error(&self, field: &str, message: Option<MessageKey>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "writing form error map")?;
        match message {
            Some(message) => {
                state.errors.insert(FieldName::new(field), message);
            }
            None => {
                state.errors.remove(field);
            }
        }
        Ok(())
    }
}
