use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use super::rule::RuleDefect;
use super::value::{FieldName, FieldValue, FormId, MessageKey};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValidatorOptions {
    pub validate_mode: ValidationMode,
    pub revalidate_dependents: bool,
    /// Drop async outcomes that belong to a superseded trigger of the same
    /// field. When off, every async outcome is applied as it resolves.
    pub discard_stale_async: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            validate_mode: ValidationMode::OnBlur,
            revalidate_dependents: true,
            discard_stale_async: true,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("rule `{message}` on field `{field}` is defective: {defect}")]
    RuleDefect {
        field: FieldName,
        message: MessageKey,
        #[source]
        defect: RuleDefect,
    },
    #[error("failed to spawn async validation: {0}")]
    SpawnFailed(String),
}

pub type FormResult<T> = Result<T, FormError>;

/// Host-side form state the engine reads view values from and writes
/// validity into.
///
/// Implementations use interior mutability: async rule outcomes are applied
/// through a shared handle long after the triggering call returned.
pub trait FormController: Send + Sync {
    fn id(&self) -> FormId;

    fn name(&self) -> Option<&str>;

    /// Current view value, or `None` when the form has no such field.
    fn view_value(&self, field: &str) -> FormResult<Option<FieldValue>>;

    fn contains_field(&self, field: &str) -> FormResult<bool> {
        Ok(self.view_value(field)?.is_some())
    }

    /// Records the value the user entered. Interaction triggers call this
    /// before validating, so later whole-form and dependent passes read it.
    fn set_view_value(&self, field: &str, value: FieldValue) -> FormResult<()>;

    fn mark_dirty(&self, field: &str) -> FormResult<()>;

    fn set_validity(&self, field: &str, valid: bool) -> FormResult<()>;

    fn set_error(&self, field: &str, message: Option<MessageKey>) -> FormResult<()>;

    fn set_validating(&self, _field: &str, _validating: bool) -> FormResult<()> {
        Ok(())
    }

    /// Ensures the synthetic field a group's validity is written to exists.
    fn register_group(&self, group: &str) -> FormResult<()>;

    /// Adds (`Some`) or removes (`None`) the entry for `field` in the form's
    /// aggregate error map.
    fn set_form_error(&self, field: &str, message: Option<MessageKey>) -> FormResult<()>;
}

pub type SharedForm = Arc<dyn FormController>;

pub trait ChangeNotifier: Send + Sync {
    fn notify(&self);
}

impl<F> ChangeNotifier for F
where
    F: Fn() + Send + Sync,
{
    fn notify(&self) {
        (self)()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify(&self) {}
}

/// Writes one rule outcome onto the field and the form's aggregate error map.
pub(super) fn apply_outcome(
    form: &dyn FormController,
    field: &str,
    failed: Option<MessageKey>,
) -> FormResult<()> {
    form.set_validity(field, failed.is_none())?;
    form.set_error(field, failed.clone())?;
    form.set_form_error(field, failed)
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
