pub use crate::form::{
    FieldName, FieldValue, FormController, FormError, FormModel, FormResult, InMemoryForm,
    MessageKey, PendingValidation, RuleSet, RuleSetValidator, ValidationMode, ValidatorOptions,
};
pub use crate::rules;
