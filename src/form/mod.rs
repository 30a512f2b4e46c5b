mod bridge;
mod controller;
mod evaluator;
mod group;
mod memory;
mod model;
mod orchestrator;
mod registry;
mod rule;
mod validator;
mod value;


pub use bridge::GroupValidationBridge;
pub use controller::{
    ChangeNotifier, FormController, FormError, FormResult, NoopNotifier, SharedForm,
    ValidationMode, ValidationTicket, ValidatorOptions,
};
pub use evaluator::{AsyncCompletion, PendingValidation, RuleEvaluator};
pub use group::GroupAggregator;
pub use memory::{FieldKind, FieldState, FormSnapshot, InMemoryForm};
pub use model::FormModel;
pub use orchestrator::FormValidationOrchestrator;
pub use registry::{AsyncRuleEntry, FieldRules, FormRules, RuleEntry, RuleRegistry, RuleSet};
pub use rule::{
    AsyncFallible, AsyncRule, BoxedRuleFuture, Fallible, Rule, RuleDefect, RuleResult, WithForm,
    async_fallible, fallible, with_form,
};
pub use ruleset_validation_derive::FormModel;
pub use validator::RuleSetValidator;
pub use value::{ASYNC_SUFFIX, FieldName, FieldValue, FormId, MessageKey};
