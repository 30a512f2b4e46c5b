use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::bridge::GroupValidationBridge;
use super::controller::{
    ChangeNotifier, FormController, FormResult, NoopNotifier, SharedForm, ValidationMode,
    ValidationTicket, ValidatorOptions, read_lock, write_lock,
};
use super::evaluator::{PendingValidation, RuleEvaluator};
use super::group::GroupAggregator;
use super::orchestrator::FormValidationOrchestrator;
use super::registry::{RuleRegistry, RuleSet};
use super::value::{FieldName, FieldValue, FormId};

/// Entry point owning the rules, the group values and the dependency graph
/// shared by every form validated through it.
#[derive(Clone)]
pub struct RuleSetValidator {
    options: ValidatorOptions,
    registry: RuleRegistry,
    groups: GroupAggregator,
    evaluator: RuleEvaluator,
    bridge: GroupValidationBridge,
    orchestrator: FormValidationOrchestrator,
    dependencies: Arc<RwLock<BTreeMap<FieldName, BTreeSet<FieldName>>>>,
}

impl Default for RuleSetValidator {
    fn default() -> Self {
        Self::new(ValidatorOptions::default())
    }
}

impl RuleSetValidator {
    pub fn new(options: ValidatorOptions) -> Self {
        Self::assemble(
            options,
            RuleRegistry::new(),
            GroupAggregator::new(),
            Arc::new(NoopNotifier),
        )
    }

    /// Replaces the notifier asked to re-render after validity changes.
    /// Registered rules and group values are kept.
    pub fn with_notifier(self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        let dependencies = self.dependencies.clone();
        Self {
            dependencies,
            ..Self::assemble(self.options, self.registry, self.groups, notifier)
        }
    }

    fn assemble(
        options: ValidatorOptions,
        registry: RuleRegistry,
        groups: GroupAggregator,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        let evaluator = RuleEvaluator::new(registry.clone(), options, notifier);
        let bridge = GroupValidationBridge::new(evaluator.clone(), groups.clone());
        let orchestrator = FormValidationOrchestrator::new(
            registry.clone(),
            groups.clone(),
            evaluator.clone(),
            bridge.clone(),
        );
        Self {
            options,
            registry,
            groups,
            evaluator,
            bridge,
            orchestrator,
            dependencies: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn options(&self) -> ValidatorOptions {
        self.options
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn groups(&self) -> &GroupAggregator {
        &self.groups
    }

    pub fn add_rules(&self, rule_set: RuleSet) -> FormResult<()> {
        self.registry.add_rules(rule_set)
    }

    /// Revalidates `dependent` whenever `source` is validated through this
    /// validator.
    pub fn register_dependency(
        &self,
        source: impl Into<FieldName>,
        dependent: impl Into<FieldName>,
    ) -> FormResult<()> {
        let mut dependencies = write_lock(&self.dependencies, "registering dependency")?;
        dependencies
            .entry(source.into())
            .or_default()
            .insert(dependent.into());
        Ok(())
    }

    pub fn latest_ticket<C>(&self, form: &Arc<C>, field: &str) -> FormResult<Option<ValidationTicket>>
    where
        C: FormController + 'static,
    {
        self.evaluator.latest_ticket(form.id(), field)
    }

    /// Drops the validation tickets held for a form that is going away.
    /// Async rules still running for it are discarded when they resolve.
    pub fn forget_form(&self, form: FormId) -> FormResult<()> {
        let forgotten = self.evaluator.forget_form(form)?;
        debug!(form = form.0, forgotten, "forgot form validation tickets");
        Ok(())
    }

    pub fn tracked_fields(&self) -> FormResult<usize> {
        self.evaluator.tracked_fields()
    }

    /// Validates `value` as the field's current value. The form's view value
    /// is left as the host set it.
    pub fn validate_field<C>(
        &self,
        form: &Arc<C>,
        field: impl Into<FieldName>,
        value: impl Into<FieldValue>,
    ) -> FormResult<PendingValidation>
    where
        C: FormController + 'static,
    {
        let form: SharedForm = form.clone();
        let field = field.into();
        let mut pending = self.evaluator.validate(&form, &field, value.into())?;
        pending.merge(self.revalidate_dependents(&form, &field)?);
        Ok(pending)
    }

    pub fn validate_group<C>(
        &self,
        form: &Arc<C>,
        group: &str,
        field: impl Into<FieldName>,
        value: impl Into<FieldValue>,
    ) -> FormResult<PendingValidation>
    where
        C: FormController + 'static,
    {
        let form: SharedForm = form.clone();
        let mut pending = self.bridge.validate(&form, field, group, value.into())?;
        pending.merge(self.revalidate_dependents(&form, &FieldName::new(group))?);
        Ok(pending)
    }

    pub fn validate_form<C>(&self, form: &Arc<C>) -> FormResult<PendingValidation>
    where
        C: FormController + 'static,
    {
        let form: SharedForm = form.clone();
        self.orchestrator.validate(&form)
    }

    /// Records `value` on the form and marks the field dirty, then validates
    /// unless the mode is `OnSubmit`.
    pub fn on_blur<C>(
        &self,
        form: &Arc<C>,
        field: impl Into<FieldName>,
        value: impl Into<FieldValue>,
    ) -> FormResult<PendingValidation>
    where
        C: FormController + 'static,
    {
        let field = field.into();
        let value = value.into();
        form.set_view_value(field.as_str(), value.clone())?;
        form.mark_dirty(field.as_str())?;
        if self.options.validate_mode == ValidationMode::OnSubmit {
            return Ok(PendingValidation::empty());
        }
        self.validate_field(form, field, value)
    }

    pub fn on_blur_group<C>(
        &self,
        form: &Arc<C>,
        group: &str,
        field: impl Into<FieldName>,
        value: impl Into<FieldValue>,
    ) -> FormResult<PendingValidation>
    where
        C: FormController + 'static,
    {
        let field = field.into();
        let value = value.into();
        form.set_view_value(field.as_str(), value.clone())?;
        form.mark_dirty(field.as_str())?;
        if self.options.validate_mode == ValidationMode::OnSubmit {
            return Ok(PendingValidation::empty());
        }
        self.validate_group(form, group, field, value)
    }

    /// Records `value` and marks the field dirty. Validates only in
    /// `OnChange` mode.
    pub fn on_change<C>(
        &self,
        form: &Arc<C>,
        field: impl Into<FieldName>,
        value: impl Into<FieldValue>,
    ) -> FormResult<PendingValidation>
    where
        C: FormController + 'static,
    {
        let field = field.into();
        let value = value.into();
        form.set_view_value(field.as_str(), value.clone())?;
        form.mark_dirty(field.as_str())?;
        if self.options.validate_mode != ValidationMode::OnChange {
            return Ok(PendingValidation::empty());
        }
        self.validate_field(form, field, value)
    }

    fn revalidate_dependents(
        &self,
        form: &SharedForm,
        source: &FieldName,
    ) -> FormResult<PendingValidation> {
        let mut pending = PendingValidation::empty();
        if !self.options.revalidate_dependents {
            return Ok(pending);
        }
        let dependents = read_lock(&self.dependencies, "reading field dependencies")?
            .get(source)
            .cloned()
            .unwrap_or_default();
        for dependent in dependents {
            if self.groups.contains(dependent.as_str())? {
                pending.merge(self.bridge.revalidate(form, dependent.as_str())?);
                continue;
            }
            let Some(value) = form.view_value(dependent.as_str())? else {
                debug!(source = %source, dependent = %dependent, "dependent field missing from form");
                continue;
            };
            pending.merge(self.evaluator.validate(form, &dependent, value)?);
        }
        Ok(pending)
    }
}
