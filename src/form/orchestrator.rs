use tracing::debug;

use super::bridge::GroupValidationBridge;
use super::controller::{FormResult, SharedForm};
use super::evaluator::{PendingValidation, RuleEvaluator};
use super::group::GroupAggregator;
use super::registry::RuleRegistry;

/// Whole-form validation: every field and group with rules scoped to the
/// form's name.
#[derive(Clone)]
pub struct FormValidationOrchestrator {
    registry: RuleRegistry,
    groups: GroupAggregator,
    evaluator: RuleEvaluator,
    bridge: GroupValidationBridge,
}

impl FormValidationOrchestrator {
    pub fn new(
        registry: RuleRegistry,
        groups: GroupAggregator,
        evaluator: RuleEvaluator,
        bridge: GroupValidationBridge,
    ) -> Self {
        Self {
            registry,
            groups,
            evaluator,
            bridge,
        }
    }

    pub fn validate(&self, form: &SharedForm) -> FormResult<PendingValidation> {
        let Some(form_name) = form.name() else {
            debug!(form = form.id().0, "unnamed form has no scoped rules");
            return Ok(PendingValidation::empty());
        };

        let mut pending = PendingValidation::empty();
        for field in self.registry.form_rules(form_name)? {
            if self.groups.contains(field.as_str())? {
                pending.merge(self.bridge.revalidate(form, field.as_str())?);
                continue;
            }
            // Fields the form does not render are skipped, not failed.
            let Some(value) = form.view_value(field.as_str())? else {
                debug!(form = form_name, field = %field, "skipping field missing from form");
                continue;
            };
            pending.merge(self.evaluator.validate(form, &field, value)?);
        }
        Ok(pending)
    }
}
