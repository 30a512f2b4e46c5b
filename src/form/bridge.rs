use tracing::debug;

use super::controller::{FormResult, SharedForm};
use super::evaluator::{PendingValidation, RuleEvaluator};
use super::group::GroupAggregator;
use super::value::{FieldName, FieldValue};

/// Validates a group through the synthetic field registered under the
/// group's name on the form.
#[derive(Clone)]
pub struct GroupValidationBridge {
    evaluator: RuleEvaluator,
    groups: GroupAggregator,
}

impl GroupValidationBridge {
    pub fn new(evaluator: RuleEvaluator, groups: GroupAggregator) -> Self {
        Self { evaluator, groups }
    }

    /// Contributes `field = value` to `group`, then runs the group's rules
    /// against the aggregated value.
    pub fn validate(
        &self,
        form: &SharedForm,
        field: impl Into<FieldName>,
        group: &str,
        value: FieldValue,
    ) -> FormResult<PendingValidation> {
        let aggregate = self.groups.register_group(group, field, value)?;
        self.evaluate(form, group, aggregate)
    }

    /// Runs the group's rules against its current aggregate without
    /// contributing a value.
    pub fn revalidate(&self, form: &SharedForm, group: &str) -> FormResult<PendingValidation> {
        let Some(aggregate) = self.groups.group(group)? else {
            debug!(group, "group has no members yet");
            return Ok(PendingValidation::empty());
        };
        self.evaluate(form, group, aggregate)
    }

    fn evaluate(
        &self,
        form: &SharedForm,
        group: &str,
        aggregate: FieldValue,
    ) -> FormResult<PendingValidation> {
        form.register_group(group)?;
        self.evaluator
            .validate(form, &FieldName::new(group), aggregate)
    }
}
