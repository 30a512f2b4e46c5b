use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::join_all;
use futures::task::{Spawn, SpawnExt};
use futures_timer::Delay;
use tracing::{debug, error, trace};

use super::controller::{
    ChangeNotifier, FormError, FormResult, SharedForm, ValidationTicket, ValidatorOptions,
    apply_outcome, read_lock, write_lock,
};
use super::registry::RuleRegistry;
use super::rule::AsyncRule;
use super::value::{FieldName, FieldValue, FormId, MessageKey};

#[derive(Clone, Copy, Debug)]
struct TicketState {
    ticket: ValidationTicket,
    outstanding: usize,
}

/// Latest trigger per (form, field) that still has async rules running.
///
/// Entries leave the book once their last async rule finishes, so a field
/// without work in flight costs nothing. Tickets come from one counter and
/// never repeat, which keeps a removed entry from being mistaken for a newer
/// one.
#[derive(Clone, Default)]
pub(super) struct TicketBook {
    next: Arc<AtomicU64>,
    tickets: Arc<RwLock<BTreeMap<(FormId, FieldName), TicketState>>>,
}

impl TicketBook {
    /// Supersedes every earlier trigger of the field and records how many
    /// async rules the new one launches.
    fn issue(
        &self,
        form: FormId,
        field: &FieldName,
        outstanding: usize,
    ) -> FormResult<ValidationTicket> {
        let ticket = ValidationTicket(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        let mut tickets = write_lock(&self.tickets, "issuing validation ticket")?;
        let key = (form, field.clone());
        if outstanding == 0 {
            tickets.remove(&key);
        } else {
            tickets.insert(key, TicketState { ticket, outstanding });
        }
        Ok(ticket)
    }

    fn is_latest(
        &self,
        form: FormId,
        field: &FieldName,
        ticket: ValidationTicket,
    ) -> FormResult<bool> {
        Ok(read_lock(&self.tickets, "checking latest validation ticket")?
            .get(&(form, field.clone()))
            .is_some_and(|state| state.ticket == ticket))
    }

    /// Marks one async rule of `ticket` as done. Returns `None` when the
    /// ticket was superseded, otherwise the number still running.
    fn finish(
        &self,
        form: FormId,
        field: &FieldName,
        ticket: ValidationTicket,
    ) -> FormResult<Option<usize>> {
        let mut tickets = write_lock(&self.tickets, "finishing async validation")?;
        let key = (form, field.clone());
        let Some(state) = tickets.get_mut(&key).filter(|state| state.ticket == ticket) else {
            return Ok(None);
        };
        state.outstanding = state.outstanding.saturating_sub(1);
        let remaining = state.outstanding;
        if remaining == 0 {
            tickets.remove(&key);
        }
        Ok(Some(remaining))
    }

    pub(super) fn latest(&self, form: FormId, field: &str) -> FormResult<Option<ValidationTicket>> {
        Ok(read_lock(&self.tickets, "reading validation ticket")?
            .get(&(form, FieldName::new(field)))
            .map(|state| state.ticket))
    }

    /// Drops every trigger of `form`. Async rules still running for it are
    /// treated as stale.
    pub(super) fn forget(&self, form: FormId) -> FormResult<usize> {
        let mut tickets = write_lock(&self.tickets, "forgetting form tickets")?;
        let before = tickets.len();
        tickets.retain(|(owner, _), _| *owner != form);
        Ok(before - tickets.len())
    }

    pub(super) fn len(&self) -> FormResult<usize> {
        Ok(read_lock(&self.tickets, "counting validation tickets")?.len())
    }
}

/// One async rule bound to the field and trigger it was launched for.
pub struct AsyncCompletion {
    form: SharedForm,
    field: FieldName,
    message: MessageKey,
    ticket: ValidationTicket,
    debounce: Duration,
    rule: Arc<dyn AsyncRule>,
    value: FieldValue,
    tickets: TicketBook,
    notifier: Arc<dyn ChangeNotifier>,
    discard_stale: bool,
}

impl AsyncCompletion {
    pub fn field(&self) -> &FieldName {
        &self.field
    }

    pub fn message(&self) -> &MessageKey {
        &self.message
    }

    pub fn ticket(&self) -> ValidationTicket {
        self.ticket
    }

    pub async fn run(self) -> FormResult<()> {
        let form_id = self.form.id();
        if !self.debounce.is_zero() {
            Delay::new(self.debounce).await;
            if !self.tickets.is_latest(form_id, &self.field, self.ticket)? {
                trace!(
                    field = %self.field,
                    message = %self.message,
                    ticket = self.ticket.0,
                    "skipping debounced async rule of superseded trigger"
                );
                return Ok(());
            }
        }

        let outcome = self.rule.check(self.value, self.form.clone()).await;
        let remaining = self.tickets.finish(form_id, &self.field, self.ticket)?;
        if remaining == Some(0) {
            self.form.set_validating(self.field.as_str(), false)?;
        }
        let passed = outcome.map_err(|defect| FormError::RuleDefect {
            field: self.field.clone(),
            message: self.message.clone(),
            defect,
        })?;

        if remaining.is_none() && self.discard_stale {
            debug!(
                field = %self.field,
                message = %self.message,
                ticket = self.ticket.0,
                "discarding stale async rule outcome"
            );
            return Ok(());
        }

        let failed = (!passed).then(|| self.message.clone());
        apply_outcome(self.form.as_ref(), self.field.as_str(), failed)?;
        self.notifier.notify();
        Ok(())
    }
}

/// Outcome of the synchronous pass plus the async rules still to run.
///
/// Dropping it drops the async work.
#[must_use = "async rules only run once the pending validation is settled or spawned"]
#[derive(Default)]
pub struct PendingValidation {
    failures: BTreeMap<FieldName, MessageKey>,
    completions: Vec<AsyncCompletion>,
}

impl PendingValidation {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether every synchronous rule passed. Async outcomes are not
    /// reflected here.
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &BTreeMap<FieldName, MessageKey> {
        &self.failures
    }

    pub fn has_pending(&self) -> bool {
        !self.completions.is_empty()
    }

    pub fn pending(&self) -> &[AsyncCompletion] {
        &self.completions
    }

    pub fn merge(&mut self, other: PendingValidation) {
        self.failures.extend(other.failures);
        self.completions.extend(other.completions);
    }

    /// Runs every async rule concurrently and waits for all of them.
    pub async fn settle(self) -> FormResult<()> {
        join_all(self.completions.into_iter().map(AsyncCompletion::run))
            .await
            .into_iter()
            .collect::<FormResult<Vec<()>>>()?;
        Ok(())
    }

    /// Hands each async rule to `spawner` as an independent task. Errors
    /// raised by a task after it was spawned are logged.
    pub fn spawn_on<S>(self, spawner: &S) -> FormResult<()>
    where
        S: Spawn + ?Sized,
    {
        for completion in self.completions {
            let field = completion.field.clone();
            spawner
                .spawn(async move {
                    if let Err(error) = completion.run().await {
                        error!(field = %field, %error, "async validation failed");
                    }
                })
                .map_err(|error| FormError::SpawnFailed(error.to_string()))?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct RuleEvaluator {
    registry: RuleRegistry,
    tickets: TicketBook,
    options: ValidatorOptions,
    notifier: Arc<dyn ChangeNotifier>,
}

impl RuleEvaluator {
    pub fn new(
        registry: RuleRegistry,
        options: ValidatorOptions,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        Self {
            registry,
            tickets: TicketBook::default(),
            options,
            notifier,
        }
    }

    /// Ticket of the field's trigger whose async rules are still running.
    pub fn latest_ticket(&self, form: FormId, field: &str) -> FormResult<Option<ValidationTicket>> {
        self.tickets.latest(form, field)
    }

    pub fn forget_form(&self, form: FormId) -> FormResult<usize> {
        self.tickets.forget(form)
    }

    /// Number of (form, field) pairs with async rules in flight.
    pub fn tracked_fields(&self) -> FormResult<usize> {
        self.tickets.len()
    }

    /// Runs the field's synchronous rules in order, stopping at the first
    /// failure, writes the outcome onto `form`, and prepares every async rule
    /// of the field.
    pub fn validate(
        &self,
        form: &SharedForm,
        field: &FieldName,
        value: FieldValue,
    ) -> FormResult<PendingValidation> {
        let form_name = form.name();
        let rules = self.registry.rules(field.as_str(), form_name)?;
        let async_rules = self.registry.async_rules(field.as_str(), form_name)?;
        if rules.is_empty() && async_rules.is_empty() {
            debug!(form = form_name, field = %field, "no rules registered for field");
        }

        let mut failed = None;
        for entry in &rules {
            let passed = entry
                .rule()
                .check(&value, form.as_ref())
                .map_err(|defect| FormError::RuleDefect {
                    field: field.clone(),
                    message: entry.message().clone(),
                    defect,
                })?;
            if !passed {
                trace!(field = %field, message = %entry.message(), "rule failed");
                failed = Some(entry.message().clone());
                break;
            }
        }
        // A defect above leaves the previous trigger current.
        let ticket = self.tickets.issue(form.id(), field, async_rules.len())?;
        apply_outcome(form.as_ref(), field.as_str(), failed.clone())?;

        form.set_validating(field.as_str(), !async_rules.is_empty())?;
        if !async_rules.is_empty() {
            trace!(
                rules = %field.async_key(),
                count = async_rules.len(),
                ticket = ticket.0,
                "launching async rules"
            );
        }
        let completions = async_rules
            .into_iter()
            .map(|entry| AsyncCompletion {
                form: form.clone(),
                field: field.clone(),
                message: entry.message().clone(),
                ticket,
                debounce: entry.debounce(),
                rule: entry.shared_rule(),
                value: value.clone(),
                tickets: self.tickets.clone(),
                notifier: self.notifier.clone(),
                discard_stale: self.options.discard_stale_async,
            })
            .collect();
        self.notifier.notify();

        let mut failures = BTreeMap::new();
        if let Some(message) = failed {
            failures.insert(field.clone(), message);
        }
        Ok(PendingValidation {
            failures,
            completions,
        })
    }
}
