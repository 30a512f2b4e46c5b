use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use super::controller::{FormController, SharedForm};
use super::value::FieldValue;

/// A rule that could not decide, as opposed to one that rejected the value.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("{reason}")]
pub struct RuleDefect {
    reason: String,
}

impl RuleDefect {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<regex::Error> for RuleDefect {
    fn from(error: regex::Error) -> Self {
        Self::new(format!("invalid pattern: {error}"))
    }
}

pub type RuleResult = Result<bool, RuleDefect>;

pub type BoxedRuleFuture = Pin<Box<dyn Future<Output = RuleResult> + Send + 'static>>;

pub trait Rule: Send + Sync {
    fn check(&self, value: &FieldValue, form: &dyn FormController) -> RuleResult;
}

impl<F> Rule for F
where
    F: Fn(&FieldValue) -> bool + Send + Sync,
{
    fn check(&self, value: &FieldValue, _form: &dyn FormController) -> RuleResult {
        Ok((self)(value))
    }
}

pub trait AsyncRule: Send + Sync {
    fn check(&self, value: FieldValue, form: SharedForm) -> BoxedRuleFuture;
}

impl<F, Fut> AsyncRule for F
where
    F: Fn(FieldValue) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    fn check(&self, value: FieldValue, _form: SharedForm) -> BoxedRuleFuture {
        let outcome = (self)(value);
        Box::pin(async move { Ok(outcome.await) })
    }
}

/// Rule that also reads other state of the form it runs in.
#[derive(Clone, Copy, Debug)]
pub struct WithForm<F>(F);

impl<F> Rule for WithForm<F>
where
    F: Fn(&FieldValue, &dyn FormController) -> bool + Send + Sync,
{
    fn check(&self, value: &FieldValue, form: &dyn FormController) -> RuleResult {
        Ok((self.0)(value, form))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Fallible<F>(F);

impl<F> Rule for Fallible<F>
where
    F: Fn(&FieldValue, &dyn FormController) -> RuleResult + Send + Sync,
{
    fn check(&self, value: &FieldValue, form: &dyn FormController) -> RuleResult {
        (self.0)(value, form)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AsyncFallible<F>(F);

impl<F> AsyncRule for AsyncFallible<F>
where
    F: Fn(FieldValue, SharedForm) -> BoxedRuleFuture + Send + Sync,
{
    fn check(&self, value: FieldValue, form: SharedForm) -> BoxedRuleFuture {
        (self.0)(value, form)
    }
}

pub fn with_form<F>(rule: F) -> WithForm<F>
where
    F: Fn(&FieldValue, &dyn FormController) -> bool + Send + Sync,
{
    WithForm(rule)
}

pub fn fallible<F>(rule: F) -> Fallible<F>
where
    F: Fn(&FieldValue, &dyn FormController) -> RuleResult + Send + Sync,
{
    Fallible(rule)
}

pub fn async_fallible<F>(rule: F) -> AsyncFallible<F>
where
    F: Fn(FieldValue, SharedForm) -> BoxedRuleFuture + Send + Sync,
{
    AsyncFallible(rule)
}
