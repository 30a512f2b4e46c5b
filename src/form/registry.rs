use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::debug;

use super::controller::{FormResult, read_lock, write_lock};
use super::rule::{AsyncRule, Rule};
use super::value::{FieldName, MessageKey};

#[derive(Clone)]
pub struct RuleEntry {
    message: MessageKey,
    rule: Arc<dyn Rule>,
}

impl RuleEntry {
    pub fn message(&self) -> &MessageKey {
        &self.message
    }

    pub fn rule(&self) -> &dyn Rule {
        self.rule.as_ref()
    }
}

#[derive(Clone)]
pub struct AsyncRuleEntry {
    message: MessageKey,
    debounce: Duration,
    rule: Arc<dyn AsyncRule>,
}

impl AsyncRuleEntry {
    pub fn message(&self) -> &MessageKey {
        &self.message
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub(super) fn shared_rule(&self) -> Arc<dyn AsyncRule> {
        self.rule.clone()
    }
}

/// Rules of one field: the synchronous list and the `:async` namespace.
#[derive(Clone, Default)]
pub struct FieldRules {
    sync: Vec<RuleEntry>,
    deferred: Vec<AsyncRuleEntry>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule<R>(mut self, message: impl Into<MessageKey>, rule: R) -> Self
    where
        R: Rule + 'static,
    {
        upsert(
            &mut self.sync,
            RuleEntry {
                message: message.into(),
                rule: Arc::new(rule),
            },
            |entry| &entry.message,
        );
        self
    }

    pub fn async_rule<R>(self, message: impl Into<MessageKey>, rule: R) -> Self
    where
        R: AsyncRule + 'static,
    {
        self.async_rule_with_debounce(message, 0, rule)
    }

    pub fn async_rule_with_debounce<R>(
        mut self,
        message: impl Into<MessageKey>,
        debounce_ms: u64,
        rule: R,
    ) -> Self
    where
        R: AsyncRule + 'static,
    {
        upsert(
            &mut self.deferred,
            AsyncRuleEntry {
                message: message.into(),
                debounce: Duration::from_millis(debounce_ms),
                rule: Arc::new(rule),
            },
            |entry| &entry.message,
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.deferred.is_empty()
    }

    fn merge(&mut self, other: FieldRules) {
        for entry in other.sync {
            upsert(&mut self.sync, entry, |entry| &entry.message);
        }
        for entry in other.deferred {
            upsert(&mut self.deferred, entry, |entry| &entry.message);
        }
    }
}

fn upsert<T>(entries: &mut Vec<T>, entry: T, message: impl Fn(&T) -> &MessageKey) {
    let key = message(&entry).clone();
    match entries.iter_mut().find(|existing| message(&**existing) == &key) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

#[derive(Clone, Default)]
pub struct FormRules {
    fields: BTreeMap<FieldName, FieldRules>,
}

impl FormRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(
        mut self,
        field: impl Into<FieldName>,
        build: impl FnOnce(FieldRules) -> FieldRules,
    ) -> Self {
        let rules = build(FieldRules::new());
        merge_field(&mut self.fields, field.into(), rules);
        self
    }

    /// Rules of a group read the group's aggregated value.
    pub fn group(
        self,
        group: impl Into<FieldName>,
        build: impl FnOnce(FieldRules) -> FieldRules,
    ) -> Self {
        self.field(group, build)
    }

    fn merge(&mut self, other: FormRules) {
        for (field, rules) in other.fields {
            merge_field(&mut self.fields, field, rules);
        }
    }
}

fn merge_field(fields: &mut BTreeMap<FieldName, FieldRules>, field: FieldName, rules: FieldRules) {
    fields.entry(field).or_default().merge(rules);
}

/// Global rules plus rules scoped to named forms.
#[derive(Clone, Default)]
pub struct RuleSet {
    global: FormRules,
    forms: BTreeMap<String, FormRules>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(
        mut self,
        field: impl Into<FieldName>,
        build: impl FnOnce(FieldRules) -> FieldRules,
    ) -> Self {
        self.global = self.global.field(field, build);
        self
    }

    pub fn group(
        self,
        group: impl Into<FieldName>,
        build: impl FnOnce(FieldRules) -> FieldRules,
    ) -> Self {
        self.field(group, build)
    }

    pub fn form(
        mut self,
        form: impl Into<String>,
        build: impl FnOnce(FormRules) -> FormRules,
    ) -> Self {
        let rules = build(FormRules::new());
        self.forms.entry(form.into()).or_default().merge(rules);
        self
    }

    fn merge(&mut self, other: RuleSet) {
        self.global.merge(other.global);
        for (form, rules) in other.forms {
            self.forms.entry(form).or_default().merge(rules);
        }
    }

    fn lookup(&self, field: &str, form: Option<&str>) -> Option<&FieldRules> {
        form.and_then(|form| self.forms.get(form))
            .and_then(|scoped| scoped.fields.get(field))
            .or_else(|| self.global.fields.get(field))
    }
}

#[derive(Clone, Default)]
pub struct RuleRegistry {
    store: Arc<RwLock<RuleSet>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rules(&self, rule_set: RuleSet) -> FormResult<()> {
        debug!(
            global_fields = rule_set.global.fields.len(),
            forms = rule_set.forms.len(),
            "adding rule set"
        );
        let mut store = write_lock(&self.store, "adding rules")?;
        store.merge(rule_set);
        Ok(())
    }

    /// Synchronous rules for `field`. Form-scoped rules take precedence over
    /// global ones; an absent field yields an empty list.
    pub fn rules(&self, field: &str, form: Option<&str>) -> FormResult<Vec<RuleEntry>> {
        Ok(read_lock(&self.store, "reading field rules")?
            .lookup(field, form)
            .map(|rules| rules.sync.clone())
            .unwrap_or_default())
    }

    pub fn async_rules(&self, field: &str, form: Option<&str>) -> FormResult<Vec<AsyncRuleEntry>> {
        Ok(read_lock(&self.store, "reading async field rules")?
            .lookup(field, form)
            .map(|rules| rules.deferred.clone())
            .unwrap_or_default())
    }

    /// Every field or group with rules scoped to `form`. Global rules are not
    /// included.
    pub fn form_rules(&self, form: &str) -> FormResult<Vec<FieldName>> {
        Ok(read_lock(&self.store, "reading form rules")?
            .forms
            .get(form)
            .map(|scoped| {
                scoped
                    .fields
                    .iter()
                    .filter(|(_, rules)| !rules.is_empty())
                    .map(|(field, _)| field.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn has_form(&self, form: &str) -> FormResult<bool> {
        Ok(read_lock(&self.store, "checking form rules")?
            .forms
            .contains_key(form))
    }

    pub fn is_empty(&self) -> FormResult<bool> {
        let store = read_lock(&self.store, "checking for rules")?;
        Ok(store.global.fields.is_empty() && store.forms.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FieldValue;

    fn always(_: &FieldValue) -> bool {
        true
    }

    fn never(_: &FieldValue) -> bool {
        false
    }

    fn messages(entries: &[RuleEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.message().as_str()).collect()
    }

    #[test]
    fn add_rules_merges_messages_of_same_field() {
        let registry = RuleRegistry::new();
        registry
            .add_rules(RuleSet::new().field("a", |rules| rules.rule("m", always)))
            .expect("add first rule set");
        registry
            .add_rules(RuleSet::new().field("a", |rules| rules.rule("m2", always)))
            .expect("add second rule set");

        let rules = registry.rules("a", None).expect("read rules");
        assert_eq!(messages(&rules), vec!["m", "m2"]);
    }

    #[test]
    fn colliding_message_is_replaced_in_place() {
        let registry = RuleRegistry::new();
        registry
            .add_rules(RuleSet::new().field("a", |rules| {
                rules.rule("first", always).rule("second", always)
            }))
            .expect("add rules");
        registry
            .add_rules(RuleSet::new().field("a", |rules| rules.rule("first", never)))
            .expect("add colliding rule");

        let rules = registry.rules("a", None).expect("read rules");
        assert_eq!(messages(&rules), vec!["first", "second"]);
        let form = crate::form::InMemoryForm::unnamed();
        assert_eq!(
            rules[0].rule().check(&FieldValue::Undefined, &form),
            Ok(false)
        );
    }

    #[test]
    fn form_scoped_rules_take_precedence() {
        let registry = RuleRegistry::new();
        registry
            .add_rules(
                RuleSet::new()
                    .field("email", |rules| rules.rule("global", always))
                    .form("signup", |form| {
                        form.field("email", |rules| rules.rule("scoped", always))
                    }),
            )
            .expect("add rules");

        assert_eq!(
            messages(&registry.rules("email", None).expect("global rules")),
            vec!["global"]
        );
        assert_eq!(
            messages(&registry.rules("email", Some("signup")).expect("scoped rules")),
            vec!["scoped"]
        );
        assert_eq!(
            messages(&registry.rules("email", Some("login")).expect("fallback rules")),
            vec!["global"]
        );
    }

    #[test]
    fn missing_field_has_no_rules() {
        let registry = RuleRegistry::new();
        assert!(registry.rules("nothing", None).expect("rules").is_empty());
        assert!(
            registry
                .rules("nothing", Some("no-form"))
                .expect("scoped rules")
                .is_empty()
        );
        assert!(registry.is_empty().expect("is empty"));
    }

    #[test]
    fn async_rules_live_in_their_own_namespace() {
        let registry = RuleRegistry::new();
        registry
            .add_rules(RuleSet::new().field("name", |rules| {
                rules
                    .rule("sync", always)
                    .async_rule("taken", |_value: FieldValue| async { true })
            }))
            .expect("add rules");

        let sync = registry.rules("name", None).expect("sync rules");
        let deferred = registry.async_rules("name", None).expect("async rules");
        assert_eq!(messages(&sync), vec!["sync"]);
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].message().as_str(), "taken");
    }

    #[test]
    fn form_rules_ignore_global_fields() {
        let registry = RuleRegistry::new();
        registry
            .add_rules(
                RuleSet::new()
                    .field("other", |rules| rules.rule("global", always))
                    .form("profile", |form| {
                        form.field("name", |rules| rules.rule("required", always))
                            .group("contact", |rules| rules.rule("one of", always))
                            .field("handle", |rules| {
                                rules.async_rule("taken", |_value: FieldValue| async { true })
                            })
                    }),
            )
            .expect("add rules");

        let names = registry.form_rules("profile").expect("form rules");
        assert_eq!(
            names,
            vec![
                FieldName::from_static("contact"),
                FieldName::from_static("handle"),
                FieldName::from_static("name"),
            ]
        );
        assert!(registry.form_rules("missing").expect("form rules").is_empty());
        assert!(registry.has_form("profile").expect("has form"));
    }
}
