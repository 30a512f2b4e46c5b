//! Built-in rules.
//!
//! Every predicate here is total: any [`FieldValue`] yields a verdict.
//! Length and pattern rules reject values that have no text form instead of
//! failing on them.

use std::sync::LazyLock;

use regex::Regex;

use crate::form::{FieldValue, FormController, Rule, RuleResult};

pub use crate::form::{async_fallible, fallible, with_form};

const EMAIL_PATTERN: &str = r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~.-]+@[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)*$";

static EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).ok());

/// Fails on undefined values and empty text.
pub fn required(value: &FieldValue) -> bool {
    match value {
        FieldValue::Undefined => false,
        FieldValue::Text(text) => !text.is_empty(),
        _ => true,
    }
}

pub fn numbers_only(value: &FieldValue) -> bool {
    match value {
        FieldValue::Text(_) | FieldValue::Number(_) => value
            .to_text()
            .is_some_and(|text| !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit())),
        _ => false,
    }
}

fn text_length(value: &FieldValue) -> Option<usize> {
    value.as_text().map(|text| text.chars().count())
}

pub fn set_length(length: usize) -> impl Fn(&FieldValue) -> bool + Clone + Send + Sync + 'static {
    move |value| text_length(value) == Some(length)
}

pub fn min_length(length: usize) -> impl Fn(&FieldValue) -> bool + Clone + Send + Sync + 'static {
    move |value| text_length(value).is_some_and(|actual| actual >= length)
}

pub fn max_length(length: usize) -> impl Fn(&FieldValue) -> bool + Clone + Send + Sync + 'static {
    move |value| text_length(value).is_some_and(|actual| actual <= length)
}

pub fn email(value: &FieldValue) -> bool {
    let Some(text) = value.as_text() else {
        return false;
    };
    EMAIL.as_ref().is_some_and(|pattern| pattern.is_match(text))
}

#[derive(Clone, Debug)]
pub enum Pattern {
    /// Compiled on every check.
    Source(String),
    Compiled(Regex),
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Pattern::Source(value.to_owned())
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Pattern::Source(value)
    }
}

impl From<Regex> for Pattern {
    fn from(value: Regex) -> Self {
        Pattern::Compiled(value)
    }
}

#[derive(Clone, Debug)]
pub struct RegexRule {
    pattern: Pattern,
}

impl RegexRule {
    /// Matches the value's text form. An uncompilable source pattern is a
    /// defect of the rule, not a failed value.
    pub fn test(&self, value: &FieldValue) -> RuleResult {
        let Some(text) = value.to_text() else {
            return Ok(false);
        };
        match &self.pattern {
            Pattern::Source(source) => Ok(Regex::new(source)?.is_match(&text)),
            Pattern::Compiled(pattern) => Ok(pattern.is_match(&text)),
        }
    }
}

impl Rule for RegexRule {
    fn check(&self, value: &FieldValue, _form: &dyn FormController) -> RuleResult {
        self.test(value)
    }
}

pub fn regex(pattern: impl Into<Pattern>) -> RegexRule {
    RegexRule {
        pattern: pattern.into(),
    }
}

/// Passes when at least one member of a group value satisfies `required`.
pub fn any_member_present(value: &FieldValue) -> bool {
    value
        .as_group()
        .is_some_and(|members| members.values().any(required))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    use crate::form::FieldName;

    fn text(value: &str) -> FieldValue {
        FieldValue::from(value)
    }

    #[test]
    fn required_rejects_empty_and_undefined() {
        assert!(!required(&text("")));
        assert!(!required(&FieldValue::Undefined));
    }

    #[test]
    fn required_accepts_text_and_numbers() {
        assert!(required(&text("this is a test")));
        assert!(required(&FieldValue::from(12345)));
        assert!(required(&FieldValue::from(0)));
        assert!(required(&FieldValue::from(false)));
    }

    #[test]
    fn numbers_only_rejects_letters_and_empty() {
        assert!(!numbers_only(&text("abc")));
        assert!(!numbers_only(&text("")));
        assert!(!numbers_only(&text("1e2e3e4")));
        assert!(!numbers_only(&FieldValue::Undefined));
    }

    #[test]
    fn numbers_only_accepts_digit_strings_and_whole_numbers() {
        assert!(numbers_only(&text("123")));
        assert!(numbers_only(&FieldValue::from(123)));
        assert!(!numbers_only(&FieldValue::from(-5)));
        assert!(!numbers_only(&FieldValue::from(Decimal::new(15, 1))));
    }

    #[test]
    fn length_rules_compare_character_counts() {
        assert!(!set_length(10)(&text("abc")));
        assert!(set_length(3)(&text("abc")));
        assert!(set_length(2)(&text("né")));

        assert!(!min_length(10)(&text("abc")));
        assert!(min_length(5)(&text("abc12345")));
        assert!(min_length(3)(&text("abc")));

        assert!(!max_length(5)(&text("abc12345")));
        assert!(max_length(5)(&text("abc")));
        assert!(max_length(3)(&text("abc")));
    }

    #[test]
    fn length_rules_reject_undefined_without_panicking() {
        assert!(!set_length(0)(&FieldValue::Undefined));
        assert!(!min_length(0)(&FieldValue::Undefined));
        assert!(!max_length(10)(&FieldValue::Undefined));
        assert!(!max_length(10)(&FieldValue::from(5)));
    }

    #[test]
    fn regex_accepts_source_and_compiled_patterns() {
        let compiled = Regex::new("^[0-9]+$").expect("valid pattern");

        assert_eq!(regex("/^[0-9]+$/").test(&text("abc12345")), Ok(false));
        assert_eq!(regex(compiled.clone()).test(&text("abc12345")), Ok(false));

        for candidate in ["12345", "abc", "", "007"] {
            assert_eq!(
                regex("^[0-9]+$").test(&text(candidate)),
                regex(compiled.clone()).test(&text(candidate)),
            );
        }
        assert_eq!(regex("^[0-9]+$").test(&FieldValue::from(42)), Ok(true));
        assert_eq!(regex(".*").test(&FieldValue::Undefined), Ok(false));
    }

    #[test]
    fn regex_reports_broken_source_pattern_as_defect() {
        let outcome = regex("([unclosed").test(&text("anything"));
        assert!(outcome.is_err());
    }

    #[test]
    fn email_matches_conventional_addresses() {
        assert!(email(&text("user@example.com")));
        assert!(email(&text("First.Last+tag@Sub.Example.org")));
        assert!(!email(&text("user@")));
        assert!(!email(&text("not an email")));
        assert!(!email(&text("user@-example.com")));
        assert!(!email(&FieldValue::Undefined));
    }

    #[test]
    fn any_member_present_reads_group_values() {
        let mut members = BTreeMap::new();
        members.insert(FieldName::from_static("email"), text(""));
        assert!(!any_member_present(&FieldValue::Group(members.clone())));

        members.insert(FieldName::from_static("phone"), text("555-0100"));
        assert!(any_member_present(&FieldValue::Group(members)));
        assert!(!any_member_present(&text("scalar")));
    }
}
