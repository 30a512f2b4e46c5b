use std::borrow::{Borrow, Cow};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

pub const ASYNC_SUFFIX: &str = ":async";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldName(Cow<'static, str>);

impl FieldName {
    pub const fn from_static(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(Cow::Owned(value.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the async-rule namespace for this field, e.g. `email:async`.
    pub fn async_key(&self) -> String {
        format!("{}{ASYNC_SUFFIX}", self.0)
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FieldName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for FieldName {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

impl From<String> for FieldName {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<&FieldName> for FieldName {
    fn from(value: &FieldName) -> Self {
        value.clone()
    }
}

/// Identifier of a rule, reported as the field's error when the rule fails.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MessageKey(Cow<'static, str>);

impl MessageKey {
    pub const fn from_static(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for MessageKey {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

impl From<String> for MessageKey {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl PartialEq<&str> for MessageKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Undefined,
    Text(String),
    Number(Decimal),
    Bool(bool),
    Group(BTreeMap<FieldName, FieldValue>),
}

impl FieldValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, FieldValue::Undefined)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&BTreeMap<FieldName, FieldValue>> {
        match self {
            FieldValue::Group(members) => Some(members),
            _ => None,
        }
    }

    /// Textual rendering used by pattern rules. Undefined values and groups
    /// have none.
    pub fn to_text(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Text(text) => Some(Cow::Borrowed(text)),
            FieldValue::Number(number) => Some(Cow::Owned(number.normalize().to_string())),
            FieldValue::Bool(flag) => Some(Cow::Borrowed(if *flag { "true" } else { "false" })),
            FieldValue::Undefined | FieldValue::Group(_) => None,
        }
    }

    pub fn member(&self, field: &str) -> Option<&FieldValue> {
        self.as_group().and_then(|members| members.get(field))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Number(Decimal::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Undefined, Into::into)
    }
}

impl From<BTreeMap<FieldName, FieldValue>> for FieldValue {
    fn from(value: BTreeMap<FieldName, FieldValue>) -> Self {
        FieldValue::Group(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn async_key_uses_suffix_namespace() {
        assert_eq!(FieldName::from_static("email").async_key(), "email:async");
    }

    #[test]
    fn option_none_becomes_undefined() {
        assert!(FieldValue::from(None::<String>).is_undefined());
        assert_eq!(
            FieldValue::from(Some("x")),
            FieldValue::Text("x".to_string())
        );
    }

    #[test]
    fn numbers_render_without_trailing_zeros() {
        let value = FieldValue::from(Decimal::from_i128_with_scale(1200, 2));
        assert_eq!(value.to_text().as_deref(), Some("12"));
        assert_eq!(FieldValue::from(0).to_text().as_deref(), Some("0"));
    }

    #[test]
    fn form_ids_are_unique() {
        assert_ne!(FormId::next(), FormId::next());
    }
}
