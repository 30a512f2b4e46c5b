use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::trace;

use super::controller::{FormResult, read_lock, write_lock};
use super::value::{FieldName, FieldValue};

type GroupMembers = BTreeMap<FieldName, FieldValue>;

/// Latest value each field contributed to its group.
#[derive(Clone, Default)]
pub struct GroupAggregator {
    groups: Arc<RwLock<BTreeMap<String, GroupMembers>>>,
}

impl GroupAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `field = value` into `group`, creating the group on first use,
    /// and returns the group's full aggregated value.
    pub fn register_group(
        &self,
        group: &str,
        field: impl Into<FieldName>,
        value: FieldValue,
    ) -> FormResult<FieldValue> {
        let field = field.into();
        trace!(group, field = %field, "registering group member");
        let mut groups = write_lock(&self.groups, "registering group member")?;
        let members = groups.entry(group.to_owned()).or_default();
        members.insert(field, value);
        Ok(FieldValue::Group(members.clone()))
    }

    pub fn group(&self, group: &str) -> FormResult<Option<FieldValue>> {
        Ok(read_lock(&self.groups, "reading group")?
            .get(group)
            .cloned()
            .map(FieldValue::Group))
    }

    pub fn contains(&self, group: &str) -> FormResult<bool> {
        Ok(read_lock(&self.groups, "checking group")?.contains_key(group))
    }

    pub fn snapshot(&self) -> FormResult<BTreeMap<String, FieldValue>> {
        Ok(read_lock(&self.groups, "reading all groups")?
            .iter()
            .map(|(group, members)| (group.clone(), FieldValue::Group(members.clone())))
            .collect())
    }

    pub fn clear(&self) -> FormResult<()> {
        write_lock(&self.groups, "clearing groups")?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_of(members: &[(&'static str, FieldValue)]) -> FieldValue {
        FieldValue::Group(
            members
                .iter()
                .map(|(field, value)| (FieldName::from_static(field), value.clone()))
                .collect(),
        )
    }

    #[test]
    fn stores_one_group() {
        let groups = GroupAggregator::new();
        let aggregate = groups
            .register_group("myGroup", "myInt", FieldValue::from(123))
            .expect("register group");

        assert_eq!(aggregate, group_of(&[("myInt", FieldValue::from(123))]));
        assert_eq!(
            groups.snapshot().expect("snapshot"),
            BTreeMap::from([("myGroup".to_string(), aggregate)])
        );
    }

    #[test]
    fn stores_multiple_groups_independently() {
        let groups = GroupAggregator::new();
        groups
            .register_group("myGroup", "myInt", FieldValue::from(123))
            .expect("register first group");
        groups
            .register_group("anotherGroup", "myInt", FieldValue::from(123))
            .expect("register second group");

        let snapshot = groups.snapshot().expect("snapshot");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get("anotherGroup"),
            Some(&group_of(&[("myInt", FieldValue::from(123))]))
        );
    }

    #[test]
    fn merges_members_instead_of_replacing() {
        let groups = GroupAggregator::new();
        groups
            .register_group("g", "x", FieldValue::from(1))
            .expect("register x");
        let aggregate = groups
            .register_group("g", "y", FieldValue::from(2))
            .expect("register y");

        assert_eq!(
            aggregate,
            group_of(&[("x", FieldValue::from(1)), ("y", FieldValue::from(2))])
        );
    }

    #[test]
    fn same_member_is_overwritten() {
        let groups = GroupAggregator::new();
        groups
            .register_group("g", "x", FieldValue::from("old"))
            .expect("register old");
        groups
            .register_group("g", "x", FieldValue::from("new"))
            .expect("register new");

        assert_eq!(
            groups.group("g").expect("read group"),
            Some(group_of(&[("x", FieldValue::from("new"))]))
        );
        assert_eq!(groups.group("missing").expect("read missing"), None);
    }
}
