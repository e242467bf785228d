//! In-memory user directory
//!
//! Thread-safe directory backed by RwLock-protected maps. Suitable for
//! development and as the test backend; production deployments wire the
//! platform's real user store behind the same trait.

use super::UserDirectory;
use crate::model::DocRef;
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

const USER_PROPERTY_ACTIVE: &str = "active";

#[derive(Default)]
struct State {
    /// Serialized user reference -> profile properties
    users: HashMap<String, HashMap<String, String>>,

    /// Serialized group reference -> (reference, serialized members)
    groups: HashMap<String, (DocRef, HashSet<String>)>,

    /// Every profile/membership mutation bumps this
    writes: usize,
}

/// In-memory [`UserDirectory`] implementation.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<RwLock<State>>,
    fail_group_queries: Arc<AtomicBool>,
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-declare a group so non-autocreate additions can succeed
    pub fn add_group(&self, group: &DocRef) {
        let mut state = self.state.write().unwrap();
        state
            .groups
            .entry(group.serialize())
            .or_insert_with(|| (group.clone(), HashSet::new()));
    }

    /// Number of profile and membership writes performed so far
    pub fn write_count(&self) -> usize {
        self.state.read().unwrap().writes
    }

    /// Profile properties of a user, if the profile exists
    pub fn user_properties(&self, user: &DocRef) -> Option<HashMap<String, String>> {
        self.state.read().unwrap().users.get(&user.serialize()).cloned()
    }

    /// Serialized members of a group, if the group exists
    pub fn members_of(&self, group: &DocRef) -> Option<Vec<String>> {
        self.state.read().unwrap().groups.get(&group.serialize()).map(|(_, members)| {
            let mut members: Vec<String> = members.iter().cloned().collect();
            members.sort();
            members
        })
    }

    /// Whether a group document exists
    pub fn has_group(&self, group: &DocRef) -> bool {
        self.state.read().unwrap().groups.contains_key(&group.serialize())
    }

    /// Make subsequent group queries fail, simulating a directory outage
    pub fn fail_group_queries(&self, fail: bool) {
        self.fail_group_queries.store(fail, Ordering::SeqCst);
    }
}

impl UserDirectory for MemoryDirectory {
    fn exists(&self, user: &DocRef) -> Result<bool> {
        Ok(self.state.read().unwrap().users.contains_key(&user.serialize()))
    }

    fn create_user(&self, user: &DocRef, properties: &HashMap<String, String>) -> bool {
        log::debug!("Creating new user [{}]", user);
        let mut state = self.state.write().unwrap();

        let mut extended = properties.clone();
        extended
            .entry(USER_PROPERTY_ACTIVE.to_string())
            .or_insert_with(|| "1".to_string());

        state.users.insert(user.serialize(), extended);
        state.writes += 1;
        true
    }

    fn synchronize_properties(
        &self,
        user: &DocRef,
        properties: &HashMap<String, String>,
        _comment: &str,
    ) -> bool {
        let mut state = self.state.write().unwrap();

        let Some(profile) = state.users.get(&user.serialize()) else {
            log::error!("User [{}] does not exist and will not be synchronized", user);
            return false;
        };

        // Only touch the profile when a mapped value actually changed.
        let changed: HashMap<String, String> = properties
            .iter()
            .filter(|(key, value)| profile.get(*key) != Some(*value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if !changed.is_empty() {
            if let Some(profile) = state.users.get_mut(&user.serialize()) {
                profile.extend(changed);
                state.writes += 1;
            }
        }
        true
    }

    fn groups_for_member(&self, user: &DocRef) -> Result<Vec<DocRef>> {
        if self.fail_group_queries.load(Ordering::SeqCst) {
            bail!("group query failed for [{}]", user);
        }

        let member = user.serialize();
        let state = self.state.read().unwrap();
        let mut groups: Vec<DocRef> = state
            .groups
            .values()
            .filter(|(_, members)| members.contains(&member))
            .map(|(group, _)| group.clone())
            .collect();
        groups.sort();
        Ok(groups)
    }

    fn add_to_group(&self, member: &DocRef, group: &DocRef, _comment: &str, create: bool) -> bool {
        let mut state = self.state.write().unwrap();
        let key = group.serialize();

        if !state.groups.contains_key(&key) {
            if !create {
                log::error!("User [{}] cannot be added to unknown group [{}]", member, group);
                return false;
            }
            log::debug!("Group [{}] created to be able to add user [{}]", group, member);
        }

        let (_, members) = state
            .groups
            .entry(key)
            .or_insert_with(|| (group.clone(), HashSet::new()));
        if members.insert(member.serialize()) {
            log::debug!("User [{}] added to group [{}]", member, group);
            state.writes += 1;
        }
        true
    }

    fn remove_from_group(&self, member: &DocRef, group: &DocRef, _comment: &str) -> bool {
        let mut state = self.state.write().unwrap();

        let Some((_, members)) = state.groups.get_mut(&group.serialize()) else {
            log::warn!("User [{}] cannot be removed from unknown group [{}]", member, group);
            return false;
        };

        if members.remove(&member.serialize()) {
            log::debug!("User [{}] removed from group [{}]", member, group);
            state.writes += 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupDelta;

    fn user() -> DocRef {
        DocRef::new("XWiki", "jdoe")
    }

    #[test]
    fn test_create_user_injects_active_flag() {
        let directory = MemoryDirectory::new();
        let mut props = HashMap::new();
        props.insert("email".to_string(), "jdoe@example.com".to_string());

        assert!(directory.create_user(&user(), &props));
        let stored = directory.user_properties(&user()).unwrap();
        assert_eq!(stored.get("active"), Some(&"1".to_string()));
        assert_eq!(stored.get("email"), Some(&"jdoe@example.com".to_string()));
    }

    #[test]
    fn test_synchronize_properties_skips_unchanged() {
        let directory = MemoryDirectory::new();
        let mut props = HashMap::new();
        props.insert("email".to_string(), "jdoe@example.com".to_string());
        directory.create_user(&user(), &props);
        let writes = directory.write_count();

        // Same value: no write
        assert!(directory.synchronize_properties(&user(), &props, "sync"));
        assert_eq!(directory.write_count(), writes);

        props.insert("email".to_string(), "new@example.com".to_string());
        assert!(directory.synchronize_properties(&user(), &props, "sync"));
        assert_eq!(directory.write_count(), writes + 1);
    }

    #[test]
    fn test_synchronize_properties_requires_existing_user() {
        let directory = MemoryDirectory::new();
        assert!(!directory.synchronize_properties(&user(), &HashMap::new(), "sync"));
    }

    #[test]
    fn test_add_to_unknown_group_without_create_fails() {
        let directory = MemoryDirectory::new();
        let group = DocRef::new("XWiki", "Team");

        assert!(!directory.add_to_group(&user(), &group, "sync", false));
        assert!(directory.add_to_group(&user(), &group, "sync", true));
        assert!(directory.has_group(&group));
    }

    #[test]
    fn test_membership_sync_only_touches_deltas() {
        let directory = MemoryDirectory::new();
        let g_in = DocRef::new("XWiki", "In");
        let g_out = DocRef::new("XWiki", "Out");
        let g_untouched = DocRef::new("XWiki", "Untouched");

        directory.add_group(&g_in);
        directory.add_group(&g_out);
        directory.add_group(&g_untouched);
        directory.add_to_group(&user(), &g_out, "seed", false);
        directory.add_to_group(&user(), &g_untouched, "seed", false);

        let mut delta = GroupDelta::new();
        delta.add(g_in.clone());
        delta.remove(g_out.clone());

        assert!(directory.synchronize_group_membership(&user(), &delta, "sync"));
        assert_eq!(directory.members_of(&g_in).unwrap(), vec![user().serialize()]);
        assert!(directory.members_of(&g_out).unwrap().is_empty());
        assert_eq!(directory.members_of(&g_untouched).unwrap(), vec![user().serialize()]);
    }

    #[test]
    fn test_membership_sync_fails_on_group_query_outage() {
        let directory = MemoryDirectory::new();
        directory.fail_group_queries(true);

        let delta = GroupDelta::new();
        assert!(!directory.synchronize_group_membership(&user(), &delta, "sync"));
    }
}
