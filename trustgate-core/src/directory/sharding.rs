//! Sharding directory decorator
//!
//! Splits configured groups into consistently-hashed shard groups to
//! bound per-document membership size. A member of a sharded group
//! `Team` lands in `Team-Shard<X>` where `X` is the first hex digit of
//! the SHA-256 of the serialized user reference, giving sixteen stable
//! shards per group. Shards are registered as members of the parent
//! group so membership resolution still sees one logical group.

use super::UserDirectory;
use crate::model::{DocRef, GroupDelta};
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Decorator mapping group references onto shard groups.
pub struct ShardingDirectory<D> {
    inner: D,
    sharded_groups: HashSet<String>,
}

impl<D: UserDirectory> ShardingDirectory<D> {
    /// Wrap a directory, sharding the given group names
    pub fn new(inner: D, sharded_groups: impl IntoIterator<Item = String>) -> Self {
        Self { inner, sharded_groups: sharded_groups.into_iter().collect() }
    }

    /// The shard of `group` holding `user`, or the group itself when it
    /// is not sharded.
    pub fn sharded_group(&self, group: &DocRef, user: &DocRef) -> DocRef {
        if !self.sharded_groups.contains(group.name()) {
            return group.clone();
        }

        let digest = Sha256::digest(user.serialize().as_bytes());
        let shard_digit = format!("{:X}", digest[0] >> 4);
        group.with_name(format!("{}-Shard{}", group.name(), shard_digit))
    }

    /// Make sure the shard is wired as a member of its parent group.
    fn setup_shard(&self, parent: &DocRef, shard: &DocRef, comment: &str) {
        // add_to_group is a no-op when the membership already exists.
        if !self.inner.add_to_group(shard, parent, comment, true) {
            log::error!("Failed to set up group shard [{}] for group [{}]", shard, parent);
        }
    }
}

impl<D: UserDirectory> UserDirectory for ShardingDirectory<D> {
    fn exists(&self, user: &DocRef) -> Result<bool> {
        self.inner.exists(user)
    }

    fn create_user(&self, user: &DocRef, properties: &HashMap<String, String>) -> bool {
        self.inner.create_user(user, properties)
    }

    fn synchronize_properties(
        &self,
        user: &DocRef,
        properties: &HashMap<String, String>,
        comment: &str,
    ) -> bool {
        self.inner.synchronize_properties(user, properties, comment)
    }

    fn groups_for_member(&self, user: &DocRef) -> Result<Vec<DocRef>> {
        self.inner.groups_for_member(user)
    }

    fn add_to_group(&self, member: &DocRef, group: &DocRef, comment: &str, create: bool) -> bool {
        self.inner.add_to_group(member, group, comment, create)
    }

    fn remove_from_group(&self, member: &DocRef, group: &DocRef, comment: &str) -> bool {
        self.inner.remove_from_group(member, group, comment)
    }

    fn synchronize_group_membership(&self, user: &DocRef, delta: &GroupDelta, comment: &str) -> bool {
        let mut sharded = GroupDelta::new();

        // Shards are managed by this decorator: they are created and
        // wired into their parent on demand, even for additions that
        // would not create the target group themselves.
        for group in delta.to_add() {
            let shard = self.sharded_group(group, user);
            if shard != *group {
                self.setup_shard(group, &shard, comment);
                sharded.add_with_autocreate(shard);
            } else {
                sharded.add(shard);
            }
        }

        for group in delta.to_add_with_autocreate() {
            let shard = self.sharded_group(group, user);
            if shard != *group {
                self.setup_shard(group, &shard, comment);
            }
            sharded.add_with_autocreate(shard);
        }

        // Remove from both the shard and the parent group, in case the
        // user was added before sharding was enabled.
        for group in delta.to_remove() {
            sharded.remove(self.sharded_group(group, user));
            sharded.remove(group.clone());
        }

        self.inner.synchronize_group_membership(user, &sharded, comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;

    fn user() -> DocRef {
        DocRef::new("XWiki", "jdoe")
    }

    #[test]
    fn test_unsharded_group_passes_through() {
        let directory = ShardingDirectory::new(MemoryDirectory::new(), vec![]);
        let group = DocRef::new("XWiki", "Team");
        assert_eq!(directory.sharded_group(&group, &user()), group);
    }

    #[test]
    fn test_shard_name_is_stable_and_hex() {
        let directory =
            ShardingDirectory::new(MemoryDirectory::new(), vec!["Team".to_string()]);
        let group = DocRef::new("XWiki", "Team");

        let shard = directory.sharded_group(&group, &user());
        assert_eq!(shard, directory.sharded_group(&group, &user()));
        assert_eq!(shard.space(), "XWiki");

        let name = shard.name();
        assert!(name.starts_with("Team-Shard"), "unexpected shard name {}", name);
        let digit = name.chars().last().unwrap();
        assert!(digit.is_ascii_hexdigit() && !digit.is_ascii_lowercase());
    }

    #[test]
    fn test_autocreate_registers_shard_in_parent() {
        let memory = MemoryDirectory::new();
        let directory = ShardingDirectory::new(memory.clone(), vec!["Team".to_string()]);
        let group = DocRef::new("XWiki", "Team");

        let mut delta = GroupDelta::new();
        delta.add_with_autocreate(group.clone());
        assert!(directory.synchronize_group_membership(&user(), &delta, "sync"));

        let shard = directory.sharded_group(&group, &user());
        // User lives in the shard, shard lives in the parent
        assert_eq!(memory.members_of(&shard).unwrap(), vec![user().serialize()]);
        assert_eq!(memory.members_of(&group).unwrap(), vec![shard.serialize()]);
    }

    #[test]
    fn test_removal_targets_shard_and_parent() {
        let memory = MemoryDirectory::new();
        let directory = ShardingDirectory::new(memory.clone(), vec!["Team".to_string()]);
        let group = DocRef::new("XWiki", "Team");
        let shard = directory.sharded_group(&group, &user());

        // Seed membership in the parent, as deployed before sharding
        memory.add_to_group(&user(), &group, "seed", true);
        memory.add_to_group(&user(), &shard, "seed", true);

        let mut delta = GroupDelta::new();
        delta.remove(group.clone());
        assert!(directory.synchronize_group_membership(&user(), &delta, "sync"));

        assert!(memory.members_of(&group).unwrap().is_empty());
        assert!(memory.members_of(&shard).unwrap().is_empty());
    }
}
