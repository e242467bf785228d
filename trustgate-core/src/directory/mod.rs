//! User directory
//!
//! The directory is the opaque store holding user profiles and group
//! membership. The engine only needs a handful of CRUD-ish operations;
//! everything else (storage, uniqueness, concurrency) is the backend's
//! concern. The [`ShardingDirectory`] decorator transparently fans large
//! groups out onto consistently-hashed shard groups.

mod memory;
mod sharding;

pub use memory::MemoryDirectory;
pub use sharding::ShardingDirectory;

use crate::model::{DocRef, GroupDelta};
use anyhow::Result;
use std::collections::HashMap;

/// Opaque user/group store operations consumed by the engine.
pub trait UserDirectory: Send + Sync {
    /// Whether a user profile exists
    fn exists(&self, user: &DocRef) -> Result<bool>;

    /// Create a user profile with the given properties.
    ///
    /// Implementations log their own failures; `false` means the profile
    /// was not created.
    fn create_user(&self, user: &DocRef, properties: &HashMap<String, String>) -> bool;

    /// Update properties on an existing profile
    fn synchronize_properties(
        &self,
        user: &DocRef,
        properties: &HashMap<String, String>,
        comment: &str,
    ) -> bool;

    /// Groups the member currently belongs to
    fn groups_for_member(&self, user: &DocRef) -> Result<Vec<DocRef>>;

    /// Add a member to a group, optionally creating the group
    fn add_to_group(&self, member: &DocRef, group: &DocRef, comment: &str, create: bool) -> bool;

    /// Remove a member from a group
    fn remove_from_group(&self, member: &DocRef, group: &DocRef, comment: &str) -> bool;

    /// Apply a group delta: add memberships that are missing, remove
    /// memberships that are present, leave everything else untouched.
    ///
    /// Both add sides describe the same target state; only the
    /// autocreate side may create groups.
    fn synchronize_group_membership(&self, user: &DocRef, delta: &GroupDelta, comment: &str) -> bool {
        let current = match self.groups_for_member(user) {
            Ok(groups) => groups,
            Err(e) => {
                log::error!("Failed to synchronize groups for user [{}]: {}", user, e);
                return false;
            }
        };

        log::debug!("Groups the user [{}] is currently a member of: {:?}", user, current);

        let mut success = true;

        for group in delta.to_add() {
            if !current.contains(group) {
                success &= self.add_to_group(user, group, comment, false);
            }
        }

        for group in delta.to_add_with_autocreate() {
            if !current.contains(group) {
                success &= self.add_to_group(user, group, comment, true);
            }
        }

        for group in delta.to_remove() {
            if current.contains(group) {
                success &= self.remove_from_group(user, group, comment);
            }
        }

        success
    }
}

impl<T: UserDirectory + ?Sized> UserDirectory for Box<T> {
    fn exists(&self, user: &DocRef) -> Result<bool> {
        (**self).exists(user)
    }

    fn create_user(&self, user: &DocRef, properties: &HashMap<String, String>) -> bool {
        (**self).create_user(user, properties)
    }

    fn synchronize_properties(
        &self,
        user: &DocRef,
        properties: &HashMap<String, String>,
        comment: &str,
    ) -> bool {
        (**self).synchronize_properties(user, properties, comment)
    }

    fn groups_for_member(&self, user: &DocRef) -> Result<Vec<DocRef>> {
        (**self).groups_for_member(user)
    }

    fn add_to_group(&self, member: &DocRef, group: &DocRef, comment: &str, create: bool) -> bool {
        (**self).add_to_group(member, group, comment, create)
    }

    fn remove_from_group(&self, member: &DocRef, group: &DocRef, comment: &str) -> bool {
        (**self).remove_from_group(member, group, comment)
    }

    fn synchronize_group_membership(&self, user: &DocRef, delta: &GroupDelta, comment: &str) -> bool {
        (**self).synchronize_group_membership(user, delta, comment)
    }
}
