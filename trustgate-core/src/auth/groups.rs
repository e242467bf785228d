//! Group delta computation
//!
//! Two passes populate the delta for one authentication. The static pass
//! walks the configured group mappings and decides membership from role
//! claims; the dynamic pass derives groups from role claims through the
//! compiled rule set and sweeps derived-looking groups whose claim is
//! gone. The static pass runs first, so a static decision always wins
//! over a dynamic one for the same group.

use crate::adapter::IdentityAdapter;
use crate::directory::UserDirectory;
use crate::model::{DocRef, GroupDelta};
use crate::request::RequestContext;
use crate::roles::{rule_for_role, DynamicRoleRule, ProvenanceRecorder};

/// Decide membership for every statically mapped group: holding any of
/// the mapped roles adds the group, holding none removes it.
pub(crate) fn static_pass(
    delta: &mut GroupDelta,
    adapter: &dyn IdentityAdapter,
    ctx: &RequestContext,
    mappings: &[(DocRef, Vec<String>)],
) {
    for (group, roles) in mappings {
        let is_member = roles.iter().any(|role| adapter.is_user_in_role(ctx, role));
        if is_member {
            delta.add(group.clone());
        } else {
            delta.remove(group.clone());
        }
    }
}

/// Derive groups from the role claims and sweep stale derived groups.
///
/// `rules` is `None` when the rule set failed validation; dynamic
/// synchronization then fails, which denies the whole authentication.
/// An empty rule list synchronizes nothing and succeeds. A `None` role
/// claim list from the adapter is a retrieval failure and also denies.
#[allow(clippy::too_many_arguments)]
pub(crate) fn dynamic_pass(
    delta: &mut GroupDelta,
    rules: Option<&[DynamicRoleRule]>,
    adapter: &dyn IdentityAdapter,
    ctx: &RequestContext,
    user: &DocRef,
    directory: &dyn UserDirectory,
    user_space: &str,
    recorder: &mut ProvenanceRecorder<'_>,
) -> bool {
    let Some(rules) = rules else {
        return false;
    };
    if rules.is_empty() {
        return true;
    }

    let Some(claims) = adapter.user_roles(ctx) else {
        log::debug!("Failed to retrieve role claims for user [{}].", user);
        return false;
    };
    log::debug!("Found roles: {:?}", claims);

    for claim in &claims {
        let Some(rule) = rule_for_role(rules, claim) else {
            log::debug!("Did not find any dynamic configuration for role [{}]", claim);
            continue;
        };

        let group = rule.group_for_role(claim, user_space);
        log::debug!("Role [{}] maps to group [{}] via rule [{}]", claim, group, rule.name());

        if rule.auto_create() {
            if let Some(provenance) = rule.provenance() {
                recorder.record(provenance, &group, claim);
            }
            delta.add_with_autocreate(group);
        } else {
            delta.add(group);
        }
    }

    let current = match directory.groups_for_member(user) {
        Ok(groups) => groups,
        Err(e) => {
            log::error!("Failed to get user groups [{}]: {:#}", user, e);
            return false;
        }
    };

    for group in current {
        if delta.is_added(&group) {
            continue;
        }
        if rules.iter().any(|rule| rule.matches_group(&group)) {
            delta.remove(group);
        }
    }

    true
}
