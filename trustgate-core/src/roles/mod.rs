//! Dynamic role rules
//!
//! Role claims supplied by the identity adapter are mapped to groups by an
//! ordered list of rules. Rules are compiled and validated once at engine
//! construction; a rule set containing an unsafe wildcard rule (no group
//! prefix and no group suffix) is disabled entirely, which makes every
//! dynamic synchronization fail and thus denies authentication until the
//! configuration is fixed.

mod provenance;

pub use provenance::{FieldProvenanceConfig, ProvenanceRecorder};

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::{DynamicRoleRuleConfig, DynamicRolesConfig, ProvenanceSettings};
use crate::model::DocRef;

/// One compiled role-to-group derivation rule.
#[derive(Debug, Clone)]
pub struct DynamicRoleRule {
    name: String,
    role_prefix: String,
    role_suffix: String,
    role_regex: Option<Regex>,
    replacement: String,
    group_prefix: String,
    group_suffix: String,
    auto_create: bool,
    provenance: Option<FieldProvenanceConfig>,
    // group prefix with any wiki qualifier stripped, for matching against
    // locally serialized group references
    unqualified_group_prefix: String,
}

impl DynamicRoleRule {
    fn compile(
        config: &DynamicRoleRuleConfig,
        global_provenance: Option<&ProvenanceSettings>,
    ) -> Result<Self> {
        let role_regex = if config.role_regex.is_empty() {
            None
        } else {
            Some(
                Regex::new(&config.role_regex)
                    .with_context(|| format!("invalid role regex [{}]", config.role_regex))?,
            )
        };

        let provenance = match &config.provenance {
            Some(own) => FieldProvenanceConfig::parse(&own.or(global_provenance))?,
            None => match global_provenance {
                Some(global) => FieldProvenanceConfig::parse(global)?,
                None => None,
            },
        };

        let unqualified_group_prefix = config
            .group_prefix
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or(&config.group_prefix)
            .to_string();

        Ok(Self {
            name: config.name.clone(),
            role_prefix: config.role_prefix.clone(),
            role_suffix: config.role_suffix.clone(),
            role_regex,
            replacement: config.replacement.clone(),
            group_prefix: config.group_prefix.clone(),
            group_suffix: config.group_suffix.clone(),
            auto_create: config.auto_create,
            provenance,
            unqualified_group_prefix,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn auto_create(&self) -> bool {
        self.auto_create
    }

    pub fn provenance(&self) -> Option<&FieldProvenanceConfig> {
        self.provenance.as_ref()
    }

    /// Whether a role claim is covered by this rule.
    ///
    /// A rule with no role constraint at all never matches; otherwise the
    /// prefix and suffix must both match, and the regex (when set) must
    /// match the full claim.
    pub fn matches_role(&self, role: &str) -> bool {
        if self.role_prefix.is_empty() && self.role_suffix.is_empty() && self.role_regex.is_none() {
            return false;
        }

        if !role.starts_with(&self.role_prefix) || !role.ends_with(&self.role_suffix) {
            return false;
        }

        if let Some(regex) = &self.role_regex {
            let full_match = regex
                .find(role)
                .is_some_and(|m| m.start() == 0 && m.end() == role.len());
            if !full_match {
                return false;
            }
        }

        true
    }

    /// Derive the group reference for a matching role claim.
    pub fn group_for_role(&self, role: &str, user_space: &str) -> DocRef {
        match &self.role_regex {
            Some(regex) if !self.replacement.is_empty() => {
                let name = regex.replace(role, self.replacement.as_str()).into_owned();
                DocRef::parse(&name, user_space)
            }
            _ => {
                let start = self.role_prefix.len();
                let end = role.len().saturating_sub(self.role_suffix.len());
                let radical = if start <= end { &role[start..end] } else { "" };
                let name = format!("{}{}{}", self.group_prefix, radical, self.group_suffix);
                DocRef::parse(&name, user_space)
            }
        }
    }

    /// Whether an existing group looks like it was derived by this rule.
    /// Used to remove memberships whose role claim is gone.
    pub fn matches_group(&self, group: &DocRef) -> bool {
        let local = group.local();
        local.starts_with(&self.unqualified_group_prefix) && local.ends_with(&self.group_suffix)
    }
}

/// Compile the configured rule list, failing closed on unsafe rules.
///
/// `None` means the configuration is unusable and dynamic synchronization
/// must deny access; an empty rule list is valid and synchronizes nothing.
pub fn compile_rules(config: &DynamicRolesConfig) -> Option<Vec<DynamicRoleRule>> {
    let mut rules = Vec::with_capacity(config.rules.len());

    for raw in &config.rules {
        if raw.group_prefix.is_empty() && raw.group_suffix.is_empty() {
            // Without a group prefix or suffix the removal pass would
            // match every group the user is in.
            log::error!(
                "Dynamic role configuration [{}] doesn't specify any group prefix or suffix. \
                 To be safe, access will be denied until the configuration is fixed.",
                raw.name
            );
            return None;
        }

        match DynamicRoleRule::compile(raw, config.provenance.as_ref()) {
            Ok(rule) => rules.push(rule),
            Err(err) => {
                log::error!(
                    "Dynamic role configuration [{}] is invalid, access will be denied until \
                     the configuration is fixed: {:#}",
                    raw.name,
                    err
                );
                return None;
            }
        }
    }

    Some(rules)
}

/// First matching rule for a role claim, in configuration order.
pub fn rule_for_role<'a>(rules: &'a [DynamicRoleRule], role: &str) -> Option<&'a DynamicRoleRule> {
    rules.iter().find(|rule| rule.matches_role(role))
}
