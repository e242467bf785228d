//! Dynamic role and field-provenance configuration
//!
//! These are the raw, declarative settings. Compilation into validated
//! rule sets (with the fail-closed safety checks) happens in
//! [`crate::roles`].

use serde::{Deserialize, Serialize};

/// Dynamic role subsystem configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicRolesConfig {
    /// Global provenance default; rules may override any field
    pub provenance: Option<ProvenanceSettings>,

    /// Ordered rule list; the first matching rule wins
    pub rules: Vec<DynamicRoleRuleConfig>,
}

/// One declarative role-to-group derivation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicRoleRuleConfig {
    /// Rule name, used in logs
    pub name: String,

    /// Role claims must start with this prefix
    /// Default: ""
    pub role_prefix: String,

    /// Role claims must end with this suffix
    /// Default: ""
    pub role_suffix: String,

    /// Additional full-match regex constraint on the role claim
    /// Default: "" (no constraint)
    pub role_regex: String,

    /// Regex replacement deriving the group name from the role claim;
    /// empty falls back to prefix/suffix stripping
    /// Default: ""
    pub replacement: String,

    /// Prefix wrapped around the derived group name
    /// Default: ""
    pub group_prefix: String,

    /// Suffix wrapped around the derived group name
    /// Default: ""
    pub group_suffix: String,

    /// Create the target group when it does not exist
    /// Default: true
    pub auto_create: bool,

    /// Per-rule provenance override
    pub provenance: Option<ProvenanceSettings>,
}

impl Default for DynamicRoleRuleConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            role_prefix: String::new(),
            role_suffix: String::new(),
            role_regex: String::new(),
            replacement: String::new(),
            group_prefix: String::new(),
            group_suffix: String::new(),
            auto_create: true,
            provenance: None,
        }
    }
}

/// Raw field-provenance settings.
///
/// Every field is optional; a rule-level setting falls back field by
/// field to the global default, then to the built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceSettings {
    /// Page holding the provenance field
    pub page: Option<String>,

    /// Object class holding the property; empty means "first object
    /// carrying the property"
    pub class_name: Option<String>,

    /// Object index within the class; unset means the first object
    pub object_number: Option<u32>,

    /// Property receiving the provenance entries
    pub property_name: Option<String>,

    /// Entry separator
    /// Default: "|"
    pub separator: Option<String>,

    /// Regex probing whether a `group=role` entry already exists; named
    /// capture groups `group` and `role` constrain the match
    /// Default: `^(?<group>[^=]+)=[\s\S]*`
    pub value_regex: Option<String>,

    /// Template rendering a new entry; placeholders `{group.name}`,
    /// `{group.fullName}`, `{group}`, `{role}`; backslash escapes
    /// Default: `{group.fullName}={role}`
    pub value_format: Option<String>,
}

impl ProvenanceSettings {
    /// Field-by-field fallback onto a parent configuration
    pub fn or(&self, parent: Option<&ProvenanceSettings>) -> ProvenanceSettings {
        let pick = |own: &Option<String>, theirs: fn(&ProvenanceSettings) -> &Option<String>| {
            own.clone().or_else(|| parent.and_then(|p| theirs(p).clone()))
        };

        ProvenanceSettings {
            page: pick(&self.page, |p| &p.page),
            class_name: pick(&self.class_name, |p| &p.class_name),
            object_number: self.object_number.or_else(|| parent.and_then(|p| p.object_number)),
            property_name: pick(&self.property_name, |p| &p.property_name),
            separator: pick(&self.separator, |p| &p.separator),
            value_regex: pick(&self.value_regex, |p| &p.value_regex),
            value_format: pick(&self.value_format, |p| &p.value_format),
        }
    }
}
