//! Configuration surface for the trusted authentication bridge
//!
//! Every setting carries a documented default matching the behavior the
//! upstream deployments expect. Configurations deserialize from TOML and
//! validate structural sanity up front; safety checks that must fail
//! closed (unsafe dynamic-role rules, broken provenance templates) are
//! applied later when the engine compiles its rule set, so a bad rule
//! disables the feature instead of refusing to boot.

mod adapter;
mod persistence;
mod roles;

pub use adapter::AdapterConfig;
pub use persistence::{CookieStoreConfig, PersistenceConfig, StoreHint};
pub use roles::{DynamicRoleRuleConfig, DynamicRolesConfig, ProvenanceSettings};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Case folding applied to the asserted user name before building the
/// profile name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStyle {
    /// Whole name lowercased (default)
    #[default]
    Lowercase,

    /// Whole name uppercased
    Uppercase,

    /// First character uppercased, remainder lowercased (whole string,
    /// not per-word)
    Titlecase,

    /// Name kept as asserted
    None,
}

/// Root configuration for the trusted authentication bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustedAuthConfig {
    /// Identity adapter settings (header/attribute field names, secret,
    /// logout URL template)
    pub adapter: AdapterConfig,

    /// Persistence store selection and trust flags
    pub persistence: PersistenceConfig,

    /// Encrypted-cookie store settings (used when the cookie store is
    /// selected)
    pub cookie: CookieStoreConfig,

    /// Case folding policy for profile names
    /// Default: lowercase
    pub case_style: CaseStyle,

    /// Ordered literal replacements applied to the profile name after
    /// case folding, e.g. `[[".", "="], ["@", "_"]]`
    /// Default: empty
    pub user_profile_replacements: Vec<(String, String)>,

    /// Profile property synchronization: local field name -> adapter
    /// field name
    /// Default: empty
    pub property_mappings: HashMap<String, String>,

    /// Static group mapping: group reference -> roles granting membership
    /// Default: empty
    pub group_mappings: HashMap<String, Vec<String>>,

    /// Dynamic role rules and the global provenance default
    pub dynamic_roles: DynamicRolesConfig,

    /// Group names split into consistently-hashed shard groups
    /// Default: empty
    pub sharded_groups: Vec<String>,

    /// Regex matched as a prefix against the request path to detect
    /// logout requests
    /// Default: `(/|/[^/]+/|/wiki/[^/]+/)logout/*`
    pub logout_page_pattern: String,

    /// Suppress the host platform's fallback authenticator
    /// Default: false
    pub authoritative: bool,

    /// Opaque hint naming the fallback authenticator the host should use
    /// when this one yields anonymous
    /// Default: none
    pub fallback_authenticator: Option<String>,

    /// Wiki qualifier applied to unqualified provenance page names
    /// Default: "xwiki"
    pub main_wiki: String,

    /// Space where user profiles and unqualified groups live
    /// Default: "XWiki"
    pub user_space: String,
}

impl Default for TrustedAuthConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterConfig::default(),
            persistence: PersistenceConfig::default(),
            cookie: CookieStoreConfig::default(),
            case_style: CaseStyle::default(),
            user_profile_replacements: Vec::new(),
            property_mappings: HashMap::new(),
            group_mappings: HashMap::new(),
            dynamic_roles: DynamicRolesConfig::default(),
            sharded_groups: Vec::new(),
            logout_page_pattern: "(/|/[^/]+/|/wiki/[^/]+/)logout/*".to_string(),
            authoritative: false,
            fallback_authenticator: None,
            main_wiki: "xwiki".to_string(),
            user_space: "XWiki".to_string(),
        }
    }
}

impl TrustedAuthConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("invalid trustgate configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_space.is_empty() {
            bail!("Invalid user_space: must not be empty");
        }

        if self.logout_page_pattern.is_empty() {
            bail!("Invalid logout_page_pattern: must not be empty");
        }

        regex::Regex::new(&self.logout_page_pattern)
            .context("Invalid logout_page_pattern: not a valid regex")?;

        self.persistence.validate()?;

        if self.persistence.store == StoreHint::Cookie {
            self.cookie.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrustedAuthConfig::default();
        assert_eq!(config.case_style, CaseStyle::Lowercase);
        assert!(!config.persistence.trusted);
        assert!(!config.authoritative);
        assert_eq!(config.logout_page_pattern, "(/|/[^/]+/|/wiki/[^/]+/)logout/*");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = TrustedAuthConfig::from_toml_str(
            r#"
            case_style = "titlecase"
            user_profile_replacements = [[".", "="], ["@", "_"]]

            [persistence]
            trusted = true

            [group_mappings]
            "XWiki.Admins" = ["admin", "superadmin"]

            [[dynamic_roles.rules]]
            name = "projects"
            role_prefix = "proj-"
            role_suffix = "-admin"
            group_prefix = "Group."
            "#,
        )
        .unwrap();

        assert_eq!(config.case_style, CaseStyle::Titlecase);
        assert!(config.persistence.trusted);
        assert_eq!(config.group_mappings["XWiki.Admins"].len(), 2);
        assert_eq!(config.dynamic_roles.rules.len(), 1);
        assert_eq!(config.dynamic_roles.rules[0].role_prefix, "proj-");
    }

    #[test]
    fn test_invalid_logout_pattern_rejected() {
        let mut config = TrustedAuthConfig::default();
        config.logout_page_pattern = "([unclosed".to_string();
        assert!(config.validate().is_err());
    }
}
