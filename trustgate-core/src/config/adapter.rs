//! Identity adapter configuration

use serde::{Deserialize, Serialize};

/// Settings shared by the header and attribute adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Request field carrying the authenticated unique id
    /// Default: "remote_user"
    pub auth_field: String,

    /// Request field carrying the display name; falls back to
    /// `auth_field` when unset
    pub id_field: Option<String>,

    /// Header carrying the shared secret the upstream proxy must present
    /// (header adapter only). Unset disables the check.
    pub secret_field: Option<String>,

    /// Expected value of the secret header
    pub secret_value: Option<String>,

    /// Request fields carrying role claims; values of every listed field
    /// are merged
    /// Default: empty
    pub group_fields: Vec<String>,

    /// Separator splitting one field value into individual role claims
    /// Default: "|"
    pub group_value_separator: String,

    /// Charset used to reinterpret raw Latin-1 field bytes, e.g. "utf-8".
    /// Unset keeps the raw value.
    pub encoding: Option<String>,

    /// External logout URL template; `__REDIRECT__` is substituted with
    /// the URL-encoded return location
    pub logout_url: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            auth_field: "remote_user".to_string(),
            id_field: None,
            secret_field: None,
            secret_value: None,
            group_fields: Vec::new(),
            group_value_separator: "|".to_string(),
            encoding: None,
            logout_url: None,
        }
    }
}

impl AdapterConfig {
    /// Field carrying the display name (defaults to the auth field)
    pub fn id_field(&self) -> &str {
        self.id_field.as_deref().unwrap_or(&self.auth_field)
    }
}
