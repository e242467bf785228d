//! Persistence store configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Which persistence store implementation the engine should be wired
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHint {
    /// Plaintext, bound to the server-side session (default)
    #[default]
    Session,

    /// Encrypted cookie with optional TTL
    Cookie,
}

/// Trust and lifetime flags for the cached principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Store selection hint
    /// Default: session
    pub store: StoreHint,

    /// Treat a cached principal as authoritative, skipping the adapter
    /// entirely on a hit
    /// Default: false
    pub trusted: bool,

    /// Keep trusting the cached principal when the adapter reports no
    /// identity (transient upstream failure vs. genuine logout)
    /// Default: false
    pub trusted_on_missing_auth: bool,

    /// Cookie lifetime in seconds; unset makes a session cookie
    /// Default: unset
    pub ttl: Option<i64>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { store: StoreHint::Session, trusted: false, trusted_on_missing_auth: false, ttl: None }
    }
}

impl PersistenceConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(ttl) = self.ttl {
            if ttl <= 0 {
                bail!("Invalid persistence ttl: must be greater than 0 when set");
            }
        }
        Ok(())
    }
}

/// Encrypted-cookie store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieStoreConfig {
    /// Prefix prepended to the cookie name
    /// Default: ""
    pub prefix: String,

    /// Base cookie name
    /// Default: "TRUSTEDAUTH"
    pub name: String,

    /// Cookie path
    /// Default: "/"
    pub path: String,

    /// Domain suffixes the cookie may be scoped to; matched against the
    /// request's server name, dot-prefixed per RFC 2109
    /// Default: empty (cookie valid for the requested host only)
    pub domains: Vec<String>,

    /// Hex-encoded 256-bit encryption key
    pub encryption_key: String,
}

impl Default for CookieStoreConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            name: "TRUSTEDAUTH".to_string(),
            path: "/".to_string(),
            domains: Vec::new(),
            encryption_key: String::new(),
        }
    }
}

impl CookieStoreConfig {
    /// Full cookie name (prefix + base name)
    pub fn cookie_name(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }

    /// Decode the configured encryption key
    pub fn key_bytes(&self) -> Result<[u8; 32]> {
        let bytes = hex::decode(&self.encryption_key)?;
        match <[u8; 32]>::try_from(bytes.as_slice()) {
            Ok(key) => Ok(key),
            Err(_) => bail!("Invalid encryption_key: expected 32 bytes, got {}", bytes.len()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("Invalid cookie name: must not be empty");
        }
        self.key_bytes()?;
        Ok(())
    }
}
