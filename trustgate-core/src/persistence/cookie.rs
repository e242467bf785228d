//! Encrypted-cookie persistence store
//!
//! Keeps the principal client-side in an AEAD-sealed cookie so the cache
//! survives session loss and load-balancer failover. The cookie value is
//! XChaCha20-Poly1305 sealed with a random nonce and base64url encoded;
//! a tampered or foreign cookie simply fails to open and reads as "no
//! cached principal".

use super::PersistenceStore;
use crate::config::{CookieStoreConfig, PersistenceConfig};
use crate::request::{RequestContext, SetCookie};
use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use chrono::{DateTime, Duration, Utc};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The string used to prefix cookie domains to conform to RFC 2109.
const COOKIE_DOT_PFX: &str = ".";

const NONCE_SIZE: usize = 24;

/// Encryption key with zeroize semantics.
#[derive(Zeroize, ZeroizeOnDrop)]
struct CookieKey([u8; 32]);

/// Persistence store keeping the principal in an encrypted cookie.
pub struct CookiePersistenceStore {
    cookie_name: String,
    cookie_path: String,
    cookie_domains: Vec<String>,
    ttl: Option<i64>,
    key: CookieKey,
}

impl CookiePersistenceStore {
    /// Create a store from the cookie and persistence settings.
    ///
    /// Fails when the encryption key does not decode to 32 bytes.
    pub fn new(cookie: &CookieStoreConfig, persistence: &PersistenceConfig) -> Result<Self> {
        let cookie_domains = cookie
            .domains
            .iter()
            .map(|d| conform_cookie_domain(d))
            .collect();

        Ok(Self {
            cookie_name: cookie.cookie_name(),
            cookie_path: cookie.path.clone(),
            cookie_domains,
            ttl: persistence.ttl,
            key: CookieKey(cookie.key_bytes()?),
        })
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new((&self.key.0).into())
    }

    fn encrypt(&self, plaintext: &str) -> Option<String> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        match self.cipher().encrypt(&nonce, plaintext.as_bytes()) {
            Ok(ciphertext) => {
                let mut sealed = nonce.to_vec();
                sealed.extend_from_slice(&ciphertext);
                Some(URL_SAFE_NO_PAD.encode(sealed))
            }
            Err(e) => {
                log::error!("Failed to encrypt the authentication cookie: {}", e);
                None
            }
        }
    }

    fn decrypt(&self, sealed: &str) -> Option<String> {
        let sealed = URL_SAFE_NO_PAD.decode(sealed).ok()?;
        if sealed.len() <= NONCE_SIZE {
            return None;
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher()
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }

    /// Compute the domain the cookie is scoped to: the first configured
    /// domain suffix matching the request's server name, or none (cookie
    /// valid for the requested host only).
    fn cookie_domain(&self, ctx: &RequestContext) -> Option<String> {
        if self.cookie_domains.is_empty() {
            return None;
        }

        // Conform the server name like the configured domains so both
        // localhost.localdomain and any.localhost.localdomain match the
        // same cookie domain.
        let server_name = conform_cookie_domain(ctx.server_name());
        let domain = self
            .cookie_domains
            .iter()
            .find(|domain| server_name.ends_with(domain.as_str()))
            .cloned();
        log::debug!("Cookie domain is: [{:?}]", domain);
        domain
    }

    fn set_cookie(&self, ctx: &mut RequestContext, value: String, max_age: Option<i64>) {
        // Expiry timestamp mirrors the max age for clients ignoring it;
        // deletions are dated at the epoch.
        let expires = max_age.map(|secs| {
            if secs <= 0 {
                DateTime::UNIX_EPOCH
            } else {
                Utc::now() + Duration::seconds(secs)
            }
        });

        let cookie = SetCookie {
            name: self.cookie_name.clone(),
            value,
            path: self.cookie_path.clone(),
            domain: self.cookie_domain(ctx),
            max_age,
            expires,
            secure: ctx.is_secure(),
            http_only: true,
        };
        ctx.add_cookie(cookie);
    }
}

impl PersistenceStore for CookiePersistenceStore {
    fn store(&self, ctx: &mut RequestContext, principal: &str) {
        if let Some(sealed) = self.encrypt(principal) {
            self.set_cookie(ctx, sealed, self.ttl);
        }
    }

    fn retrieve(&self, ctx: &RequestContext) -> Option<String> {
        let sealed = ctx.cookie(&self.cookie_name)?;
        let principal = self.decrypt(sealed);
        if principal.is_none() {
            log::debug!("Failed to decrypt the authentication cookie, ignoring it.");
        }
        principal
    }

    fn clear(&self, ctx: &mut RequestContext) {
        self.set_cookie(ctx, String::new(), Some(0));
    }
}

/// Ensure cookie domains are prefixed with a dot to conform to RFC 2109.
fn conform_cookie_domain(domain: &str) -> String {
    if domain.starts_with(COOKIE_DOT_PFX) {
        domain.to_string()
    } else {
        format!("{}{}", COOKIE_DOT_PFX, domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(domains: Vec<String>, ttl: Option<i64>) -> CookiePersistenceStore {
        let cookie = CookieStoreConfig {
            domains,
            encryption_key: "42".repeat(32),
            ..Default::default()
        };
        let persistence = PersistenceConfig { ttl, ..Default::default() };
        CookiePersistenceStore::new(&cookie, &persistence).unwrap()
    }

    #[test]
    fn test_round_trip_through_cookie() {
        let store = store(vec![], Some(86400));
        let mut ctx = RequestContext::new().with_secure(true);

        store.store(&mut ctx, "XWiki.jdoe");
        let queued = &ctx.outgoing_cookies()[0];
        assert_eq!(queued.name, "TRUSTEDAUTH");
        assert_eq!(queued.max_age, Some(86400));
        assert!(queued.secure);
        assert_ne!(queued.value, "XWiki.jdoe");

        let ctx = RequestContext::new().with_cookie("TRUSTEDAUTH", queued.value.clone());
        assert_eq!(store.retrieve(&ctx), Some("XWiki.jdoe".to_string()));
    }

    #[test]
    fn test_tampered_cookie_reads_as_absent() {
        let store = store(vec![], None);
        let ctx = RequestContext::new().with_cookie("TRUSTEDAUTH", "bm90LXZhbGlk");
        assert_eq!(store.retrieve(&ctx), None);
    }

    #[test]
    fn test_foreign_key_cannot_open() {
        let writer = store(vec![], None);
        let mut ctx = RequestContext::new();
        writer.store(&mut ctx, "XWiki.jdoe");
        let value = ctx.outgoing_cookies()[0].value.clone();

        let cookie = CookieStoreConfig {
            encryption_key: "17".repeat(32),
            ..Default::default()
        };
        let reader =
            CookiePersistenceStore::new(&cookie, &PersistenceConfig::default()).unwrap();
        let ctx = RequestContext::new().with_cookie("TRUSTEDAUTH", value);
        assert_eq!(reader.retrieve(&ctx), None);
    }

    #[test]
    fn test_clear_queues_expired_cookie() {
        let store = store(vec![], Some(3600));
        let mut ctx = RequestContext::new();
        store.clear(&mut ctx);

        let queued = &ctx.outgoing_cookies()[0];
        assert_eq!(queued.max_age, Some(0));
        assert!(queued.value.is_empty());
    }

    #[test]
    fn test_domain_suffix_matching() {
        let store = store(vec!["example.com".to_string(), "intra.net".to_string()], None);

        let ctx = RequestContext::new().with_server_name("wiki.example.com");
        assert_eq!(store.cookie_domain(&ctx), Some(".example.com".to_string()));

        let ctx = RequestContext::new().with_server_name("example.com");
        assert_eq!(store.cookie_domain(&ctx), Some(".example.com".to_string()));

        let ctx = RequestContext::new().with_server_name("other.org");
        assert_eq!(store.cookie_domain(&ctx), None);
    }
}
