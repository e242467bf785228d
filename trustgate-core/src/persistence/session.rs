//! Session-bound plaintext persistence store

use super::PersistenceStore;
use crate::request::RequestContext;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Persistence store keeping the principal in the server-side session
/// bag.
///
/// The session key is randomized per store instance, making it hard to
/// tamper with the entry through unrelated session writers.
pub struct SessionPersistenceStore {
    session_key: String,
}

impl SessionPersistenceStore {
    /// Create a store with a freshly randomized session key
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let len = rng.gen_range(10..21);
        let session_key = (&mut rng)
            .sample_iter(Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Self { session_key }
    }
}

impl Default for SessionPersistenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceStore for SessionPersistenceStore {
    fn store(&self, ctx: &mut RequestContext, principal: &str) {
        log::debug!("Associating principal [{}] to the session.", principal);
        ctx.session_set(self.session_key.clone(), principal);
    }

    fn retrieve(&self, ctx: &RequestContext) -> Option<String> {
        let principal = ctx.session_get(&self.session_key).map(str::to_string);
        match &principal {
            Some(p) => log::debug!("Principal [{}] retrieved from the session.", p),
            None => log::debug!("No principal found in the session."),
        }
        principal
    }

    fn clear(&self, ctx: &mut RequestContext) {
        log::debug!("Clearing principal from the session.");
        ctx.session_remove(&self.session_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_retrieve_clear() {
        let store = SessionPersistenceStore::new();
        let mut ctx = RequestContext::new();

        assert_eq!(store.retrieve(&ctx), None);

        store.store(&mut ctx, "XWiki.jdoe");
        assert_eq!(store.retrieve(&ctx), Some("XWiki.jdoe".to_string()));

        store.clear(&mut ctx);
        assert_eq!(store.retrieve(&ctx), None);
    }

    #[test]
    fn test_session_keys_are_instance_scoped() {
        let a = SessionPersistenceStore::new();
        let b = SessionPersistenceStore::new();
        let mut ctx = RequestContext::new();

        a.store(&mut ctx, "XWiki.jdoe");
        // Overwhelmingly likely the randomized keys differ; the second
        // store must not see the first store's entry.
        assert_ne!(a.session_key, b.session_key);
        assert_eq!(b.retrieve(&ctx), None);
    }
}
