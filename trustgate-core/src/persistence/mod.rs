//! Persistence stores for the last authenticated principal
//!
//! The engine caches the serialized principal between requests so the
//! full reconciliation only runs when the asserted identity changes. Two
//! backends exist: a plaintext store bound to the server-side session and
//! an encrypted cookie store with optional TTL. A configuration flag
//! decides whether the cache is trusted as authoritative or used as an
//! optimization hint only; that decision lives in the engine, the stores
//! just hold bytes.

mod cookie;
mod session;

pub use cookie::CookiePersistenceStore;
pub use session::SessionPersistenceStore;

use crate::request::RequestContext;

/// Opaque cache of the last known authenticated principal.
pub trait PersistenceStore: Send + Sync {
    /// Persist the serialized principal
    fn store(&self, ctx: &mut RequestContext, principal: &str);

    /// Retrieve the cached principal, if any
    fn retrieve(&self, ctx: &RequestContext) -> Option<String>;

    /// Drop the cached principal
    fn clear(&self, ctx: &mut RequestContext);
}
