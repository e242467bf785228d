//! Authentication engine
//!
//! The engine ties the adapter, the persistence store, the user
//! directory and the page store together into the per-request
//! reconciliation flow.

mod engine;
mod groups;
mod matcher;
mod principal;

pub use engine::TrustedAuthenticator;
pub use matcher::RequestMatcher;
pub use principal::{normalize, profile_for};
