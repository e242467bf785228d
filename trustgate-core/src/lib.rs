//! Trustgate - Core
//!
//! A trusted-header authentication bridge for content-management
//! platforms.
//!
//! # Overview
//!
//! Trustgate sits between a reverse proxy (or an in-process SSO filter)
//! that has already authenticated the user, and a platform that keeps
//! its own user profiles and groups. On every request it reads the
//! asserted identity, resolves the matching local profile, creates or
//! synchronizes it, reconciles group membership from the asserted role
//! claims, and caches the result so unchanged requests cost nothing.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use trustgate_core::adapter::HeaderIdentityAdapter;
//! use trustgate_core::auth::TrustedAuthenticator;
//! use trustgate_core::config::TrustedAuthConfig;
//! use trustgate_core::directory::MemoryDirectory;
//! use trustgate_core::pages::MemoryPageStore;
//! use trustgate_core::persistence::SessionPersistenceStore;
//! use trustgate_core::request::RequestContext;
//!
//! let config = TrustedAuthConfig::from_toml_str(r#"
//!     [adapter]
//!     auth_field = "remote_user"
//!     group_fields = ["remote_groups"]
//! "#)?;
//!
//! let mut engine = TrustedAuthenticator::new(
//!     config.clone(),
//!     Box::new(HeaderIdentityAdapter::new(config.adapter.clone())),
//!     Box::new(SessionPersistenceStore::new()),
//!     Box::new(MemoryDirectory::new()),
//!     Box::new(MemoryPageStore::new()),
//! )?;
//!
//! let mut ctx = RequestContext::new()
//!     .with_header("remote_user", "jdoe")
//!     .with_header("remote_groups", "editor|proj-42-admin");
//! let principal = engine.authenticate(&mut ctx)?;
//! ```
//!
//! # Architecture
//!
//! - [`adapter`] - Identity extraction from headers or request attributes
//! - [`auth`] - The reconciliation engine and its helpers
//! - [`config`] - TOML-backed configuration with documented defaults
//! - [`directory`] - User/group store contract, in-memory backend, sharding
//! - [`pages`] - Document store contract used for provenance recording
//! - [`persistence`] - Session and encrypted-cookie principal caches
//! - [`request`] - The per-request context the engine operates on
//! - [`roles`] - Dynamic role rules and field provenance

pub mod adapter;
pub mod auth;
pub mod config; // Configuration system with TOML support
pub mod directory;
pub mod error;
pub mod model;
pub mod pages;
pub mod persistence;
pub mod request;
pub mod roles; // Dynamic role rules, compiled and validated up front

// Re-exports of main types and traits
pub use adapter::{AttributeIdentityAdapter, HeaderIdentityAdapter, IdentityAdapter};
pub use auth::TrustedAuthenticator;
pub use config::TrustedAuthConfig;
pub use directory::UserDirectory;
pub use error::AuthError;
pub use model::{DocRef, GroupDelta, Principal};
pub use pages::PageStore;
pub use persistence::PersistenceStore;
pub use request::RequestContext;
