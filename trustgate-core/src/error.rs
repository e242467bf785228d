//! Typed authentication errors

use thiserror::Error;

/// Errors raised by the reconciliation engine.
///
/// Only deployment/integration problems are surfaced as errors; every
/// runtime failure (directory outage, invalid configuration, missing
/// identity) degrades to an anonymous result instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The adapter asserted a unique id that differs from the display name.
    ///
    /// Name-based profile resolution only supports adapters where the two
    /// coincide. This is an integration error, not a runtime condition.
    #[error("adapter reported uid [{uid}] and name [{name}]; name-based profile resolution requires them to coincide")]
    UnsupportedIdentityMapping { uid: String, name: String },

    /// The adapter asserted a unique id but an empty display name.
    #[error("cannot resolve a user profile from an empty user name")]
    EmptyUserName,
}
