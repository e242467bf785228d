//! Reconciliation engine
//!
//! One `authenticate` call reconciles the externally-asserted identity
//! with the local user directory: cache check, identity extraction,
//! profile normalization, creation and property sync, group delta
//! computation and application, cache update, logout detection. Runtime
//! failures degrade to an anonymous result; only integration errors
//! (an adapter asserting uid and name that differ) surface as `Err`.

use std::collections::HashMap;

use anyhow::Result;

use super::groups;
use super::matcher::RequestMatcher;
use super::principal::profile_for;
use crate::adapter::IdentityAdapter;
use crate::config::TrustedAuthConfig;
use crate::directory::{ShardingDirectory, UserDirectory};
use crate::error::AuthError;
use crate::model::{DocRef, GroupDelta, Principal};
use crate::pages::PageStore;
use crate::persistence::PersistenceStore;
use crate::request::RequestContext;
use crate::roles::{compile_rules, DynamicRoleRule, ProvenanceRecorder};

const PROFILE_SYNC_COMMENT: &str = "Trusted authenticator user profile synchronization";
const GROUP_SYNC_COMMENT: &str = "Trusted authentication group synchronization";

/// Trusted authentication engine.
///
/// Collaborators are injected once; per-request state lives entirely in
/// the [`RequestContext`]. Expensive configuration artifacts (the logout
/// matcher, the resolved group mapping, the compiled dynamic rule set)
/// are built at construction.
pub struct TrustedAuthenticator {
    config: TrustedAuthConfig,
    adapter: Box<dyn IdentityAdapter>,
    store: Box<dyn PersistenceStore>,
    directory: Box<dyn UserDirectory>,
    pages: Box<dyn PageStore>,
    logout_matcher: RequestMatcher,
    group_mappings: Vec<(DocRef, Vec<String>)>,
    // None when the configured rule set failed validation
    rules: Option<Vec<DynamicRoleRule>>,
}

impl TrustedAuthenticator {
    /// Build an engine from a validated configuration and its
    /// collaborators. Sharded group handling is layered over the
    /// directory here when configured.
    pub fn new(
        config: TrustedAuthConfig,
        adapter: Box<dyn IdentityAdapter>,
        store: Box<dyn PersistenceStore>,
        directory: Box<dyn UserDirectory>,
        pages: Box<dyn PageStore>,
    ) -> Result<Self> {
        config.validate()?;

        let logout_matcher = RequestMatcher::new(&config.logout_page_pattern)?;

        let group_mappings = config
            .group_mappings
            .iter()
            .map(|(group, roles)| (DocRef::parse(group, &config.user_space), roles.clone()))
            .collect();

        let rules = compile_rules(&config.dynamic_roles);

        let directory: Box<dyn UserDirectory> = if config.sharded_groups.is_empty() {
            directory
        } else {
            Box::new(ShardingDirectory::new(
                directory,
                config.sharded_groups.iter().cloned(),
            ))
        };

        Ok(Self {
            config,
            adapter,
            store,
            directory,
            pages,
            logout_matcher,
            group_mappings,
            rules,
        })
    }

    /// Whether the host platform should skip its own fallback
    /// authenticator when this engine yields anonymous.
    pub fn is_authoritative(&self) -> bool {
        self.config.authoritative
    }

    /// Hint naming the fallback authenticator the host should use.
    pub fn fallback_authenticator(&self) -> Option<&str> {
        self.config.fallback_authenticator.as_deref()
    }

    /// Authenticate one request.
    ///
    /// `Ok(None)` is public access. Logout detection runs on every
    /// invocation, whatever the authentication outcome.
    pub fn authenticate(
        &mut self,
        ctx: &mut RequestContext,
    ) -> Result<Option<Principal>, AuthError> {
        log::debug!("Starting trusted authentication...");

        let result = self.resolve(ctx);

        if self.logout_matcher.matches(ctx) {
            if let Some(url) = self.adapter.logout_url(None) {
                log::debug!("Requesting external logout redirection.");
                ctx.request_logout_redirect(url);
            }
            self.store.clear(ctx);
        }

        result
    }

    fn resolve(&mut self, ctx: &mut RequestContext) -> Result<Option<Principal>, AuthError> {
        let cached = self.store.retrieve(ctx);

        if self.config.persistence.trusted {
            if let Some(cached) = &cached {
                log::debug!("User [{}] authenticated from trusted persistence store.", cached);
                return Ok(Some(Principal::parse(cached, &self.config.user_space)));
            }
        }

        let uid = self
            .adapter
            .user_uid(ctx)
            .filter(|uid| !uid.trim().is_empty());

        let Some(uid) = uid else {
            log::debug!("No user available from the authentication adapter.");
            if let Some(cached) = cached {
                if self.config.persistence.trusted_on_missing_auth {
                    log::debug!(
                        "User [{}] authenticated from 'trusted on missing authentication' persistence store.",
                        cached
                    );
                    return Ok(Some(Principal::parse(&cached, &self.config.user_space)));
                }
                log::debug!("Clearing persistence store, removing [{}].", cached);
                self.store.clear(ctx);
            }
            log::debug!("Trusted authentication ended with public access.");
            return Ok(None);
        };
        log::debug!("User [{}] retrieved from the authentication adapter.", uid);

        let profile = self.profile_reference(ctx, &uid)?;
        self.reconcile(ctx, cached, profile)
    }

    /// Resolve the profile reference for an asserted uid.
    ///
    /// Adapters may assert an empty name, and adapters where uid and name
    /// differ are not supported by name-based resolution; both are
    /// integration errors.
    fn profile_reference(
        &self,
        ctx: &RequestContext,
        uid: &str,
    ) -> Result<Principal, AuthError> {
        let name = self
            .adapter
            .user_name(ctx)
            .filter(|name| !name.trim().is_empty())
            .ok_or(AuthError::EmptyUserName)?;

        if name != uid {
            return Err(AuthError::UnsupportedIdentityMapping {
                uid: uid.to_string(),
                name,
            });
        }

        Ok(profile_for(
            &name,
            self.config.case_style,
            &self.config.user_profile_replacements,
            &self.config.user_space,
        ))
    }

    fn reconcile(
        &mut self,
        ctx: &mut RequestContext,
        cached: Option<String>,
        profile: Principal,
    ) -> Result<Option<Principal>, AuthError> {
        let serialized = profile.serialize();

        if let Some(cached) = cached {
            log::debug!("User [{}] retrieved from untrusted persistence store.", cached);
            if cached == serialized {
                log::debug!(
                    "User [{}] authenticated from the authentication adapter, no synchronization.",
                    serialized
                );
                return Ok(Some(profile));
            }
            log::debug!("Authentication changed, clearing persistence store, removing [{}].", cached);
            self.store.clear(ctx);
        }

        if !self.synchronize_user(ctx, profile.doc_ref()) {
            log::error!(
                "Unable to synchronize user profile for user [{}], ended with public access.",
                serialized
            );
            return Ok(None);
        }

        self.store.store(ctx, &serialized);
        log::debug!(
            "User [{}] authenticated from the authentication adapter and saved to persistence store.",
            serialized
        );

        Ok(Some(profile))
    }

    /// Create or update the profile, then apply the group delta.
    fn synchronize_user(&mut self, ctx: &RequestContext, user: &DocRef) -> bool {
        let properties = self.extended_properties(ctx);

        match self.directory.exists(user) {
            Ok(false) => {
                log::debug!("Creating user [{}]...", user);
                if !self.directory.create_user(user, &properties) {
                    return false;
                }
            }
            Ok(true) => {
                if !properties.is_empty() {
                    log::debug!("Synchronizing profile for user [{}]...", user);
                    // best effort, a failed property update does not
                    // block the authentication
                    self.directory
                        .synchronize_properties(user, &properties, PROFILE_SYNC_COMMENT);
                }
            }
            Err(e) => {
                log::error!("Failed to look up user [{}]: {:#}", user, e);
                return false;
            }
        }

        self.synchronize_groups(ctx, user)
    }

    /// Profile property values pulled from the adapter through the
    /// configured property mapping. Blank values are skipped.
    fn extended_properties(&self, ctx: &RequestContext) -> HashMap<String, String> {
        let mut properties = HashMap::new();
        for (local_field, adapter_field) in &self.config.property_mappings {
            if let Some(value) = self.adapter.user_property(ctx, adapter_field) {
                if !value.trim().is_empty() {
                    properties.insert(local_field.clone(), value.trim().to_string());
                }
            }
        }
        properties
    }

    fn synchronize_groups(&mut self, ctx: &RequestContext, user: &DocRef) -> bool {
        let mut delta = GroupDelta::new();

        groups::static_pass(&mut delta, self.adapter.as_ref(), ctx, &self.group_mappings);

        let mut recorder = ProvenanceRecorder::new(self.pages.as_mut(), &self.config.main_wiki);
        let dynamic_ok = groups::dynamic_pass(
            &mut delta,
            self.rules.as_deref(),
            self.adapter.as_ref(),
            ctx,
            user,
            &self.directory,
            &self.config.user_space,
            &mut recorder,
        );
        recorder.flush();

        if !dynamic_ok {
            return false;
        }

        if !delta.is_empty() {
            log::debug!("Synchronizing groups for user [{}]...", user);
            self.directory
                .synchronize_group_membership(user, &delta, GROUP_SYNC_COMMENT);
        }

        true
    }
}
