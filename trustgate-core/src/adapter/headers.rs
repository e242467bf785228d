//! Header-based identity adapter
//!
//! Trusts the reverse proxy in front of the platform to assert the user's
//! identity through HTTP headers. Because headers are forgeable when the
//! proxy is bypassed, an optional shared-secret header can be required.

use super::{collect_roles, recode_field, render_logout_url, IdentityAdapter};
use crate::config::AdapterConfig;
use crate::request::RequestContext;

/// Identity adapter reading trusted HTTP headers.
pub struct HeaderIdentityAdapter {
    config: AdapterConfig,
}

impl HeaderIdentityAdapter {
    /// Create an adapter with the given settings
    pub fn new(config: AdapterConfig) -> Self {
        Self { config }
    }

    fn header(&self, ctx: &RequestContext, name: &str) -> Option<String> {
        if name.trim().is_empty() {
            return None;
        }
        let value = ctx.header(name)?;
        if value.trim().is_empty() {
            return Some(value);
        }
        Some(recode_field(name, value, self.config.encoding.as_deref()))
    }

    /// Validate the shared secret when one is configured.
    fn secret_matches(&self, ctx: &RequestContext) -> bool {
        let Some(secret_field) = self.config.secret_field.as_deref().filter(|f| !f.is_empty())
        else {
            return true;
        };

        let presented = ctx.header(secret_field);
        if presented.as_deref() != self.config.secret_value.as_deref() {
            log::debug!(
                "Received invalid value for secret header [{}], falling back.",
                secret_field
            );
            return false;
        }

        log::debug!("Secret validation succeeded.");
        true
    }
}

impl IdentityAdapter for HeaderIdentityAdapter {
    fn user_uid(&self, ctx: &RequestContext) -> Option<String> {
        if !self.secret_matches(ctx) {
            return None;
        }
        self.header(ctx, &self.config.auth_field)
    }

    fn user_name(&self, ctx: &RequestContext) -> Option<String> {
        self.header(ctx, self.config.id_field())
    }

    fn user_property(&self, ctx: &RequestContext, name: &str) -> Option<String> {
        self.header(ctx, name)
    }

    fn user_roles(&self, ctx: &RequestContext) -> Option<Vec<String>> {
        Some(collect_roles(
            &self.config.group_fields,
            &self.config.group_value_separator,
            |name| self.header(ctx, name),
        ))
    }

    fn logout_url(&self, location: Option<&str>) -> Option<String> {
        let template = self.config.logout_url.as_deref().filter(|u| !u.trim().is_empty())?;
        Some(render_logout_url(template, location))
    }

    fn name(&self) -> &str {
        "headers"
    }
}
