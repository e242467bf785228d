//! Attribute-based identity adapter
//!
//! Reads identity facts from server-assigned request attributes, as set
//! by an in-process SSO filter (SAML, Kerberos, container auth). No
//! shared-secret check is needed: attributes cannot be forged by the
//! client, unlike the relatively less secure HTTP headers.

use super::{collect_roles, recode_field, render_logout_url, IdentityAdapter};
use crate::config::AdapterConfig;
use crate::request::RequestContext;

/// Identity adapter reading request attributes.
pub struct AttributeIdentityAdapter {
    config: AdapterConfig,
}

impl AttributeIdentityAdapter {
    /// Create an adapter with the given settings
    pub fn new(config: AdapterConfig) -> Self {
        Self { config }
    }

    fn attribute(&self, ctx: &RequestContext, name: &str) -> Option<String> {
        if name.trim().is_empty() {
            return None;
        }
        let value = ctx.attribute(name)?.to_string();
        if value.trim().is_empty() {
            return Some(value);
        }
        Some(recode_field(name, value, self.config.encoding.as_deref()))
    }
}

impl IdentityAdapter for AttributeIdentityAdapter {
    fn user_uid(&self, ctx: &RequestContext) -> Option<String> {
        self.attribute(ctx, &self.config.auth_field)
    }

    fn user_name(&self, ctx: &RequestContext) -> Option<String> {
        self.attribute(ctx, self.config.id_field())
    }

    fn user_property(&self, ctx: &RequestContext, name: &str) -> Option<String> {
        self.attribute(ctx, name)
    }

    fn user_roles(&self, ctx: &RequestContext) -> Option<Vec<String>> {
        Some(collect_roles(
            &self.config.group_fields,
            &self.config.group_value_separator,
            |name| self.attribute(ctx, name),
        ))
    }

    fn logout_url(&self, location: Option<&str>) -> Option<String> {
        let template = self.config.logout_url.as_deref().filter(|u| !u.trim().is_empty())?;
        Some(render_logout_url(template, location))
    }

    fn name(&self) -> &str {
        "attributes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_and_properties_from_attributes() {
        let ctx = RequestContext::new()
            .with_attribute("remote_user", "jdoe")
            .with_attribute("mail", "jdoe@example.com");

        let a = AttributeIdentityAdapter::new(AdapterConfig::default());
        assert_eq!(a.user_uid(&ctx), Some("jdoe".to_string()));
        assert_eq!(a.user_property(&ctx, "mail"), Some("jdoe@example.com".to_string()));
        assert_eq!(a.user_property(&ctx, "missing"), None);
    }

    #[test]
    fn test_roles_from_attribute_with_custom_separator() {
        let config = AdapterConfig {
            group_fields: vec!["memberOf".to_string()],
            group_value_separator: ",".to_string(),
            ..Default::default()
        };
        let ctx = RequestContext::new().with_attribute("memberOf", "dev,ops,dev");

        let roles = AttributeIdentityAdapter::new(config).user_roles(&ctx).unwrap();
        assert_eq!(roles, vec!["dev", "ops"]);
    }
}
