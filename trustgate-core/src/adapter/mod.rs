//! Identity adapters
//!
//! An adapter extracts the externally-asserted identity from the request:
//! unique id, display name, arbitrary properties and role claims. Two
//! interchangeable implementations exist, one reading trusted HTTP
//! headers, one reading server-assigned request attributes. The engine is
//! polymorphic over the [`IdentityAdapter`] capability.

mod attributes;
mod headers;

pub use attributes::AttributeIdentityAdapter;
pub use headers::HeaderIdentityAdapter;

use crate::request::RequestContext;

/// Placeholder substituted with the URL-encoded return location in the
/// logout URL template.
const LOGOUT_URL_REDIRECTION_PLACEHOLDER: &str = "__REDIRECT__";

/// Capability contract of a trusted identity source.
pub trait IdentityAdapter: Send + Sync {
    /// Unique id of the connected user; `None` or blank means no
    /// identity was asserted
    fn user_uid(&self, ctx: &RequestContext) -> Option<String>;

    /// Display name of the connected user
    fn user_name(&self, ctx: &RequestContext) -> Option<String>;

    /// Arbitrary named property of the connected user
    fn user_property(&self, ctx: &RequestContext, name: &str) -> Option<String>;

    /// Whether the connected user holds the given role claim
    fn is_user_in_role(&self, ctx: &RequestContext, role: &str) -> bool {
        self.user_roles(ctx)
            .map_or(false, |roles| roles.iter().any(|r| r == role))
    }

    /// All role claims of the connected user.
    ///
    /// `None` signals a retrieval failure, distinct from an empty list.
    fn user_roles(&self, ctx: &RequestContext) -> Option<Vec<String>>;

    /// External logout URL; `None` means no external logout exists.
    ///
    /// When a return location is given, it is URL-encoded and substituted
    /// into the configured template.
    fn logout_url(&self, location: Option<&str>) -> Option<String>;

    /// Adapter name for logging
    fn name(&self) -> &str;
}

/// Substitute the redirect placeholder in a logout URL template.
pub(crate) fn render_logout_url(template: &str, location: Option<&str>) -> String {
    match location {
        Some(location) => template.replace(
            LOGOUT_URL_REDIRECTION_PLACEHOLDER,
            &urlencoding::encode(location),
        ),
        None => template.to_string(),
    }
}

/// Reinterpret a raw Latin-1 field value using the configured charset.
///
/// Upstream proxies commonly send UTF-8 bytes that the transport layer
/// surfaces as Latin-1. Unsupported charsets and undecodable values fall
/// back to the raw value.
pub(crate) fn recode_field(field: &str, value: String, encoding: Option<&str>) -> String {
    let Some(encoding) = encoding.filter(|e| !e.trim().is_empty()) else {
        return value;
    };

    if !encoding.eq_ignore_ascii_case("utf-8") && !encoding.eq_ignore_ascii_case("utf8") {
        log::debug!("Unsupported charset [{}] requested for decoding field [{}].", encoding, field);
        return value;
    }

    let raw_bytes: Vec<u8> = value.chars().map(|c| c as u8).collect();
    match String::from_utf8(raw_bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            log::debug!("Failed to decode field [{}] using charset [{}]: {}", field, encoding, e);
            value
        }
    }
}

/// Split the values of every configured group field into de-duplicated
/// role claims.
pub(crate) fn collect_roles<F>(group_fields: &[String], separator: &str, fetch: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut claims = std::collections::BTreeSet::new();

    for field in group_fields {
        if let Some(value) = fetch(field) {
            if value.trim().is_empty() {
                continue;
            }
            for claim in value.split(separator) {
                if !claim.is_empty() {
                    claims.insert(claim.to_string());
                }
            }
        }
    }

    claims.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_logout_url() {
        let template = "https://sso.example.com/logout?back=__REDIRECT__";
        assert_eq!(
            render_logout_url(template, Some("https://wiki.example.com/bin/view/Main/")),
            "https://sso.example.com/logout?back=https%3A%2F%2Fwiki.example.com%2Fbin%2Fview%2FMain%2F"
        );
        assert_eq!(render_logout_url(template, None), template);
    }

    #[test]
    fn test_recode_utf8_round_trip() {
        // "é" as UTF-8 bytes surfaced as two Latin-1 chars
        let raw: String = [0xC3u8, 0xA9].iter().map(|b| *b as char).collect();
        assert_eq!(recode_field("x", raw, Some("utf-8")), "é");
    }

    #[test]
    fn test_recode_falls_back_on_bad_bytes() {
        let raw: String = [0xC3u8].iter().map(|b| *b as char).collect();
        assert_eq!(recode_field("x", raw.clone(), Some("utf-8")), raw);
    }

    #[test]
    fn test_recode_unknown_charset_keeps_raw() {
        assert_eq!(recode_field("x", "abc".to_string(), Some("koi8-r")), "abc");
        assert_eq!(recode_field("x", "abc".to_string(), None), "abc");
    }

    #[test]
    fn test_collect_roles_dedup() {
        let fields = vec!["groups".to_string(), "extra".to_string()];
        let roles = collect_roles(&fields, "|", |name| match name {
            "groups" => Some("a|b|a".to_string()),
            "extra" => Some("b|c|".to_string()),
            _ => None,
        });
        assert_eq!(roles, vec!["a", "b", "c"]);
    }
}
