//! Logout request detection

use anyhow::{Context, Result};
use regex::Regex;

use crate::request::RequestContext;

/// Matches the configured logout page pattern as a prefix of the request
/// path (servlet path + path info).
#[derive(Debug, Clone)]
pub struct RequestMatcher {
    pattern: Regex,
}

impl RequestMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(&format!("^(?:{pattern})"))
            .with_context(|| format!("invalid request pattern [{pattern}]"))?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, ctx: &RequestContext) -> bool {
        self.pattern.is_match(&ctx.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logout_page_pattern_matching() {
        let matcher = RequestMatcher::new("(/|/[^/]+/|/wiki/[^/]+/)logout/*").unwrap();

        let ctx = RequestContext::new().with_path("/bin", "/view/Main/");
        assert!(!matcher.matches(&ctx));

        let ctx = RequestContext::new().with_path("/bin", "/logout/Main/");
        assert!(matcher.matches(&ctx));

        let ctx = RequestContext::new().with_path("", "/logout/Main/");
        assert!(matcher.matches(&ctx));

        let ctx = RequestContext::new().with_path("/wiki", "/wikiname/logout/Main/");
        assert!(matcher.matches(&ctx));
    }

    #[test]
    fn test_pattern_is_anchored_at_the_start() {
        let matcher = RequestMatcher::new("/logout").unwrap();
        let ctx = RequestContext::new().with_path("/bin", "/logout");
        assert!(!matcher.matches(&ctx));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(RequestMatcher::new("([unclosed").is_err());
    }
}
