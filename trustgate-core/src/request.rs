//! Per-request snapshot consumed by adapters and persistence stores
//!
//! The upstream HTTP stack hands the engine one `RequestContext` per
//! request: incoming headers, server-assigned attributes, cookies and the
//! session key-value bag, plus the queue of outgoing `Set-Cookie` headers
//! the persistence stores produce.

use chrono::{DateTime, Utc};
use http::HeaderMap;
use std::collections::HashMap;

/// Outgoing cookie queued on the response.
#[derive(Debug, Clone)]
pub struct SetCookie {
    /// Cookie name
    pub name: String,

    /// Cookie value (empty for deletions)
    pub value: String,

    /// Cookie path
    pub path: String,

    /// Cookie domain, when a configured domain suffix matched the request
    pub domain: Option<String>,

    /// Max age in seconds; `Some(0)` deletes, `None` makes a session cookie
    pub max_age: Option<i64>,

    /// Expiry timestamp, for clients that ignore `Max-Age`
    pub expires: Option<DateTime<Utc>>,

    /// Secure flag, mirroring the request's TLS state
    pub secure: bool,

    /// HttpOnly flag (no JavaScript access)
    pub http_only: bool,
}

impl SetCookie {
    /// Build the `Set-Cookie` header value
    pub fn header_value(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];

        if let Some(ref domain) = self.domain {
            parts.push(format!("Domain={}", domain));
        }

        parts.push(format!("Path={}", self.path));

        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age));
        }

        if let Some(expires) = self.expires {
            parts.push(format!("Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT")));
        }

        if self.secure {
            parts.push("Secure".to_string());
        }

        if self.http_only {
            parts.push("HttpOnly".to_string());
        }

        parts.join("; ")
    }
}

/// Snapshot of one incoming request plus the response-side state the
/// engine is allowed to touch.
#[derive(Debug, Default)]
pub struct RequestContext {
    headers: HeaderMap,
    attributes: HashMap<String, String>,
    cookies: HashMap<String, String>,
    session: HashMap<String, String>,
    servlet_path: String,
    path_info: String,
    server_name: String,
    secure: bool,
    outgoing_cookies: Vec<SetCookie>,
    external_logout: Option<String>,
}

impl RequestContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a request header (builder style, mostly for tests)
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.parse::<http::header::HeaderName>(),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Remove a request header (builder style), keeping session state
    pub fn without_header(mut self, name: &str) -> Self {
        if let Ok(name) = name.parse::<http::header::HeaderName>() {
            self.headers.remove(name);
        }
        self
    }

    /// Set a request attribute (builder style)
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set an incoming cookie (builder style)
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Set the request path split as servlet path + path info
    pub fn with_path(mut self, servlet_path: impl Into<String>, path_info: impl Into<String>) -> Self {
        self.servlet_path = servlet_path.into();
        self.path_info = path_info.into();
        self
    }

    /// Set the server name the request was addressed to
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }

    /// Mark the request as arriving over TLS
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Raw header value, decoded byte-per-byte as Latin-1.
    ///
    /// Header values are not guaranteed to be valid UTF-8; adapters apply
    /// any configured charset reinterpretation on top of this.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .map(|v| v.as_bytes().iter().map(|b| *b as char).collect())
    }

    /// Request attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Incoming cookie value
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Full request path (servlet path + path info)
    pub fn path(&self) -> String {
        format!("{}{}", self.servlet_path, self.path_info)
    }

    /// Server name the request was addressed to
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Whether the request arrived over TLS
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Read a value from the session bag
    pub fn session_get(&self, key: &str) -> Option<&str> {
        self.session.get(key).map(String::as_str)
    }

    /// Write a value to the session bag
    pub fn session_set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.session.insert(key.into(), value.into());
    }

    /// Remove a value from the session bag
    pub fn session_remove(&mut self, key: &str) -> Option<String> {
        self.session.remove(key)
    }

    /// Queue an outgoing cookie on the response
    pub fn add_cookie(&mut self, cookie: SetCookie) {
        self.outgoing_cookies.push(cookie);
    }

    /// Cookies queued on the response so far
    pub fn outgoing_cookies(&self) -> &[SetCookie] {
        &self.outgoing_cookies
    }

    /// Ask the response layer to rewrite redirects through the given
    /// external logout URL once the platform logout completes
    pub fn request_logout_redirect(&mut self, url: impl Into<String>) {
        self.external_logout = Some(url.into());
    }

    /// External logout URL requested for this response, if any
    pub fn external_logout(&self) -> Option<&str> {
        self.external_logout.as_deref()
    }
}
