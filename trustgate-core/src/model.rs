//! References to user and group documents in the backing content store

use std::fmt;

/// Reference to a document (user profile or group) in the content store.
///
/// Serialized forms follow the platform conventions: the local form is
/// `Space.Name`, the full form is `wiki:Space.Name` when a wiki qualifier
/// is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocRef {
    wiki: Option<String>,
    space: String,
    name: String,
}

impl DocRef {
    /// Create a reference without a wiki qualifier
    pub fn new(space: impl Into<String>, name: impl Into<String>) -> Self {
        Self { wiki: None, space: space.into(), name: name.into() }
    }

    /// Create a wiki-qualified reference
    pub fn with_wiki(
        wiki: impl Into<String>,
        space: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self { wiki: Some(wiki.into()), space: space.into(), name: name.into() }
    }

    /// Parse a serialized reference.
    ///
    /// Accepts `wiki:Space.Name`, `Space.Name` and a bare `Name` (resolved
    /// against `default_space`).
    pub fn parse(raw: &str, default_space: &str) -> Self {
        let (wiki, rest) = match raw.split_once(':') {
            Some((w, rest)) if !w.is_empty() => (Some(w.to_string()), rest),
            _ => (None, raw),
        };

        match rest.rsplit_once('.') {
            Some((space, name)) if !space.is_empty() => {
                Self { wiki, space: space.to_string(), name: name.to_string() }
            }
            _ => Self { wiki, space: default_space.to_string(), name: rest.to_string() },
        }
    }

    /// Document name (last reference segment)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Space holding the document
    pub fn space(&self) -> &str {
        &self.space
    }

    /// Wiki qualifier, if any
    pub fn wiki(&self) -> Option<&str> {
        self.wiki.as_deref()
    }

    /// Replace the document name, keeping wiki and space
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self { wiki: self.wiki.clone(), space: self.space.clone(), name: name.into() }
    }

    /// Local serialization: `Space.Name`
    pub fn local(&self) -> String {
        format!("{}.{}", self.space, self.name)
    }

    /// Full serialization: `wiki:Space.Name`, or the local form when no
    /// wiki qualifier is set
    pub fn serialize(&self) -> String {
        match &self.wiki {
            Some(wiki) => format!("{}:{}.{}", wiki, self.space, self.name),
            None => self.local(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Canonical local identifier of an authenticated user profile.
///
/// A pure function of the adapter-asserted name and the configured
/// normalization policy; the serialized form is what persistence stores
/// cache between requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(DocRef);

impl Principal {
    /// Wrap a resolved user profile reference
    pub fn new(profile: DocRef) -> Self {
        Self(profile)
    }

    /// Parse a previously serialized principal
    pub fn parse(raw: &str, default_space: &str) -> Self {
        Self(DocRef::parse(raw, default_space))
    }

    /// The underlying profile reference
    pub fn doc_ref(&self) -> &DocRef {
        &self.0
    }

    /// The profile name without space or wiki qualifiers
    pub fn local_name(&self) -> &str {
        self.0.name()
    }

    /// Serialized form, suitable for persistence-store caching
    pub fn serialize(&self) -> String {
        self.0.serialize()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.serialize())
    }
}

/// Group membership changes computed for one authentication.
///
/// Computed fresh every request and handed to the directory as one sync
/// operation; never persisted. The add and remove sides stay disjoint:
/// whichever side claims a group first wins, so the static mapping pass
/// (which runs first) takes precedence over dynamic derivations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDelta {
    add: std::collections::BTreeSet<DocRef>,
    add_with_autocreate: std::collections::BTreeSet<DocRef>,
    remove: std::collections::BTreeSet<DocRef>,
}

impl GroupDelta {
    /// Empty delta
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a group the user should be in (no auto-creation)
    pub fn add(&mut self, group: DocRef) {
        if !self.remove.contains(&group) {
            self.add.insert(group);
        }
    }

    /// Mark a group the user should be in, creating it when missing
    pub fn add_with_autocreate(&mut self, group: DocRef) {
        if !self.remove.contains(&group) {
            self.add_with_autocreate.insert(group);
        }
    }

    /// Mark a group the user should not be in
    pub fn remove(&mut self, group: DocRef) {
        if !self.add.contains(&group) && !self.add_with_autocreate.contains(&group) {
            self.remove.insert(group);
        }
    }

    /// Groups to add without auto-creation
    pub fn to_add(&self) -> impl Iterator<Item = &DocRef> {
        self.add.iter()
    }

    /// Groups to add, auto-created when missing
    pub fn to_add_with_autocreate(&self) -> impl Iterator<Item = &DocRef> {
        self.add_with_autocreate.iter()
    }

    /// Groups to remove
    pub fn to_remove(&self) -> impl Iterator<Item = &DocRef> {
        self.remove.iter()
    }

    /// Whether a group is already claimed by either add side
    pub fn is_added(&self, group: &DocRef) -> bool {
        self.add.contains(group) || self.add_with_autocreate.contains(group)
    }

    /// Whether the delta carries no changes at all
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.add_with_autocreate.is_empty() && self.remove.is_empty()
    }
}
