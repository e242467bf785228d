//! Field provenance recording
//!
//! When a dynamic role rule auto-creates a group, an application page can
//! keep track of which role produced which group. Entries are appended to
//! an object property as `separator + rendered_template`, and only when no
//! existing entry already covers the group/role pair.

use std::collections::{BTreeSet, HashMap};

use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::config::ProvenanceSettings;
use crate::model::DocRef;
use crate::pages::PageStore;

const DEFAULT_SEPARATOR: &str = "|";
const DEFAULT_VALUE_REGEX: &str = r"^(?<group>[^=]+)=[\s\S]*";
const DEFAULT_VALUE_FORMAT: &str = "{group.fullName}={role}";

/// Resolved field-provenance configuration with compiled entry regex.
#[derive(Debug, Clone)]
pub struct FieldProvenanceConfig {
    page: String,
    class_name: String,
    object_number: Option<u32>,
    property_name: String,
    separator: String,
    value_regex: Regex,
    value_format: String,
}

impl FieldProvenanceConfig {
    /// Resolve raw settings into a usable configuration.
    ///
    /// Returns `Ok(None)` when both the page and the property are empty,
    /// meaning provenance recording is simply not configured. An invalid
    /// entry regex or a malformed value template is an error; callers
    /// treat it as fatal for the rule set it belongs to.
    pub fn parse(settings: &ProvenanceSettings) -> Result<Option<FieldProvenanceConfig>> {
        let page = settings.page.clone().unwrap_or_default();
        let property_name = settings.property_name.clone().unwrap_or_default();
        if page.is_empty() && property_name.is_empty() {
            return Ok(None);
        }

        let value_regex = settings
            .value_regex
            .clone()
            .unwrap_or_else(|| DEFAULT_VALUE_REGEX.to_string());
        let value_regex = Regex::new(&value_regex)
            .with_context(|| format!("invalid provenance value regex [{value_regex}]"))?;

        let config = FieldProvenanceConfig {
            page,
            class_name: settings.class_name.clone().unwrap_or_default(),
            object_number: settings.object_number,
            property_name,
            separator: settings
                .separator
                .clone()
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            value_regex,
            value_format: settings
                .value_format
                .clone()
                .unwrap_or_else(|| DEFAULT_VALUE_FORMAT.to_string()),
        };

        // Probe the template once so malformed formats are rejected at
        // load time rather than on every authentication.
        let probe = DocRef::new("Probe", "Probe");
        if config.render(&probe, "").is_none() {
            bail!(
                "invalid provenance value format [{}]",
                config.value_format
            );
        }

        Ok(Some(config))
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// Render the entry template for a group/role pair.
    ///
    /// Placeholders are `{group.name}`, `{group.fullName}`, `{group}` and
    /// `{role}`; a backslash escapes the next character. An unmatched `{`
    /// or an unknown placeholder yields `None` and an error log.
    pub fn render(&self, group: &DocRef, role: &str) -> Option<String> {
        let mut value = String::new();
        let mut chars = self.value_format.char_indices();

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                }
                '{' => {
                    let Some(end) = self.value_format[i..].find('}').map(|o| i + o) else {
                        log::error!(
                            "Value format [{}] has an unmatched '{{'. Escape it or add the missing brace.",
                            self.value_format
                        );
                        return None;
                    };
                    match &self.value_format[i + 1..end] {
                        "group.name" => value.push_str(group.name()),
                        "group.fullName" => value.push_str(&group.local()),
                        "group" => value.push_str(&group.serialize()),
                        "role" => value.push_str(role),
                        unknown => {
                            log::error!(
                                "Value format [{}] has an unknown placeholder [{}]. \
                                 Fix it or escape the opening brace right before.",
                                self.value_format,
                                unknown
                            );
                            return None;
                        }
                    }
                    // Consume up to the closing brace
                    while let Some((j, _)) = chars.next() {
                        if j == end {
                            break;
                        }
                    }
                }
                _ => value.push(c),
            }
        }

        Some(value)
    }

    /// Whether an existing property value already records this pair.
    ///
    /// Each entry is probed with the value regex; a named capture `group`
    /// must equal the group's name or be a suffix of its full
    /// serialization, a named capture `role` must equal the role. An
    /// absent named capture passes by absence of constraint.
    pub fn is_present(&self, values: &str, group: &DocRef, role: &str) -> bool {
        let serialized = group.serialize();
        for entry in values.split(self.separator.as_str()) {
            let Some(captures) = self.value_regex.captures(entry) else {
                continue;
            };
            // full-entry match only
            if captures.get(0).map_or(true, |m| m.as_str() != entry) {
                continue;
            }

            if let Some(matched) = captures.name("group") {
                let matched = matched.as_str();
                if matched != group.name() && !serialized.ends_with(matched) {
                    continue;
                }
            }
            if let Some(matched) = captures.name("role") {
                if matched.as_str() != role {
                    continue;
                }
            }

            log::debug!(
                "Group [{}] / role [{}] is already in property [{}] of [{}]. Matching value: [{}]",
                serialized,
                role,
                self.property_name,
                self.page,
                entry
            );
            return true;
        }
        false
    }
}

/// Batches provenance writes for one authentication: each affected page is
/// loaded once and saved once, no matter how many entries it receives.
pub struct ProvenanceRecorder<'a> {
    pages: &'a mut dyn PageStore,
    main_wiki: &'a str,
    // qualified page -> property values read or written so far
    values: HashMap<(String, String), String>,
    dirty: BTreeSet<String>,
}

impl<'a> ProvenanceRecorder<'a> {
    pub fn new(pages: &'a mut dyn PageStore, main_wiki: &'a str) -> Self {
        Self {
            pages,
            main_wiki,
            values: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Append an entry for a group/role pair, unless already recorded.
    /// Failures are logged and skipped; they never fail the authentication.
    pub fn record(&mut self, config: &FieldProvenanceConfig, group: &DocRef, role: &str) {
        let page = self.qualify(config.page());
        let key = (page.clone(), config.property_name().to_string());

        let current = match self.values.get(&key) {
            Some(value) => value.clone(),
            None => {
                match self.pages.field_value(
                    &page,
                    &config.class_name,
                    config.object_number,
                    config.property_name(),
                ) {
                    Ok(Some(value)) => value,
                    Ok(None) => {
                        log::error!(
                            "Could not find any object matching configuration [{:?}]. The field won't be updated.",
                            config
                        );
                        return;
                    }
                    Err(err) => {
                        log::error!(
                            "Failed to read page [{}] for provenance recording: {:#}",
                            page,
                            err
                        );
                        return;
                    }
                }
            }
        };

        if config.is_present(&current, group, role) {
            self.values.insert(key, current);
            return;
        }

        let Some(rendered) = config.render(group, role) else {
            return;
        };
        let updated = format!("{}{}{}", current, config.separator, rendered);

        if let Err(err) = self.pages.set_field_value(
            &page,
            &config.class_name,
            config.object_number,
            config.property_name(),
            &updated,
        ) {
            log::error!(
                "Could not update property [{}] of page [{}]: {:#}",
                config.property_name(),
                page,
                err
            );
            return;
        }
        self.values.insert(key, updated);
        self.dirty.insert(page);
    }

    /// Save every page touched since construction, once each.
    pub fn flush(self) {
        for page in &self.dirty {
            if let Err(err) = self
                .pages
                .save(page, "Add a new role/group from the trusted authenticator")
            {
                log::error!("Could not update the group/role field of page [{}]: {:#}", page, err);
            }
        }
    }

    fn qualify(&self, page: &str) -> String {
        if page.contains(':') {
            page.to_string()
        } else {
            format!("{}:{}", self.main_wiki, page)
        }
    }
}
