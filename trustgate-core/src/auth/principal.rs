//! Profile name normalization
//!
//! The asserted user name is folded and cleaned up into a canonical
//! profile name before any lookup or creation. Normalization is a pure
//! function and a fixed point on already-canonical names, which is what
//! makes the "unchanged since last request" fast path sound.

use crate::config::CaseStyle;
use crate::model::{DocRef, Principal};

/// Fold and clean up an asserted user name into a profile name.
pub fn normalize(name: &str, case_style: CaseStyle, replacements: &[(String, String)]) -> String {
    let mut result = match case_style {
        CaseStyle::Lowercase => name.to_lowercase(),
        CaseStyle::Uppercase => name.to_uppercase(),
        CaseStyle::Titlecase => titlecase(name),
        CaseStyle::None => name.to_string(),
    };

    for (from, to) in replacements {
        result = result.replace(from.as_str(), to.as_str());
    }

    result
}

/// Build the principal owning the profile for an asserted user name.
pub fn profile_for(
    name: &str,
    case_style: CaseStyle,
    replacements: &[(String, String)],
    user_space: &str,
) -> Principal {
    Principal::new(DocRef::new(
        user_space,
        normalize(name, case_style, replacements),
    ))
}

// First character uppercased, the whole remainder lowercased.
fn titlecase(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let rest = chars.as_str();
            if rest.is_empty() {
                first.to_uppercase().collect()
            } else {
                format!("{}{}", first.to_uppercase(), rest.to_lowercase())
            }
        }
    }
}
