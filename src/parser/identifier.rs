//! Message identifier extraction for `Message-ID`, `In-Reply-To` and `References`.

use std::sync::OnceLock;

use regex::Regex;

/// `<id>` where `id` contains no whitespace and no nested brackets.
static ANGLE_ID_REGEX: OnceLock<Regex> = OnceLock::new();

fn angle_id_regex() -> &'static Regex {
    ANGLE_ID_REGEX.get_or_init(|| Regex::new(r"<([^<>\s]+)>").expect("valid identifier regex"))
}

/// Extract all angle-bracketed identifiers, in order of appearance, without brackets.
///
/// `"<a@x> <b@y>"` → `Some(["a@x", "b@y"])`. Absent input or no match → `None`.
pub fn extract_identifiers(raw: Option<&str>) -> Option<Vec<String>> {
    let ids: Vec<String> = angle_id_regex()
        .captures_iter(raw?)
        .map(|c| c[1].to_string())
        .collect();
    (!ids.is_empty()).then_some(ids)
}

/// Strip surrounding brackets and whitespace from a single identifier.
///
/// Used for header values that carry an identifier without brackets.
/// Returns `None` if nothing usable remains.
pub fn bare_identifier(raw: &str) -> Option<String> {
    let id = raw
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim();
    (!id.is_empty() && !id.contains(char::is_whitespace)).then(|| id.to_string())
}

/// Split an unbracketed `References` value on whitespace and commas.
pub fn bare_identifiers(raw: &str) -> Option<Vec<String>> {
    let ids: Vec<String> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(bare_identifier)
        .collect();
    (!ids.is_empty()).then_some(ids)
}
