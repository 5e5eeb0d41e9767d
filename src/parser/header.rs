//! Transport header parsing (RFC 5322 §2.2), tolerant of malformed input.

use std::collections::HashMap;

use tracing::debug;

use crate::model::address::unfold;

/// Transport headers keyed by lowercase name.
///
/// Duplicate headers keep the last value. Values keep their original casing
/// and whitespace; folded values still contain their line breaks, which
/// dependent stages unfold as needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    inner: HashMap<String, String>,
}

impl HeaderMap {
    /// Look up a header by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(name)
            .or_else(|| self.inner.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Parse a raw transport header blob.
///
/// Never fails: malformed lines are skipped and whatever could be recovered
/// is returned. Parsing stops at the first blank line after a header has
/// been seen (the start of a body, if the blob carries one).
pub fn parse_transport_headers(raw: Option<&str>) -> HeaderMap {
    let mut inner: HashMap<String, String> = HashMap::new();
    let Some(raw) = raw else {
        return HeaderMap { inner };
    };

    let mut current: Option<String> = None;
    let mut skipped = 0usize;

    for raw_line in raw.split('\n') {
        let (line, line_break) = match raw_line.strip_suffix('\r') {
            Some(stripped) => (stripped, "\r\n"),
            None => (raw_line, "\n"),
        };

        if line.trim().is_empty() {
            if inner.is_empty() {
                continue;
            }
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation line
            match current.as_ref().and_then(|name| inner.get_mut(name)) {
                Some(value) => {
                    value.push_str(line_break);
                    value.push_str(line);
                }
                None => skipped += 1,
            }
            continue;
        }

        match split_field(line) {
            Some((name, value)) => {
                inner.insert(name.clone(), value.to_string());
                current = Some(name);
            }
            None => {
                skipped += 1;
                current = None;
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "Skipped malformed header lines");
    }

    HeaderMap { inner }
}

/// Split `Name: value` into a lowercase name and the value with leading whitespace removed.
///
/// Field names must be non-empty printable ASCII without spaces, which also
/// rejects mbox `From ` envelope lines and stray body text.
fn split_field(line: &str) -> Option<(String, &str)> {
    let colon_pos = line.find(':')?;
    let name = &line[..colon_pos];
    let name_ok = !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic());
    if !name_ok {
        return None;
    }
    let value = line[colon_pos + 1..].trim_start_matches([' ', '\t']);
    Some((name.to_ascii_lowercase(), value))
}

/// Split a `Content-Type` value into its lowercase MIME type and `charset` parameter.
///
/// `"text/plain; charset=\"UTF-8\""` → `(Some("text/plain"), Some("UTF-8"))`
pub fn parse_content_type(value: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(value) = value else {
        return (None, None);
    };
    let unfolded = unfold(value);
    let mut parts = unfolded.split(';');

    let mime = parts
        .next()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty());

    let charset = parts.find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let val = val.trim().trim_matches('"').trim();
            (!val.is_empty()).then(|| val.to_string())
        } else {
            None
        }
    });

    (mime, charset)
}
