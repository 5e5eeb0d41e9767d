//! Email address parsing, normalization and syntax validation (RFC 5322 §3.4, RFC 5321 §4.1.2).

use serde::{Deserialize, Serialize};

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single email address from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    /// - `"user@domain.com (Display Name)"`
    ///
    /// Parenthesized comments are removed. If parsing fails, the raw string
    /// is stored as `address`.
    pub fn parse(raw: &str) -> Self {
        let stripped = strip_comments(raw);
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            return Self {
                display_name: String::new(),
                address: String::new(),
            };
        }

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let addr = trimmed[angle_start + 1..angle_end].trim().to_string();
                    let display_name = strip_quotes(&trimmed[..angle_start]);
                    return Self {
                        display_name,
                        address: addr,
                    };
                }
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Parse a list of addresses separated by `,` or `;`.
    ///
    /// Separators inside double quotes, angle brackets or comments are not
    /// split on: `"Last, First" <a@b.com>; other@c.com` yields two entries.
    /// A group label (`Team: a@b.com, c@d.com;`) is skipped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;
        let mut comment_depth = 0usize;

        for ch in raw.chars() {
            match ch {
                '(' if !in_quotes => {
                    comment_depth += 1;
                    current.push(ch);
                }
                ')' if !in_quotes && comment_depth > 0 => {
                    comment_depth -= 1;
                    current.push(ch);
                }
                _ if comment_depth > 0 => current.push(ch),
                ':' if !in_quotes && !in_angle && !current.contains('@') => current.clear(),
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' | ';' if !in_quotes && !in_angle => {
                    let addr = Self::parse(&current);
                    if !addr.address.is_empty() {
                        results.push(addr);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        let addr = Self::parse(&current);
        if !addr.address.is_empty() {
            results.push(addr);
        }

        results
    }

}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Remove RFC 5322 comments (`(...)`, possibly nested) outside quoted strings.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_quotes = false;
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(ch);
            }
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes && depth > 0 => depth -= 1,
            _ if depth > 0 => {}
            _ => out.push(ch),
        }
    }
    out
}

/// A non-empty recipient field: one address or several.
///
/// An empty recipient field is represented by `Option::None` at the use site,
/// never by an empty `Many`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipients {
    Single(String),
    Many(Vec<String>),
}

impl Recipients {
    /// Build from a list of addresses. Returns `None` for an empty list.
    pub fn from_vec(mut addresses: Vec<String>) -> Option<Self> {
        match addresses.len() {
            0 => None,
            1 => addresses.pop().map(Self::Single),
            _ => Some(Self::Many(addresses)),
        }
    }

    /// All addresses as a slice.
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(addr) => std::slice::from_ref(addr),
            Self::Many(addrs) => addrs,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.as_slice().iter()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Render back to a header value (`"a@x.com, b@y.com"`).
    pub fn to_header_value(&self) -> String {
        self.as_slice().join(", ")
    }
}

impl std::fmt::Display for Recipients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// Normalize a raw address header value into canonical lowercase addresses.
///
/// Returns `None` if the value is absent, contains no `@`, or no entry
/// survives parsing. Entries with an empty address are discarded, as are
/// bare display-name fragments without an `@` (the `Doe` of an unquoted
/// `Doe, Jane <jane@x.com>`). Never fails.
///
/// Applying the function to the rendered output of a previous call is a no-op.
pub fn normalize_addresses(raw: Option<&str>) -> Option<Recipients> {
    let raw = raw?;
    if !raw.contains('@') {
        return None;
    }

    let unfolded = unfold(raw).to_lowercase();
    let addresses: Vec<String> = EmailAddress::parse_list(&unfolded)
        .into_iter()
        .map(|a| a.address)
        .filter(|a| !a.is_empty() && a.contains('@'))
        .collect();

    Recipients::from_vec(addresses)
}

/// Collapse header folding (line break followed by whitespace) into a single space.
pub fn unfold(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, line) in value.lines().enumerate() {
        if i == 0 {
            out.push_str(line);
        } else {
            out.push(' ');
            out.push_str(line.trim_start());
        }
    }
    out
}

/// Maximum length of a forward path (RFC 5321 §4.5.3.1.3, minus the brackets).
const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;
const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Pragmatic syntax check for a bare address.
///
/// Accepts dot-atom and quoted local parts, hostname domains with at least
/// two labels, and address literals (`user@[192.0.2.1]`). Non-ASCII
/// characters are allowed in both parts (RFC 6531).
pub fn is_valid_address(addr: &str) -> bool {
    if addr.is_empty() || addr.len() > MAX_ADDRESS_LEN {
        return false;
    }
    let Some((local, domain)) = addr.rsplit_once('@') else {
        return false;
    };
    is_valid_local_part(local) && is_valid_domain(domain)
}

fn is_valid_local_part(local: &str) -> bool {
    if local.is_empty() || local.len() > MAX_LOCAL_LEN {
        return false;
    }

    if local.len() >= 2 && local.starts_with('"') && local.ends_with('"') {
        let inner = &local[1..local.len() - 1];
        return inner
            .chars()
            .all(|c| c != '"' && c != '\\' && (c == ' ' || c.is_ascii_graphic() || !c.is_ascii()));
    }

    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    local.chars().all(is_atext_or_dot)
}

fn is_atext_or_dot(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~.".contains(c) || !c.is_ascii()
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
        return false;
    }

    if let Some(literal) = domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        let literal = literal
            .strip_prefix("IPv6:")
            .or_else(|| literal.strip_prefix("ipv6:"))
            .unwrap_or(literal);
        return literal.parse::<std::net::IpAddr>().is_ok();
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || !c.is_ascii())
    });
    let tld_ok = labels
        .last()
        .is_some_and(|tld| !tld.chars().all(|c| c.is_ascii_digit()));

    labels_ok && tld_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <user1@example.com>");
        assert_eq!(addr.address, "user1@example.com");
        assert_eq!(addr.display_name, "User One");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = EmailAddress::parse("\"Last, First\" <user@example.com>");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "Last, First");
    }

    #[test]
    fn test_parse_list_with_semicolons() {
        let list = EmailAddress::parse_list("User One <a@b.com>; User Two <c@d.com>, plain@addr.com");
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].address, "a@b.com");
        assert_eq!(list[1].display_name, "User Two");
        assert_eq!(list[2].address, "plain@addr.com");
    }

    #[test]
    fn test_parse_list_with_quoted_separator() {
        let list = EmailAddress::parse_list("\"Last; First\" <a@b.com>, other@c.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name, "Last; First");
    }

    #[test]
    fn test_normalize_single_display_address() {
        assert_eq!(
            normalize_addresses(Some(" John Doe <JOHN@X.COM> ")),
            Some(Recipients::Single("john@x.com".to_string()))
        );
    }

    #[test]
    fn test_normalize_absent_or_without_at() {
        assert_eq!(normalize_addresses(None), None);
        assert_eq!(normalize_addresses(Some("undisclosed-recipients:;")), None);
        assert_eq!(normalize_addresses(Some("")), None);
    }

    #[test]
    fn test_normalize_multiple_with_folding() {
        let raw = "Alice <Alice@Example.com>,\r\n\tBob <bob@example.org>; carol@example.net";
        assert_eq!(
            normalize_addresses(Some(raw)),
            Some(Recipients::Many(vec![
                "alice@example.com".to_string(),
                "bob@example.org".to_string(),
                "carol@example.net".to_string(),
            ]))
        );
    }

    #[test]
    fn test_normalize_drops_unquoted_name_fragment() {
        assert_eq!(
            normalize_addresses(Some("Doe, Jane <Jane.Doe@x.com>")),
            Some(Recipients::Single("jane.doe@x.com".to_string()))
        );
    }

    #[test]
    fn test_normalize_group_syntax() {
        assert_eq!(
            normalize_addresses(Some("Team: a@x.com, B <b@y.com>;")),
            Some(Recipients::Many(vec!["a@x.com".to_string(), "b@y.com".to_string()]))
        );
        assert_eq!(
            normalize_addresses(Some("Team: a@x.com;, Other: ;")),
            Some(Recipients::Single("a@x.com".to_string()))
        );
    }

    #[test]
    fn test_normalize_strips_comments() {
        assert_eq!(
            normalize_addresses(Some("jdoe@example.com (John Doe)")),
            Some(Recipients::Single("jdoe@example.com".to_string()))
        );
        assert_eq!(
            normalize_addresses(Some("a@x.com (Doe, John), b@y.com")),
            Some(Recipients::Many(vec!["a@x.com".to_string(), "b@y.com".to_string()]))
        );
    }

    #[test]
    fn test_parse_keeps_parentheses_in_quoted_name() {
        let addr = EmailAddress::parse("\"Doe (work)\" <jd@x.com> (office)");
        assert_eq!(addr.address, "jd@x.com");
        assert_eq!(addr.display_name, "Doe (work)");
    }

    #[test]
    fn test_normalize_all_entries_invalid() {
        assert_eq!(normalize_addresses(Some("<>, \"a@b\" <>")), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            " John Doe <JOHN@X.COM> ",
            "a@x.com, \"B, Person\" <B@Y.COM>; c@z.org",
            "Solo <solo@example.com>",
        ];
        for input in inputs {
            let once = normalize_addresses(Some(input)).unwrap();
            let twice = normalize_addresses(Some(&once.to_header_value())).unwrap();
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_recipients_from_vec() {
        assert_eq!(Recipients::from_vec(Vec::new()), None);
        let single = Recipients::from_vec(vec!["a@b.com".to_string()]).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.to_header_value(), "a@b.com");
    }

    #[test]
    fn test_valid_addresses() {
        for addr in [
            "john@x.com",
            "first.last+tag@sub.example.co.uk",
            "\"john doe\"@example.com",
            "user@[192.0.2.1]",
            "user@[IPv6:2001:db8::1]",
            "josé@correo.es",
        ] {
            assert!(is_valid_address(addr), "{addr} should be valid");
        }
    }

    #[test]
    fn test_invalid_addresses() {
        for addr in [
            "",
            "plainaddress",
            "@example.com",
            "user@",
            "user@localhost",
            "user@-bad.com",
            ".user@example.com",
            "us..er@example.com",
            "user name@example.com",
            "user@example.123",
            "user@[999.1.1.1]",
        ] {
            assert!(!is_valid_address(addr), "{addr} should be invalid");
        }
    }

    #[test]
    fn test_unfold() {
        assert_eq!(unfold("a@b.com,\r\n  c@d.com"), "a@b.com, c@d.com");
        assert_eq!(unfold("no folding"), "no folding");
    }
}
