//! Best-effort parsing of free-text dates.
//!
//! Quoted reply headers carry dates in whatever form the replying client
//! chose: RFC 2822 (`Mon, 1 Jan 2018 12:00:00 +0000`), Outlook
//! (`Wednesday, January 3, 2018 5:00 PM`), Gmail (`Mon, Jan 1, 2018 at 12:00 PM`),
//! Apple Mail (`Jan 1, 2018, at 12:00 PM`) and numeric variants. Dates without
//! an offset are taken as UTC.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Formats tried after the weekday has been stripped.
///
/// Slash dates are read month-first before day-first (Outlook's US default).
const FORMATS: [&str; 22] = [
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%d %b %Y %I:%M %p",
    "%b %d %H:%M:%S %Y",
    "%b %d, %Y %I:%M:%S %p",
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y, %I:%M %p",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Parse a date string in any of the common email formats.
///
/// Returns `None` when nothing matches; callers treat that as an absent
/// field, never as an error.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = collapse_whitespace(date_str.trim().trim_end_matches(','));
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(&trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // "Mon, Jan 1, 2018 at 12:00 PM" → "Jan 1, 2018 12:00 PM"
    let without_at = trimmed.replace(" at ", " ").replace(", at ", ", ");
    let no_dow = strip_day_of_week(&without_at).to_string();
    let imap_normalized = normalize_imap_date(&no_dow);

    for candidate in [&no_dow, &imap_normalized] {
        if let Some(dt) = try_formats(candidate) {
            return Some(dt);
        }
    }

    for candidate in [&no_dow, &imap_normalized] {
        let replaced = replace_named_tz(candidate);
        if let Some(dt) = try_formats(&replaced) {
            return Some(dt);
        }
    }

    if let Some(dt) = mail_parser_date(&trimmed) {
        return Some(dt);
    }

    debug!(date = %trimmed, "Could not parse date");
    None
}

fn try_formats(candidate: &str) -> Option<DateTime<Utc>> {
    for fmt in &FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    None
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip a leading weekday, full or abbreviated (`"Wednesday, "`, `"Thu "`).
fn strip_day_of_week(s: &str) -> &str {
    let word_end = s
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    if word_end == s.len() || word_end < 3 {
        return s;
    }
    let word = s[..word_end].to_ascii_lowercase();
    let is_day = WEEKDAYS
        .iter()
        .any(|day| *day == word || (word.len() == 3 && day.starts_with(&word)));
    if is_day {
        s[word_end..].trim_start_matches(',').trim_start()
    } else {
        s
    }
}

/// Normalize IMAP-style dates: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    if !s.contains('-') {
        return s.to_string();
    }

    let title_months = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    for month in &title_months {
        for variant in [month.to_uppercase(), month.to_lowercase(), month.to_string()] {
            let pattern = format!("-{variant}-");
            if s.contains(&pattern) {
                return s.replacen(&pattern, &format!(" {month} "), 1);
            }
        }
    }

    s.to_string()
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("AST", "+0300"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hm(dt: DateTime<Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M").to_string()
    }

    #[test]
    fn test_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(ymd_hm(dt), "2024-01-04 10:00");
    }

    #[test]
    fn test_gmail_attribution_date() {
        let dt = parse_date("Mon, Jan 1, 2018 at 12:00 PM").unwrap();
        assert_eq!(ymd_hm(dt), "2018-01-01 12:00");
    }

    #[test]
    fn test_outlook_sent_date() {
        let dt = parse_date("Wednesday, January 3, 2018 5:00 PM").unwrap();
        assert_eq!(ymd_hm(dt), "2018-01-03 17:00");
    }

    #[test]
    fn test_apple_mail_date() {
        let dt = parse_date("Jan 1, 2018, at 9:05 AM").unwrap();
        assert_eq!(ymd_hm(dt), "2018-01-01 09:05");
    }

    #[test]
    fn test_numeric_month_first() {
        let dt = parse_date("1/2/2018 10:00 AM").unwrap();
        assert_eq!(ymd_hm(dt), "2018-01-02 10:00");
    }

    #[test]
    fn test_named_timezone() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(ymd_hm(dt), "2024-01-04 15:00");
    }

    #[test]
    fn test_imap_style() {
        let dt = parse_date("16-JUL-2025 03:01:03").unwrap();
        assert_eq!(ymd_hm(dt), "2025-07-16 03:01");
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("sometime last week"), None);
    }

    #[test]
    fn test_strip_day_of_week() {
        assert_eq!(strip_day_of_week("Wednesday, January 3"), "January 3");
        assert_eq!(strip_day_of_week("Thu 04 Jan"), "04 Jan");
        assert_eq!(strip_day_of_week("January 3"), "January 3");
        assert_eq!(strip_day_of_week("Mon"), "Mon");
    }
}
