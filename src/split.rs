//! Recovers quoted ancestor messages from a reply body.
//!
//! The body is read as a top-level reply followed by zero or more
//! (quote header, quote body) pairs. Two header styles are recognized:
//!
//! ```text
//! From: Jane Doe <jane@x.com>            On Mon, Jan 1, 2018 at 12:00 PM,
//! Sent: Monday, January 1, 2018 12:00    Jane <jane@x.com> wrote:
//! To: Bob <bob@x.com>
//! Subject: Budget
//! ```
//!
//! Boundary detection is a heuristic and lossy: a quote header written in
//! an unrecognized style stays inside the preceding segment.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::model::address::EmailAddress;
use crate::model::message::SubMessage;
use crate::parser::date::parse_date;

static QUOTE_MARKER_REGEX: OnceLock<Regex> = OnceLock::new();
static BLOCK_HEADER_REGEX: OnceLock<Regex> = OnceLock::new();
static INLINE_HEADER_REGEX: OnceLock<Regex> = OnceLock::new();
static SEPARATOR_LINE_REGEX: OnceLock<Regex> = OnceLock::new();
static ADDRESS_REGEX: OnceLock<Regex> = OnceLock::new();

fn quote_marker_regex() -> &'static Regex {
    QUOTE_MARKER_REGEX.get_or_init(|| Regex::new(r"(?m)^(?:>[ \t]?)+").expect("valid quote marker regex"))
}

fn block_header_regex() -> &'static Regex {
    BLOCK_HEADER_REGEX.get_or_init(|| {
        Regex::new(
            r"(?im)^[ \t]*\*?From\*?:\*?[ \t]*\S[^\n]*(?:\n[ \t]*\*?(?:Sent|Date|To|Cc|Bcc|Subject|Reply-To|Importance)\*?:[^\n]*)+",
        )
        .expect("valid block header regex")
    })
}

fn inline_header_regex() -> &'static Regex {
    INLINE_HEADER_REGEX.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*On[ \t][^\n]*?(?:\n[^\n]*?)?\swrote:[ \t]*$")
            .expect("valid inline header regex")
    })
}

fn separator_line_regex() -> &'static Regex {
    SEPARATOR_LINE_REGEX.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*(?:-{2,}[ \t]*(?:original message|forwarded message)[ \t]*-{2,}|_{10,})[ \t]*$")
            .expect("valid separator regex")
    })
}

fn address_regex() -> &'static Regex {
    ADDRESS_REGEX.get_or_init(|| {
        Regex::new(r"[^\s<>\[\]():;,]+@[^\s<>\[\]():;,]+").expect("valid address regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderStyle {
    Block,
    Inline,
}

#[derive(Debug, Clone, Copy)]
struct Boundary {
    start: usize,
    end: usize,
    style: HeaderStyle,
}

/// Split `body` into sub-messages matched against `chain`.
///
/// `chain` lists identifiers oldest first. Segments are taken in body
/// order: the top-level text is slot 0 and takes the newest identifier,
/// each following quote takes the next older one, so the deepest quote
/// pairs with `chain[0]` when counts agree. At most `chain.len()` segments
/// are produced; quote headers beyond that stay in the last segment's
/// body. A blank top-level segment is dropped. An empty chain yields
/// nothing. Never fails.
pub fn split_sub_messages(body: &str, chain: &[String]) -> Vec<SubMessage> {
    if chain.is_empty() {
        return Vec::new();
    }

    let normalized = body.replace("\r\n", "\n");
    let text = quote_marker_regex().replace_all(&normalized, "");

    let mut boundaries = find_boundaries(&text);
    let available = chain.len() - 1;
    if boundaries.len() > available {
        debug!(
            found = boundaries.len(),
            kept = available,
            "More quote headers than identifiers, keeping surplus in last segment"
        );
        boundaries.truncate(available);
    }

    let identifier = |slot: usize| chain.get(chain.len() - 1 - slot).cloned();
    let mut subs = Vec::with_capacity(boundaries.len() + 1);

    let top_end = boundaries.first().map_or(text.len(), |b| b.start);
    let top = clean_segment(&text[..top_end]);
    if !top.is_empty() {
        subs.push(SubMessage::headerless(top, identifier(0)));
    }

    for (i, boundary) in boundaries.iter().enumerate() {
        let body_end = boundaries.get(i + 1).map_or(text.len(), |next| next.start);
        let header = &text[boundary.start..boundary.end];
        let mut sub = match boundary.style {
            HeaderStyle::Block => parse_block_header(header),
            HeaderStyle::Inline => parse_inline_header(header),
        };
        sub.body = clean_segment(&text[boundary.end..body_end]);
        sub.global_message_id = identifier(i + 1);
        subs.push(sub);
    }

    subs
}

/// Non-overlapping quote headers of both styles, in body order.
fn find_boundaries(text: &str) -> Vec<Boundary> {
    let mut found: Vec<Boundary> = block_header_regex()
        .find_iter(text)
        .map(|m| Boundary {
            start: m.start(),
            end: m.end(),
            style: HeaderStyle::Block,
        })
        .chain(inline_header_regex().find_iter(text).map(|m| Boundary {
            start: m.start(),
            end: m.end(),
            style: HeaderStyle::Inline,
        }))
        .collect();
    found.sort_by_key(|b| b.start);

    let mut boundaries: Vec<Boundary> = Vec::with_capacity(found.len());
    for boundary in found {
        match boundaries.last() {
            Some(prev) if boundary.start < prev.end => continue,
            _ => boundaries.push(boundary),
        }
    }
    boundaries
}

fn clean_segment(segment: &str) -> String {
    separator_line_regex()
        .replace_all(segment, "")
        .trim()
        .to_string()
}

fn empty_sub() -> SubMessage {
    SubMessage::headerless(String::new(), None)
}

/// `From:` / `Sent:` / `To:` / `Subject:` block.
fn parse_block_header(header: &str) -> SubMessage {
    let mut sub = empty_sub();
    for line in header.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches('*').trim().to_ascii_lowercase();
        let value = value.trim().trim_start_matches('*').trim();
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "from" => {
                let (name, address) = parse_party(value);
                sub.sender_name = name;
                sub.from_address = address;
            }
            "to" => {
                let first = value.split([';', ',']).next().unwrap_or(value);
                let (name, address) = parse_party(first);
                sub.receiver_name = name;
                sub.to_address = address;
            }
            "sent" | "date" => sub.submit_time = parse_date(value),
            "subject" => sub.subject = Some(value.to_string()),
            _ => {}
        }
    }
    sub
}

/// `On <date>, <name> <address> wrote:`, possibly wrapped over two lines.
fn parse_inline_header(header: &str) -> SubMessage {
    let mut sub = empty_sub();
    let joined = header.split_whitespace().collect::<Vec<_>>().join(" ");
    let content = joined
        .strip_prefix("On ")
        .unwrap_or(&joined)
        .trim_end_matches("wrote:")
        .trim()
        .trim_end_matches(',')
        .trim();

    let Some(addr_match) = address_regex().find(content) else {
        sub.submit_time = parse_date(content);
        return sub;
    };
    sub.from_address = Some(addr_match.as_str().to_lowercase());

    let before = content[..addr_match.start()]
        .trim_end()
        .trim_end_matches(['<', '(', '['])
        .trim_end();
    match before.rsplit_once(", ") {
        Some((date, name)) => match parse_date(date) {
            Some(dt) => {
                sub.submit_time = Some(dt);
                sub.sender_name = clean_name(name);
            }
            None => {
                sub.submit_time = parse_date(before);
                if sub.submit_time.is_none() {
                    debug!(header = %content, "Could not parse quoted date");
                }
            }
        },
        None => sub.submit_time = parse_date(before),
    }
    sub
}

/// Name and lowercase address of one `Name <addr>` / `Name [mailto:addr]` party.
fn parse_party(value: &str) -> (Option<String>, Option<String>) {
    let value = value.replace("[mailto:", "<").replace(']', ">");
    let parsed = EmailAddress::parse(&value);
    if parsed.address.contains('@') {
        let address = address_regex()
            .find(&parsed.address)
            .map(|m| m.as_str().to_lowercase());
        return (clean_name(&parsed.display_name), address);
    }
    match address_regex().find(&value) {
        Some(m) => (clean_name(&value[..m.start()]), Some(m.as_str().to_lowercase())),
        None => (clean_name(&value), None),
    }
}

fn clean_name(name: &str) -> Option<String> {
    let name = name.trim().trim_matches(['"', '\'', '<', '(']).trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_inline_reply() {
        let body = "Reply text\n\nOn Mon, Jan 1, 2018 at 12:00 PM, Jane <jane@x.com> wrote:\nOriginal text";
        let subs = split_sub_messages(body, &chain(&["id1", "id2"]));
        assert_eq!(subs.len(), 2);

        assert!(subs[0].is_headerless());
        assert_eq!(subs[0].body, "Reply text");
        assert_eq!(subs[0].global_message_id.as_deref(), Some("id2"));

        assert_eq!(subs[1].from_address.as_deref(), Some("jane@x.com"));
        assert_eq!(subs[1].sender_name.as_deref(), Some("Jane"));
        assert_eq!(subs[1].body, "Original text");
        assert_eq!(subs[1].global_message_id.as_deref(), Some("id1"));
        assert_eq!(
            subs[1].submit_time.map(|t| t.to_rfc3339()),
            Some("2018-01-01T12:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_empty_chain() {
        assert!(split_sub_messages("anything", &[]).is_empty());
    }

    #[test]
    fn test_outlook_block_header() {
        let body = "Sounds good.\r\n\r\n-----Original Message-----\r\nFrom: Jane Doe [mailto:Jane@X.com]\r\nSent: Wednesday, January 3, 2018 5:00 PM\r\nTo: Bob <bob@y.com>; Carol <carol@y.com>\r\nSubject: Budget\r\n\r\nPlease review.";
        let subs = split_sub_messages(body, &chain(&["parent", "self"]));
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].body, "Sounds good.");
        let quoted = &subs[1];
        assert_eq!(quoted.sender_name.as_deref(), Some("Jane Doe"));
        assert_eq!(quoted.from_address.as_deref(), Some("jane@x.com"));
        assert_eq!(quoted.receiver_name.as_deref(), Some("Bob"));
        assert_eq!(quoted.to_address.as_deref(), Some("bob@y.com"));
        assert_eq!(quoted.subject.as_deref(), Some("Budget"));
        assert_eq!(
            quoted.submit_time.map(|t| t.to_rfc3339()),
            Some("2018-01-03T17:00:00+00:00".to_string())
        );
        assert_eq!(quoted.body, "Please review.");
        assert_eq!(quoted.global_message_id.as_deref(), Some("parent"));
    }

    #[test]
    fn test_nested_quotes_map_oldest_to_deepest() {
        let body = "Top\n\nOn Tue, Jan 2, 2018 at 9:00 AM, Bob <bob@x.com> wrote:\n> Middle\n>\n> On Mon, Jan 1, 2018 at 8:00 AM, Al <al@x.com> wrote:\n>> Bottom\n";
        let subs = split_sub_messages(body, &chain(&["a", "b", "c"]));
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0].global_message_id.as_deref(), Some("c"));
        assert_eq!(subs[1].from_address.as_deref(), Some("bob@x.com"));
        assert_eq!(subs[1].body, "Middle");
        assert_eq!(subs[1].global_message_id.as_deref(), Some("b"));
        assert_eq!(subs[2].from_address.as_deref(), Some("al@x.com"));
        assert_eq!(subs[2].body, "Bottom");
        assert_eq!(subs[2].global_message_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_surplus_quotes_stay_in_last_segment() {
        let body = "Top\n\nOn Tue, Jan 2, 2018 at 9:00 AM, Bob <bob@x.com> wrote:\nMiddle\n\nOn Mon, Jan 1, 2018 at 8:00 AM, Al <al@x.com> wrote:\nBottom";
        let subs = split_sub_messages(body, &chain(&["a", "b"]));
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[1].global_message_id.as_deref(), Some("a"));
        assert!(subs[1].body.starts_with("Middle"));
        assert!(subs[1].body.contains("Al <al@x.com> wrote:"));
        assert!(subs[1].body.ends_with("Bottom"));
    }

    #[test]
    fn test_single_identifier_keeps_everything_in_top() {
        let body = "Top\nOn Mon, Jan 1, 2018 at 8:00 AM, Al <al@x.com> wrote:\nBottom";
        let subs = split_sub_messages(body, &chain(&["only"]));
        assert_eq!(subs.len(), 1);
        assert!(subs[0].is_headerless());
        assert!(subs[0].body.ends_with("Bottom"));
    }

    #[test]
    fn test_blank_top_is_dropped() {
        let body = "\n\nOn Mon, Jan 1, 2018 at 8:00 AM, Al <al@x.com> wrote:\nBottom";
        let subs = split_sub_messages(body, &chain(&["a", "b"]));
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].from_address.as_deref(), Some("al@x.com"));
        assert_eq!(subs[0].global_message_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_wrapped_inline_header() {
        let body = "Ok\n\nOn Mon, Jan 1, 2018 at 12:00 PM, Jane Doe <jane@x.com>\nwrote:\nOriginal";
        let subs = split_sub_messages(body, &chain(&["a", "b"]));
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[1].from_address.as_deref(), Some("jane@x.com"));
        assert_eq!(subs[1].sender_name.as_deref(), Some("Jane Doe"));
        assert_eq!(subs[1].body, "Original");
    }

    #[test]
    fn test_unparseable_date_is_absent() {
        let body = "Ok\n\nOn a sunny day, Jane <jane@x.com> wrote:\nOriginal";
        let subs = split_sub_messages(body, &chain(&["a", "b"]));
        assert_eq!(subs[1].submit_time, None);
        assert_eq!(subs[1].from_address.as_deref(), Some("jane@x.com"));
    }

    #[test]
    fn test_no_boundaries() {
        let subs = split_sub_messages("  just text  ", &chain(&["a", "b"]));
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].body, "just text");
        assert_eq!(subs[0].global_message_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_lone_from_line_is_not_a_header() {
        let body = "From: the desk of Bob\nplease read";
        let subs = split_sub_messages(body, &chain(&["a", "b"]));
        assert_eq!(subs.len(), 1);
    }
}
