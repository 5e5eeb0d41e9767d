//! Reply-body cleanup: drop quoted history, signatures and boilerplate.

use std::sync::OnceLock;

use regex::Regex;

static CUTOFF_REGEX: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Lines where the author's own text ends.
fn cutoff_regex() -> &'static Regex {
    CUTOFF_REGEX.get_or_init(|| {
        Regex::new(
            r"(?m)^--[ \t]?$|-----Original Message-----|_{32}|^[ \t]*On [^\n]*wrote:|^From: |^Sent from my iPhone",
        )
        .expect("valid text cutoff regex")
    })
}

fn whitespace_regex() -> &'static Regex {
    WHITESPACE_REGEX.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// The new content of a message body.
///
/// Cuts the text at the first signature delimiter or quote marker, removes
/// every `boilerplate` phrase, and collapses whitespace runs to one space.
/// Returns `None` when nothing is left.
pub fn clean_text(text: &str, boilerplate: &[String]) -> Option<String> {
    let text = text.replace("\r\n", "\n");
    let head = match cutoff_regex().find(&text) {
        Some(m) => &text[..m.start()],
        None => text.as_str(),
    };

    let mut cleaned = head.to_string();
    for phrase in boilerplate.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        cleaned = cleaned.replace(phrase, " ");
    }

    let collapsed = whitespace_regex().replace_all(&cleaned, " ");
    let collapsed = collapsed.trim();
    (!collapsed.is_empty()).then(|| collapsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_cut() {
        let body = "Sounds good.\n\nThanks\n-- \nJane Doe\nAcme Corp";
        assert_eq!(clean_text(body, &[]).as_deref(), Some("Sounds good. Thanks"));
    }

    #[test]
    fn test_quote_markers_cut() {
        let outlook = "See below.\r\n\r\n-----Original Message-----\r\nFrom: a@b.com\r\nold";
        assert_eq!(clean_text(outlook, &[]).as_deref(), Some("See below."));

        let gmail = "Agreed.\n\nOn Mon, Jan 1, 2018 at 9:00 AM, Bob <b@x.com> wrote:\n> earlier";
        assert_eq!(clean_text(gmail, &[]).as_deref(), Some("Agreed."));

        let mobile = "On my way\nSent from my iPhone";
        assert_eq!(clean_text(mobile, &[]).as_deref(), Some("On my way"));

        let rule = format!("Top\n{}\nFrom: x", "_".repeat(32));
        assert_eq!(clean_text(&rule, &[]).as_deref(), Some("Top"));
    }

    #[test]
    fn test_earliest_marker_wins() {
        let body = "Hi\nFrom: someone\n-- \nsig";
        assert_eq!(clean_text(body, &[]).as_deref(), Some("Hi"));
    }

    #[test]
    fn test_boilerplate_removed() {
        let phrases = vec![
            "CAUTION: This email originated from outside the organization.".to_string(),
            "  ".to_string(),
        ];
        let body = "CAUTION: This email originated from outside the organization.\n\nPlease review.";
        assert_eq!(clean_text(body, &phrases).as_deref(), Some("Please review."));
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(
            clean_text("  a\t\tb\n\n\nc  ", &[]).as_deref(),
            Some("a b c")
        );
    }

    #[test]
    fn test_empty_result() {
        assert_eq!(clean_text("", &[]), None);
        assert_eq!(clean_text("-- \nsig only", &[]), None);
        assert_eq!(clean_text("   \n ", &[]), None);
    }

    #[test]
    fn test_inline_dashes_kept() {
        assert_eq!(
            clean_text("Q3 -- final numbers", &[]).as_deref(),
            Some("Q3 -- final numbers")
        );
    }
}
