//! Body decoding: charset handling, HTML-to-text conversion, truncation.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// Converts an HTML body into plain text.
///
/// The builder calls this only when a message has no plain-text body.
/// Returning `None` means conversion failed; the body is then left absent.
pub trait HtmlConverter: Send + Sync {
    fn convert(&self, html: &str) -> Option<String>;
}

/// Default converter: strips tags, keeps block structure as line breaks and
/// decodes entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagStripper;

impl HtmlConverter for TagStripper {
    fn convert(&self, html: &str) -> Option<String> {
        Some(html_to_text(html))
    }
}

/// Decode raw body bytes into text.
///
/// Order of attempts: the declared charset (strict), a UTF-16LE payload
/// (BOM or NUL-interleaved ASCII, as PST unicode bodies are stored),
/// strict UTF-8, and finally Windows-1252, which accepts every byte.
/// Returns `None` for empty input or input that is only NULs and whitespace.
pub fn decode_body(bytes: &[u8], charset: Option<&str>) -> Option<String> {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    if bytes.is_empty() {
        return None;
    }

    let text: Cow<'_, str> = if let Some(text) = decode_declared(bytes, charset) {
        text
    } else if looks_like_utf16le(bytes) {
        let (decoded, _, _) = encoding_rs::UTF_16LE.decode(bytes);
        decoded
    } else if let Ok(s) = std::str::from_utf8(bytes) {
        Cow::Borrowed(s)
    } else {
        debug!(charset = ?charset, "Body is not valid in its declared charset, decoding as Windows-1252");
        let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
        decoded
    };

    let text = text.trim_end_matches('\0');
    if text.trim().is_empty() {
        return None;
    }
    Some(text.to_string())
}

fn decode_declared<'a>(bytes: &'a [u8], charset: Option<&str>) -> Option<Cow<'a, str>> {
    let encoding = encoding_rs::Encoding::for_label(charset?.trim().as_bytes())?;
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

fn looks_like_utf16le(bytes: &[u8]) -> bool {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return true;
    }
    if bytes.len() < 4 || bytes.len() % 2 != 0 {
        return false;
    }
    let sample = &bytes[..bytes.len().min(256)];
    let odd_nuls = sample.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
    odd_nuls * 10 >= (sample.len() / 2) * 9
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}

static SCRIPT_STYLE_REGEX: OnceLock<Regex> = OnceLock::new();
static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
static BLOCK_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static LIST_ITEM_REGEX: OnceLock<Regex> = OnceLock::new();
static ANY_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static NUMERIC_ENTITY_REGEX: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid HTML regex"))
}

/// Convert HTML to plain text.
///
/// - Line breaks from `<br>`, `<p>`, `<div>`, `<tr>`, headings
/// - `<li>` becomes `"- item"`
/// - Scripts, styles and comments are removed
/// - Named and numeric entities are decoded
/// - Runs of blank lines collapse to one
pub fn html_to_text(html: &str) -> String {
    let text = regex(&SCRIPT_STYLE_REGEX, r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>")
        .replace_all(html, "");
    let text = regex(&COMMENT_REGEX, r"(?s)<!--.*?-->").replace_all(&text, "");
    let text = regex(&LIST_ITEM_REGEX, r"(?i)<li\b[^>]*>").replace_all(&text, "\n- ");
    let text = regex(
        &BLOCK_TAG_REGEX,
        r"(?i)</?(br|p|div|tr|table|h[1-6]|ul|ol|blockquote)\b[^>]*>",
    )
    .replace_all(&text, "\n");
    let text = regex(&ANY_TAG_REGEX, r"(?s)<[^>]*>").replace_all(&text, "");
    let text = decode_entities(&text);

    let mut prev_was_blank = false;
    let mut cleaned = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

fn decode_entities(text: &str) -> String {
    let numeric = regex(&NUMERIC_ENTITY_REGEX, r"&#([xX][0-9a-fA-F]{1,6}|[0-9]{1,7});");
    let text = numeric.replace_all(text, |caps: &regex::Captures<'_>| {
        let digits = &caps[1];
        let code = match digits.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => digits.parse::<u32>().ok(),
        };
        match code.and_then(char::from_u32) {
            Some('\u{a0}') => " ".to_string(),
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    });

    // &amp; last so that "&amp;lt;" decodes to "&lt;", not "<"
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
