//! Builds validated [`ParsedMessage`] records from raw mailbox messages.
//!
//! Each record field has a fixed source: a FILETIME integer on the raw
//! message, an address header, or an identifier header. [`FieldSource`]
//! enumerates them and [`MessageBuilder::build`] resolves each one with a
//! single `match`. Bodies, subject and sender name are taken straight from
//! the raw message.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ValidationError;
use crate::mailbox::RawMessage;
use crate::model::address::{is_valid_address, normalize_addresses, unfold, EmailAddress, Recipients};
use crate::model::message::ParsedMessage;
use crate::parser::body::{decode_body, truncate_chars, HtmlConverter, TagStripper};
use crate::parser::header::{parse_content_type, parse_transport_headers, HeaderMap};
use crate::parser::identifier::{bare_identifier, bare_identifiers, extract_identifiers};
use crate::parser::timestamp::decode_filetime;

/// Default cap on stored body length, in characters.
pub const DEFAULT_MAX_BODY_LENGTH: usize = 10_000;

/// Domain used for identifiers derived when `Message-ID` is missing.
pub const SYNTHESIZED_ID_DOMAIN: &str = "mailsift.invalid";

/// The closed set of record fields that are derived rather than copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    CreationTime,
    SubmitTime,
    DeliveryTime,
    From,
    To,
    Cc,
    Bcc,
    MessageId,
    InReplyTo,
    References,
}

impl FieldSource {
    pub const ALL: [FieldSource; 10] = [
        FieldSource::CreationTime,
        FieldSource::SubmitTime,
        FieldSource::DeliveryTime,
        FieldSource::From,
        FieldSource::To,
        FieldSource::Cc,
        FieldSource::Bcc,
        FieldSource::MessageId,
        FieldSource::InReplyTo,
        FieldSource::References,
    ];

    /// Field name as reported in validation errors.
    pub fn name(self) -> &'static str {
        match self {
            FieldSource::CreationTime => "creation_time",
            FieldSource::SubmitTime => "submit_time",
            FieldSource::DeliveryTime => "delivery_time",
            FieldSource::From => "from",
            FieldSource::To => "to",
            FieldSource::Cc => "cc",
            FieldSource::Bcc => "bcc",
            FieldSource::MessageId => "message_id",
            FieldSource::InReplyTo => "in_reply_to",
            FieldSource::References => "references",
        }
    }

    /// Lowercase transport header the field is read from, if any.
    pub fn header(self) -> Option<&'static str> {
        match self {
            FieldSource::CreationTime | FieldSource::SubmitTime | FieldSource::DeliveryTime => None,
            FieldSource::From => Some("from"),
            FieldSource::To => Some("to"),
            FieldSource::Cc => Some("cc"),
            FieldSource::Bcc => Some("bcc"),
            FieldSource::MessageId => Some("message-id"),
            FieldSource::InReplyTo => Some("in-reply-to"),
            FieldSource::References => Some("references"),
        }
    }
}

/// Field values resolved so far, before the record is assembled.
#[derive(Debug, Default)]
struct Draft {
    creation_time: Option<DateTime<Utc>>,
    submit_time: Option<DateTime<Utc>>,
    delivery_time: Option<DateTime<Utc>>,
    from_address: Option<String>,
    to_address: Option<Recipients>,
    cc_address: Option<Recipients>,
    bcc_address: Option<Recipients>,
    message_id: Option<String>,
    in_reply_to: Option<String>,
    references: Option<Vec<String>>,
}

/// Turns raw messages into [`ParsedMessage`] records.
///
/// Stateless apart from its options, so one builder can be shared by all
/// workers of a parse pool.
pub struct MessageBuilder {
    max_body_length: usize,
    converter: Box<dyn HtmlConverter>,
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_LENGTH)
    }
}

impl MessageBuilder {
    /// Builder with the default HTML converter.
    pub fn new(max_body_length: usize) -> Self {
        Self {
            max_body_length,
            converter: Box::new(TagStripper),
        }
    }

    /// Replace the HTML-to-text converter used when a message has no plain body.
    pub fn with_converter(mut self, converter: Box<dyn HtmlConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn max_body_length(&self) -> usize {
        self.max_body_length
    }

    /// Build a record from one raw message.
    ///
    /// Fails only when the sender is missing or invalid, or when a recipient
    /// address does not pass syntax validation. Everything else that cannot
    /// be decoded is left absent.
    pub fn build<R: RawMessage + ?Sized>(
        &self,
        raw: &R,
        folder_path: &str,
    ) -> Result<ParsedMessage, ValidationError> {
        let raw_headers = raw.transport_headers();
        let headers = parse_transport_headers(raw_headers);

        let mut draft = Draft::default();
        for source in FieldSource::ALL {
            resolve(&mut draft, source, raw, &headers)?;
        }

        let (content_type, charset) = parse_content_type(headers.get("content-type"));

        let sender_name = clean_text_field(raw.sender_name())
            .or_else(|| headers.get("from").and_then(display_name_of));
        let subject = clean_text_field(raw.subject())
            .or_else(|| clean_text_field(headers.get("subject").map(unfold).as_deref()));

        let from_address = match draft.from_address.take() {
            Some(addr) => addr,
            None => return Err(ValidationError::new("from", "", "missing sender address")),
        };

        let (global_message_id, global_id_synthesized) = match draft.message_id.take() {
            Some(id) => (id, false),
            None => {
                let id = synthesize_message_id(folder_path, raw.identifier(), raw_headers, subject.as_deref());
                debug!(folder = folder_path, provider_id = raw.identifier(), id = %id, "Message-ID missing, derived one");
                (id, true)
            }
        };

        let charset_ref = raw.body_charset().or(charset.as_deref());
        let mut plain_text_body = raw
            .plain_text_body()
            .and_then(|b| decode_body(b, charset_ref));
        let html_body = raw.html_body().and_then(|b| decode_body(b, charset_ref));
        let mut plain_text_is_converted = false;

        if plain_text_body.is_none() {
            if let Some(html) = html_body.as_deref() {
                match self.converter.convert(html) {
                    Some(text) if !text.trim().is_empty() => {
                        plain_text_body = Some(text);
                        plain_text_is_converted = true;
                    }
                    _ => debug!(
                        folder = folder_path,
                        provider_id = raw.identifier(),
                        "HTML body could not be converted to text"
                    ),
                }
            }
        }

        let rich_text_body = raw.rtf_body().and_then(|b| decode_body(b, None));

        let max = self.max_body_length;
        Ok(ParsedMessage {
            folder_path: folder_path.to_string(),
            provider_email_id: raw.identifier(),
            global_message_id,
            global_id_synthesized,
            creation_time: draft.creation_time,
            submit_time: draft.submit_time,
            delivery_time: draft.delivery_time,
            sender_name,
            from_address,
            to_address: draft.to_address,
            cc_address: draft.cc_address,
            bcc_address: draft.bcc_address,
            subject,
            content_type,
            charset,
            plain_text_body: plain_text_body.map(|b| truncate_chars(b, max)),
            plain_text_is_converted,
            html_body: html_body.map(|b| truncate_chars(b, max)),
            rich_text_body: rich_text_body.map(|b| truncate_chars(b, max)),
            in_reply_to: draft.in_reply_to,
            references: draft.references,
            attachment_count: raw.attachment_count(),
        })
    }
}

fn resolve<R: RawMessage + ?Sized>(
    draft: &mut Draft,
    source: FieldSource,
    raw: &R,
    headers: &HeaderMap,
) -> Result<(), ValidationError> {
    let header = source.header().and_then(|name| headers.get(name));
    match source {
        FieldSource::CreationTime => draft.creation_time = decode_filetime(raw.creation_time()),
        FieldSource::SubmitTime => draft.submit_time = decode_filetime(raw.submit_time()),
        FieldSource::DeliveryTime => draft.delivery_time = decode_filetime(raw.delivery_time()),
        FieldSource::From => draft.from_address = sender_address(header, raw.sender_name())?,
        FieldSource::To => draft.to_address = validated_recipients(source, header)?,
        FieldSource::Cc => draft.cc_address = validated_recipients(source, header)?,
        FieldSource::Bcc => draft.bcc_address = validated_recipients(source, header)?,
        FieldSource::MessageId => draft.message_id = single_identifier(header),
        FieldSource::InReplyTo => draft.in_reply_to = single_identifier(header),
        FieldSource::References => {
            draft.references =
                extract_identifiers(header).or_else(|| header.and_then(bare_identifiers))
        }
    }
    Ok(())
}

/// Sender address from the `From` header, else from the sender name when
/// that is itself an address. The first address wins if several are listed.
fn sender_address(
    header: Option<&str>,
    sender_name: Option<&str>,
) -> Result<Option<String>, ValidationError> {
    let Some(recipients) = normalize_addresses(header).or_else(|| normalize_addresses(sender_name)) else {
        return Ok(None);
    };
    let Some(first) = recipients.iter().next() else {
        return Ok(None);
    };
    if !is_valid_address(first) {
        return Err(ValidationError::new("from", first.clone(), "invalid address syntax"));
    }
    Ok(Some(first.clone()))
}

fn validated_recipients(
    source: FieldSource,
    header: Option<&str>,
) -> Result<Option<Recipients>, ValidationError> {
    let recipients = normalize_addresses(header);
    if let Some(bad) = recipients.iter().flat_map(|r| r.iter()).find(|a| !is_valid_address(a)) {
        return Err(ValidationError::new(source.name(), bad.clone(), "invalid address syntax"));
    }
    Ok(recipients)
}

/// First bracketed identifier, or the whole value when it carries none.
fn single_identifier(header: Option<&str>) -> Option<String> {
    extract_identifiers(header)
        .and_then(|ids| ids.into_iter().next())
        .or_else(|| header.and_then(bare_identifier))
}

fn display_name_of(from_header: &str) -> Option<String> {
    let parsed = EmailAddress::parse(&unfold(from_header));
    let name = parsed.display_name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn clean_text_field(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Deterministic identifier for a message without `Message-ID`.
fn synthesize_message_id(
    folder_path: &str,
    provider_id: u64,
    raw_headers: Option<&str>,
    subject: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(folder_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(provider_id.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(raw_headers.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(subject.unwrap_or_default().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
    format!("{hex}@{SYNTHESIZED_ID_DOMAIN}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::memory::MemoryMessage;

    fn message(headers: &str) -> MemoryMessage {
        MemoryMessage::new(1).with_headers(headers)
    }

    #[test]
    fn test_build_basic_record() {
        let raw = message(
            "From: Alice Smith <Alice@Example.com>\r\n\
             To: bob@example.com, Carol <carol@example.org>\r\n\
             Subject: Quarterly numbers\r\n\
             Message-ID: <abc@x.com>\r\n\
             Content-Type: text/plain; charset=utf-8\r\n",
        )
        .with_plain_body("Hello Bob")
        .with_submit_time(131_592_816_000_000_000);

        let parsed = MessageBuilder::default().build(&raw, "Inbox").unwrap();
        assert_eq!(parsed.folder_path, "Inbox");
        assert_eq!(parsed.global_message_id, "abc@x.com");
        assert!(!parsed.global_id_synthesized);
        assert_eq!(parsed.from_address, "alice@example.com");
        assert_eq!(parsed.sender_name.as_deref(), Some("Alice Smith"));
        assert_eq!(
            parsed.to_address,
            Some(Recipients::Many(vec![
                "bob@example.com".to_string(),
                "carol@example.org".to_string()
            ]))
        );
        assert_eq!(parsed.subject.as_deref(), Some("Quarterly numbers"));
        assert_eq!(parsed.content_type.as_deref(), Some("text/plain"));
        assert_eq!(parsed.charset.as_deref(), Some("utf-8"));
        assert_eq!(parsed.plain_text_body.as_deref(), Some("Hello Bob"));
        assert!(!parsed.plain_text_is_converted);
        assert_eq!(
            parsed.submit_time.map(|t| t.to_rfc3339()),
            Some("2018-01-01T12:00:00+00:00".to_string())
        );
        assert_eq!(parsed.creation_time, None);
    }

    #[test]
    fn test_identifiers() {
        let raw = message(
            "From: a@example.com\nMessage-ID: <m3@x.com>\nIn-Reply-To: <m2@x.com>\nReferences: <m1@x.com>\n <m2@x.com>\n",
        );
        let parsed = MessageBuilder::default().build(&raw, "Inbox").unwrap();
        assert_eq!(parsed.in_reply_to.as_deref(), Some("m2@x.com"));
        assert_eq!(
            parsed.references,
            Some(vec!["m1@x.com".to_string(), "m2@x.com".to_string()])
        );
    }

    #[test]
    fn test_unbracketed_identifiers() {
        let raw = message("From: a@example.com\nMessage-ID: m3@x.com\nReferences: m1@x.com m2@x.com\n");
        let parsed = MessageBuilder::default().build(&raw, "Inbox").unwrap();
        assert_eq!(parsed.global_message_id, "m3@x.com");
        assert_eq!(parsed.reference_count(), 2);
    }

    #[test]
    fn test_missing_sender_fails() {
        let raw = message("To: bob@example.com\n");
        let err = MessageBuilder::default().build(&raw, "Inbox").unwrap_err();
        assert_eq!(err.field, "from");
    }

    #[test]
    fn test_invalid_sender_fails() {
        let raw = message("From: someone@localhost\n");
        let err = MessageBuilder::default().build(&raw, "Inbox").unwrap_err();
        assert_eq!(err.field, "from");
        assert_eq!(err.value, "someone@localhost");
    }

    #[test]
    fn test_invalid_recipient_names_field() {
        let raw = message("From: a@example.com\nCc: good@example.com, bad@@example.com\n");
        let err = MessageBuilder::default().build(&raw, "Inbox").unwrap_err();
        assert_eq!(err.field, "cc");
        assert_eq!(err.value, "bad@@example.com");
    }

    #[test]
    fn test_group_and_comment_headers_accepted() {
        let raw = message(
            "From: jdoe@example.com (John Doe)\nTo: Team: b@x.com, c@y.com;\nMessage-ID: <g@x.com>\n",
        );
        let parsed = MessageBuilder::default().build(&raw, "Inbox").unwrap();
        assert_eq!(parsed.from_address, "jdoe@example.com");
        assert_eq!(
            parsed.to_address,
            Some(Recipients::Many(vec!["b@x.com".to_string(), "c@y.com".to_string()]))
        );
    }

    #[test]
    fn test_sender_falls_back_to_sender_name() {
        let raw = MemoryMessage::new(9)
            .with_sender_name("Ops@Example.com")
            .with_headers("Message-ID: <x@y.com>\n");
        let parsed = MessageBuilder::default().build(&raw, "Sent").unwrap();
        assert_eq!(parsed.from_address, "ops@example.com");
        assert_eq!(parsed.sender_name.as_deref(), Some("Ops@Example.com"));
    }

    #[test]
    fn test_synthesized_message_id_is_deterministic() {
        let raw = message("From: a@example.com\nSubject: no id\n");
        let builder = MessageBuilder::default();
        let first = builder.build(&raw, "Inbox").unwrap();
        let second = builder.build(&raw, "Inbox").unwrap();
        assert!(first.global_id_synthesized);
        assert!(first.global_message_id.ends_with("@mailsift.invalid"));
        assert_eq!(first.global_message_id, second.global_message_id);

        let other_folder = builder.build(&raw, "Archive").unwrap();
        assert_ne!(first.global_message_id, other_folder.global_message_id);
    }

    #[test]
    fn test_html_converted_when_plain_missing() {
        let raw = message("From: a@example.com\n").with_html_body("<p>Hi <b>there</b></p>");
        let parsed = MessageBuilder::default().build(&raw, "Inbox").unwrap();
        assert_eq!(parsed.plain_text_body.as_deref(), Some("Hi there"));
        assert!(parsed.plain_text_is_converted);
        assert_eq!(parsed.html_body.as_deref(), Some("<p>Hi <b>there</b></p>"));
    }

    struct FailingConverter;

    impl HtmlConverter for FailingConverter {
        fn convert(&self, _html: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_failed_conversion_leaves_body_absent() {
        let raw = message("From: a@example.com\n").with_html_body("<p>x</p>");
        let parsed = MessageBuilder::default()
            .with_converter(Box::new(FailingConverter))
            .build(&raw, "Inbox")
            .unwrap();
        assert_eq!(parsed.plain_text_body, None);
        assert!(!parsed.plain_text_is_converted);
    }

    #[test]
    fn test_body_truncated_to_max_length() {
        let raw = message("From: a@example.com\n").with_plain_body(&"x".repeat(20_000));
        let parsed = MessageBuilder::new(10_000).build(&raw, "Inbox").unwrap();
        assert_eq!(parsed.plain_text_body.map(|b| b.chars().count()), Some(10_000));
    }

    #[test]
    fn test_subject_from_header_when_raw_subject_missing() {
        let raw = message("From: a@example.com\nSubject: Re: folded\n subject\n");
        let parsed = MessageBuilder::default().build(&raw, "Inbox").unwrap();
        assert_eq!(parsed.subject.as_deref(), Some("Re: folded subject"));
    }

    #[test]
    fn test_field_source_names() {
        for source in FieldSource::ALL {
            assert!(!source.name().is_empty());
        }
        assert_eq!(FieldSource::Bcc.header(), Some("bcc"));
        assert_eq!(FieldSource::SubmitTime.header(), None);
    }
}
