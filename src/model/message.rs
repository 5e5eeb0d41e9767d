//! Core message records: parsed, enriched, and quoted sub-messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::Recipients;

/// A structured, validated record built from one raw mailbox message.
///
/// Created once by [`crate::parser::builder::MessageBuilder`] and never
/// mutated afterwards. The sender address is always present and passes
/// [`crate::model::address::is_valid_address`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedMessage {
    /// Folder path inside the mailbox (`"Inbox/Projects"`).
    pub folder_path: String,

    /// Identifier assigned by the mailbox container, scoped to that container.
    pub provider_email_id: u64,

    /// Cross-system identifier from the `Message-ID` header, without brackets.
    pub global_message_id: String,

    /// `true` when the `Message-ID` header was absent and the id was derived.
    pub global_id_synthesized: bool,

    pub creation_time: Option<DateTime<Utc>>,
    pub submit_time: Option<DateTime<Utc>>,
    pub delivery_time: Option<DateTime<Utc>>,

    pub sender_name: Option<String>,

    /// Lowercase, validated sender address.
    pub from_address: String,

    pub to_address: Option<Recipients>,
    pub cc_address: Option<Recipients>,
    pub bcc_address: Option<Recipients>,

    pub subject: Option<String>,

    /// MIME type from the `Content-Type` header (`"text/plain"`), lowercased.
    pub content_type: Option<String>,

    /// `charset` parameter of the `Content-Type` header.
    pub charset: Option<String>,

    /// Plain-text body, possibly converted from HTML. Truncated.
    pub plain_text_body: Option<String>,

    /// `true` when `plain_text_body` was produced from the HTML body.
    pub plain_text_is_converted: bool,

    /// HTML body. Truncated.
    pub html_body: Option<String>,

    /// RTF body. Truncated.
    pub rich_text_body: Option<String>,

    /// Parent identifier from `In-Reply-To`, without brackets.
    pub in_reply_to: Option<String>,

    /// Identifiers from `References`, oldest first. Never an empty list.
    pub references: Option<Vec<String>>,

    pub attachment_count: usize,
}

impl ParsedMessage {
    /// All recipients across To, CC and BCC.
    pub fn recipients(&self) -> impl Iterator<Item = &String> {
        [&self.to_address, &self.cc_address, &self.bcc_address]
            .into_iter()
            .flatten()
            .flat_map(|r| r.iter())
    }

    /// Number of references (0 when absent).
    pub fn reference_count(&self) -> usize {
        self.references.as_ref().map_or(0, Vec::len)
    }
}

/// A quoted ancestor message recovered from a reply body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubMessage {
    pub subject: Option<String>,
    pub sender_name: Option<String>,
    pub from_address: Option<String>,
    pub submit_time: Option<DateTime<Utc>>,
    pub receiver_name: Option<String>,
    pub to_address: Option<String>,
    pub body: String,
    /// Identifier from the reference chain this segment was matched to.
    pub global_message_id: Option<String>,
}

impl SubMessage {
    /// A segment with no recognized quote header.
    pub fn headerless(body: impl Into<String>, global_message_id: Option<String>) -> Self {
        Self {
            subject: None,
            sender_name: None,
            from_address: None,
            submit_time: None,
            receiver_name: None,
            to_address: None,
            body: body.into(),
            global_message_id,
        }
    }

    /// `true` if no header field was recovered for this segment.
    pub fn is_headerless(&self) -> bool {
        self.subject.is_none()
            && self.sender_name.is_none()
            && self.from_address.is_none()
            && self.submit_time.is_none()
            && self.receiver_name.is_none()
            && self.to_address.is_none()
    }
}

/// A parsed message plus thread, domain and content signals.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnrichedMessage {
    #[serde(flatten)]
    pub message: ParsedMessage,

    /// `true` iff both `in_reply_to` and `references` are absent.
    pub first_in_thread: bool,

    /// `references.len() + 1`; absent when there are no references.
    pub thread_position: Option<usize>,

    /// First entry of the reference list.
    pub thread_root_id: Option<String>,

    /// Seconds since the in-reply-to parent was submitted, if the parent is known.
    pub response_time_secs: Option<i64>,

    pub sender_domain: String,

    /// Unique domains of all recipients, sorted.
    pub recipient_domains: Vec<String>,

    /// Unique domains of sender and recipients, sorted.
    pub all_domains: Vec<String>,

    pub is_internal: bool,

    /// `"re:"`, `"fwd:"` or `"fw:"`.
    pub subject_prefix: Option<String>,

    /// Body with quoted history, signature and boilerplate removed.
    pub clean_text: Option<String>,

    /// ISO 639-1 code of the language of `clean_text`.
    pub language: Option<String>,

    pub sub_messages: Vec<SubMessage>,

    /// Label assigned by the injected text classifier.
    pub classification: Option<String>,
}

impl EnrichedMessage {
    pub fn global_message_id(&self) -> &str {
        &self.message.global_message_id
    }
}

/// A group of messages read from one folder.
///
/// Produced by [`crate::mailbox::walker::FolderWalker`] and consumed once by
/// the stage that follows.
#[derive(Debug)]
pub struct MessageBatch<M> {
    /// 1-based sequence number over the whole walk.
    pub sequence: u64,
    /// Folder the messages were read from.
    pub folder_path: String,
    pub messages: Vec<M>,
}

impl<M> MessageBatch<M> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
