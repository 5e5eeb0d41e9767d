//! Thread reconstruction over a whole parsed corpus.
//!
//! Position and root come from each message's own `References` list; the
//! corpus is only consulted for identifier lookups (reply parents and
//! missing ancestors). Reference chains are never walked, so repeated or
//! self-referencing identifiers cannot loop.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::model::message::ParsedMessage;

/// Thread signals for one message, in corpus order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
    /// No `In-Reply-To` and no `References`.
    pub first_in_thread: bool,
    /// `references.len() + 1`; `None` without references, even for replies
    /// that carry only `In-Reply-To`.
    pub thread_position: Option<usize>,
    /// Oldest entry of `References`.
    pub thread_root_id: Option<String>,
    /// Seconds between the parent's submit time and this message's, when the
    /// parent is in the corpus and both times are known. Negative under
    /// clock skew.
    pub response_time_secs: Option<i64>,
}

/// Annotate every message with its thread signals.
///
/// The result is index-aligned with `messages`. When several messages share
/// a `global_message_id`, the first one is used as the reply parent.
pub fn compute_threading(messages: &[ParsedMessage]) -> Vec<ThreadInfo> {
    let mut by_id: HashMap<&str, &ParsedMessage> = HashMap::with_capacity(messages.len());
    for msg in messages {
        by_id.entry(msg.global_message_id.as_str()).or_insert(msg);
    }

    messages
        .iter()
        .map(|msg| {
            let references = msg.references.as_deref().filter(|r| !r.is_empty());
            let response_time_secs = msg
                .in_reply_to
                .as_deref()
                .and_then(|parent_id| by_id.get(parent_id))
                .filter(|parent| parent.global_message_id != msg.global_message_id)
                .and_then(|parent| Some((msg.submit_time? - parent.submit_time?).num_seconds()));

            ThreadInfo {
                first_in_thread: msg.in_reply_to.is_none() && references.is_none(),
                thread_position: references.map(|r| r.len() + 1),
                thread_root_id: references.and_then(|r| r.first().cloned()),
                response_time_secs,
            }
        })
        .collect()
}

/// Identifiers referenced by some message but absent from the corpus.
///
/// Forwards (`fw:`/`fwd:` subjects) are exempt: their history predates the
/// mailbox and is not expected to resolve locally.
pub fn find_missing_ancestors(messages: &[ParsedMessage]) -> BTreeSet<String> {
    let known: HashSet<&str> = messages
        .iter()
        .map(|m| m.global_message_id.as_str())
        .collect();

    let mut missing = BTreeSet::new();
    for msg in messages {
        if is_forward(msg.subject.as_deref()) {
            continue;
        }
        let ancestors = msg
            .references
            .iter()
            .flatten()
            .chain(msg.in_reply_to.iter());
        for id in ancestors {
            if !known.contains(id.as_str()) {
                missing.insert(id.clone());
            }
        }
    }
    missing
}

static PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();

fn prefix_regex() -> &'static Regex {
    PREFIX_REGEX.get_or_init(|| Regex::new(r"(?i)^\s*(re|fwd|fw)\s*:").expect("valid subject prefix regex"))
}

/// Reply/forward marker at the start of a subject: `"re:"`, `"fwd:"` or `"fw:"`.
pub fn subject_prefix(subject: Option<&str>) -> Option<&'static str> {
    let caps = prefix_regex().captures(subject?)?;
    match caps[1].to_ascii_lowercase().as_str() {
        "re" => Some("re:"),
        "fwd" => Some("fwd:"),
        "fw" => Some("fw:"),
        _ => None,
    }
}

pub fn is_forward(subject: Option<&str>) -> bool {
    matches!(subject_prefix(subject), Some("fwd:" | "fw:"))
}
