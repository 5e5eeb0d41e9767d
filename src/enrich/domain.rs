//! Domain extraction and internal/external classification.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::message::ParsedMessage;

/// Which domains must match the internal marker for a message to count as internal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalPolicy {
    /// Only the sender's domain.
    #[default]
    SenderOnly,
    /// The sender and every recipient.
    AllDomains,
}

/// Everything after the last `@`, trimmed. Empty if there is no `@`.
pub fn domain_of(address: &str) -> String {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_string())
        .unwrap_or_default()
}

/// `true` iff `marker` occurs in `domain` (ASCII case-insensitive).
///
/// An empty marker never matches.
pub fn is_internal(domain: &str, marker: &str) -> bool {
    let marker = marker.trim();
    !marker.is_empty()
        && domain
            .to_ascii_lowercase()
            .contains(&marker.to_ascii_lowercase())
}

/// Sorted unique domains of all recipients.
pub fn recipient_domains(msg: &ParsedMessage) -> Vec<String> {
    collect_domains(msg.recipients().map(String::as_str))
}

/// Sorted unique domains of the sender and all recipients.
pub fn all_domains(msg: &ParsedMessage) -> Vec<String> {
    collect_domains(std::iter::once(msg.from_address.as_str()).chain(msg.recipients().map(String::as_str)))
}

fn collect_domains<'a>(addresses: impl Iterator<Item = &'a str>) -> Vec<String> {
    addresses
        .map(domain_of)
        .filter(|d| !d.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Apply `policy` to a message's domains.
pub fn classify_internal(
    policy: InternalPolicy,
    sender_domain: &str,
    all_domains: &[String],
    marker: &str,
) -> bool {
    match policy {
        InternalPolicy::SenderOnly => is_internal(sender_domain, marker),
        InternalPolicy::AllDomains => {
            !all_domains.is_empty() && all_domains.iter().all(|d| is_internal(d, marker))
        }
    }
}
