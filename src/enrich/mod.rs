//! Per-message enrichment after threading.
//!
//! Combines a [`ParsedMessage`] with its [`ThreadInfo`] and derives domain,
//! subject, content, language and classification signals.

pub mod domain;
pub mod language;
pub mod text;

use tracing::warn;

use crate::classify::TextClassifier;
use crate::config::Config;
use crate::model::message::{EnrichedMessage, ParsedMessage};
use crate::split::split_sub_messages;
use crate::thread::{subject_prefix, ThreadInfo};

use self::domain::{classify_internal, domain_of, InternalPolicy};

/// Stateless enrichment settings taken from the configuration.
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    internal_marker: String,
    policy: InternalPolicy,
    boilerplate: Vec<String>,
}

impl Enricher {
    pub fn new(internal_marker: impl Into<String>, policy: InternalPolicy) -> Self {
        Self {
            internal_marker: internal_marker.into(),
            policy,
            boilerplate: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.domain.internal_domain_marker.clone(), config.domain.policy)
            .with_boilerplate(config.text.boilerplate.clone())
    }

    pub fn with_boilerplate(mut self, boilerplate: Vec<String>) -> Self {
        self.boilerplate = boilerplate;
        self
    }

    /// Build the enriched record.
    ///
    /// Sub-messages are recovered only from a plain-text body of a message
    /// that carries references; the chain handed to the splitter is the
    /// reference list followed by the message's own identifier. A classifier
    /// error is logged and leaves `classification` absent.
    pub fn enrich(
        &self,
        message: ParsedMessage,
        thread: ThreadInfo,
        classifier: &dyn TextClassifier,
    ) -> EnrichedMessage {
        let sender_domain = domain_of(&message.from_address);
        let recipient_domains = domain::recipient_domains(&message);
        let all_domains = domain::all_domains(&message);
        let is_internal = classify_internal(self.policy, &sender_domain, &all_domains, &self.internal_marker);

        let sub_messages = match (&message.plain_text_body, &message.references) {
            (Some(body), Some(references)) => {
                let mut chain = references.clone();
                chain.push(message.global_message_id.clone());
                split_sub_messages(body, &chain)
            }
            _ => Vec::new(),
        };

        let clean_text = message
            .plain_text_body
            .as_deref()
            .and_then(|body| text::clean_text(body, &self.boilerplate));

        let language = clean_text.as_deref().and_then(language::detect_language);

        let classification = clean_text.as_deref().and_then(|body| match classifier.classify(body) {
            Ok(label) => label,
            Err(e) => {
                warn!(
                    message_id = %message.global_message_id,
                    error = %e,
                    "Classifier failed, leaving label empty"
                );
                None
            }
        });

        EnrichedMessage {
            subject_prefix: subject_prefix(message.subject.as_deref()).map(str::to_string),
            message,
            first_in_thread: thread.first_in_thread,
            thread_position: thread.thread_position,
            thread_root_id: thread.thread_root_id,
            response_time_secs: thread.response_time_secs,
            sender_domain,
            recipient_domains,
            all_domains,
            is_internal,
            clean_text,
            language,
            sub_messages,
            classification,
        }
    }
}
