//! Text classifier capability.
//!
//! The pipeline receives a classifier object from its caller and asks it for
//! a label per message text. Model-backed classifiers live outside this crate
//! and plug in through [`TextClassifier`].

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Assigns an optional label to a message text.
pub trait TextClassifier: Send + Sync {
    /// Label for `text`, or `None` when no label applies.
    ///
    /// An `Err` is logged by the caller and leaves the label absent.
    fn classify(&self, text: &str) -> Result<Option<String>>;
}

/// Never assigns a label.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClassifier;

impl TextClassifier for NoopClassifier {
    fn classify(&self, _text: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// One keyword rule: `label` applies when any keyword occurs in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRule {
    pub label: String,
    pub keywords: Vec<String>,
}

/// Case-insensitive keyword matcher. The first matching rule wins.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    rules: Vec<(String, Vec<String>)>,
}

impl RuleClassifier {
    pub fn new(rules: &[ClassifierRule]) -> Self {
        let rules = rules
            .iter()
            .filter(|r| !r.label.trim().is_empty())
            .map(|r| {
                let keywords = r
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (r.label.trim().to_string(), keywords)
            })
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl TextClassifier for RuleClassifier {
    fn classify(&self, text: &str) -> Result<Option<String>> {
        let lowered = text.to_lowercase();
        Ok(self
            .rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(label, _)| label.clone()))
    }
}

/// Build the classifier described by the configured rules.
pub fn from_rules(rules: &[ClassifierRule]) -> Box<dyn TextClassifier> {
    let classifier = RuleClassifier::new(rules);
    if classifier.is_empty() {
        Box::new(NoopClassifier)
    } else {
        Box::new(classifier)
    }
}
