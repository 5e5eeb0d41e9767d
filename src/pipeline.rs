//! The outer loop: walk, parse in parallel, thread, enrich.
//!
//! ```text
//! FolderWalker ──batch──▶ rayon pool (MessageBuilder) ──▶ corpus
//!                                                          │ barrier
//!                        compute_threading / missing ancestors
//!                                                          │
//!                        rayon pool (Enricher + classifier) ──▶ PipelineOutput
//! ```
//!
//! The walker reads the container on the calling thread. Parse results are
//! merged after each parallel map, so nothing is shared mutably between
//! workers.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checkpoint::{self, Checkpoint};
use crate::classify::TextClassifier;
use crate::config::Config;
use crate::enrich::Enricher;
use crate::error::{Result, ValidationError};
use crate::mailbox::walker::FolderWalker;
use crate::mailbox::{Mailbox, RawMessage};
use crate::model::message::{EnrichedMessage, MessageBatch, ParsedMessage};
use crate::parser::builder::MessageBuilder;
use crate::store::{SubMessageRecord, TextRecord};
use crate::thread::{compute_threading, find_missing_ancestors};

/// A folder that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderError {
    pub folder: String,
    pub error: String,
}

/// A message that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageError {
    pub folder: String,
    pub provider_email_id: u64,
    pub error: String,
}

/// What the parse phase observed, kept with a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseSummary {
    pub messages_found: usize,
    pub folders_walked: usize,
    pub folders_skipped: usize,
    pub batches: u64,
    pub folder_errors: Vec<FolderError>,
    pub message_errors: Vec<MessageError>,
}

/// Run summary for operator review.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Messages the container reported across walked folders.
    pub messages_found: usize,
    pub messages_parsed: usize,
    pub folders_walked: usize,
    pub folders_skipped: usize,
    pub batches: u64,
    /// `true` when the parsed corpus came from a checkpoint.
    pub from_checkpoint: bool,
    pub missing_ancestors: usize,
    pub folder_errors: Vec<FolderError>,
    pub message_errors: Vec<MessageError>,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl RunReport {
    fn apply_parse_summary(&mut self, summary: ParseSummary) {
        self.messages_found = summary.messages_found;
        self.folders_walked = summary.folders_walked;
        self.folders_skipped = summary.folders_skipped;
        self.batches = summary.batches;
        self.folder_errors = summary.folder_errors;
        self.message_errors = summary.message_errors;
    }
}

mod duration_millis {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Everything a run produces.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub messages: Vec<EnrichedMessage>,
    /// Identifiers referenced in the corpus but not present in it.
    pub missing_ancestors: BTreeSet<String>,
    pub report: RunReport,
}

impl PipelineOutput {
    /// `(message_id, text)` pairs for text consumers, one per message with
    /// non-empty clean text.
    pub fn text_pairs(&self) -> impl Iterator<Item = TextRecord> + '_ {
        self.messages.iter().filter_map(|m| {
            m.clean_text.as_ref().map(|text| TextRecord {
                message_id: m.message.global_message_id.clone(),
                text: text.clone(),
            })
        })
    }

    /// Every recovered sub-message, keyed by parent and position.
    pub fn sub_messages(&self) -> impl Iterator<Item = SubMessageRecord> + '_ {
        self.messages.iter().flat_map(|m| {
            m.sub_messages
                .iter()
                .enumerate()
                .map(|(position, sub)| SubMessageRecord {
                    parent_message_id: m.message.global_message_id.clone(),
                    position,
                    sub_message: sub.clone(),
                })
        })
    }
}

/// Parse progress: messages parsed so far and the current batch number.
pub type Progress<'a> = &'a dyn Fn(u64, u64);

pub struct Pipeline {
    config: Config,
    builder: MessageBuilder,
    enricher: Enricher,
    classifier: Box<dyn TextClassifier>,
    pool: Option<rayon::ThreadPool>,
    checkpoint: Option<(PathBuf, PathBuf)>,
}

impl Pipeline {
    /// A pipeline with its own worker pool of `config.pipeline.workers` threads.
    pub fn new(config: Config, classifier: Box<dyn TextClassifier>) -> Self {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.pipeline.workers)
            .thread_name(|i| format!("mailsift-worker-{i}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "Could not build worker pool, using the global pool");
                None
            }
        };

        Self {
            builder: MessageBuilder::new(config.pipeline.max_body_length),
            enricher: Enricher::from_config(&config),
            config,
            classifier,
            pool,
            checkpoint: None,
        }
    }

    /// Reuse and refresh the parsed corpus of `source` at `ckpt_path`.
    pub fn with_checkpoint(mut self, ckpt_path: PathBuf, source: PathBuf) -> Self {
        self.checkpoint = Some((ckpt_path, source));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run<M: Mailbox>(&self, mailbox: &M) -> Result<PipelineOutput> {
        self.run_with_progress(mailbox, None)
    }

    /// Run the whole pipeline over `mailbox`.
    ///
    /// Only a container whose top-level folders cannot be listed fails the
    /// run. Folder and message failures are recorded in the report.
    pub fn run_with_progress<M: Mailbox>(
        &self,
        mailbox: &M,
        progress: Option<Progress<'_>>,
    ) -> Result<PipelineOutput> {
        let started = Instant::now();
        let mut report = RunReport::default();

        let fingerprint = self.parse_settings_fingerprint();
        let cached = match &self.checkpoint {
            Some((ckpt_path, source)) => checkpoint::load(ckpt_path, source, fingerprint).unwrap_or_else(|e| {
                warn!(error = %e, "Could not read checkpoint, rebuilding");
                None
            }),
            None => None,
        };

        let Checkpoint { messages: corpus, summary } = match cached {
            Some(stored) => {
                report.from_checkpoint = true;
                stored
            }
            None => {
                let parsed = self.parse_corpus(mailbox, progress)?;
                if let Some((ckpt_path, source)) = &self.checkpoint {
                    if let Err(e) = checkpoint::save(ckpt_path, source, fingerprint, &parsed) {
                        warn!(error = %e, "Could not write checkpoint; continuing without it");
                    }
                }
                parsed
            }
        };
        report.apply_parse_summary(summary);
        report.messages_parsed = corpus.len();

        let threads = compute_threading(&corpus);
        let missing_ancestors = find_missing_ancestors(&corpus);
        report.missing_ancestors = missing_ancestors.len();
        debug!(missing = missing_ancestors.len(), "Threading complete");

        let classifier = self.classifier.as_ref();
        let messages = self.install(|| {
            corpus
                .into_par_iter()
                .zip(threads.into_par_iter())
                .map(|(message, thread)| self.enricher.enrich(message, thread, classifier))
                .collect::<Vec<_>>()
        });

        report.elapsed = started.elapsed();
        info!(
            found = report.messages_found,
            parsed = report.messages_parsed,
            folder_errors = report.folder_errors.len(),
            message_errors = report.message_errors.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Pipeline finished"
        );

        Ok(PipelineOutput {
            messages,
            missing_ancestors,
            report,
        })
    }

    /// Settings that change what the parse phase produces.
    fn parse_settings_fingerprint(&self) -> u64 {
        let pipeline = &self.config.pipeline;
        checkpoint::settings_fingerprint(&(
            pipeline.traversal,
            pipeline.max_body_length as u64,
            pipeline.batch_size as u64,
        ))
    }

    /// Walk the container and build every message. The corpus is in walk
    /// order.
    fn parse_corpus<M: Mailbox>(&self, mailbox: &M, progress: Option<Progress<'_>>) -> Result<Checkpoint> {
        let mut summary = ParseSummary::default();
        let mut walker = FolderWalker::new(
            mailbox,
            self.config.pipeline.batch_size,
            self.config.pipeline.traversal,
        )?;
        let mut corpus = Vec::new();

        for batch in walker.by_ref() {
            let MessageBatch {
                sequence,
                folder_path,
                messages,
            } = batch;
            let batch_len = messages.len();

            let results = self.parse_batch(messages, &folder_path);
            for (provider_email_id, result) in results {
                match result {
                    Ok(parsed) => corpus.push(parsed),
                    Err(e) => {
                        warn!(
                            folder = %folder_path,
                            batch = sequence,
                            provider_id = provider_email_id,
                            error = %e,
                            "Skipping invalid message"
                        );
                        summary.message_errors.push(MessageError {
                            folder: folder_path.clone(),
                            provider_email_id,
                            error: e.to_string(),
                        });
                    }
                }
            }

            summary.batches = sequence;
            info!(folder = %folder_path, batch = sequence, messages = batch_len, "Batch parsed");
            if let Some(cb) = progress {
                cb(corpus.len() as u64, sequence);
            }
        }

        let stats = walker.stats();
        summary.messages_found = stats.messages_found;
        summary.folders_walked = stats.folders_walked;
        summary.folders_skipped = stats.folders_skipped;
        summary.folder_errors = walker
            .take_failures()
            .into_iter()
            .map(|f| FolderError {
                folder: f.folder,
                error: f.error.to_string(),
            })
            .collect();

        Ok(Checkpoint {
            messages: corpus,
            summary,
        })
    }

    fn parse_batch<R: RawMessage>(
        &self,
        messages: Vec<R>,
        folder_path: &str,
    ) -> Vec<(u64, std::result::Result<ParsedMessage, ValidationError>)> {
        self.install(|| {
            messages
                .into_par_iter()
                .map(|raw| (raw.identifier(), self.builder.build(&raw, folder_path)))
                .collect()
        })
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}
