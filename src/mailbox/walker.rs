//! Lazy, batched traversal of a mailbox's folder hierarchy.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::message::MessageBatch;

use super::{join_folder_path, MailFolder, Mailbox};

/// Which folders the walk visits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Traversal {
    /// Top-level folders only.
    #[default]
    Flat,
    /// Every folder, depth-first, parents before children.
    Recursive,
}

/// A folder that could not be read, or a message that could not be loaded.
#[derive(Debug)]
pub struct FolderFailure {
    pub folder: String,
    pub error: Error,
}

/// Counters collected while walking.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub folders_walked: usize,
    pub folders_skipped: usize,
    pub messages_found: usize,
}

struct OpenFolder<F> {
    path: String,
    folder: F,
    count: usize,
    next_index: usize,
}

/// Pull-based iterator of [`MessageBatch`]es.
///
/// Batches never span folders, so a folder of N messages yields
/// ⌈N / batch_size⌉ batches. Folders reporting zero messages are skipped.
/// A folder that fails is logged, recorded in [`FolderWalker::failures`]
/// and skipped. Dropping the walker ends the walk.
pub struct FolderWalker<F: MailFolder> {
    batch_size: usize,
    traversal: Traversal,
    pending: Vec<(String, F)>,
    current: Option<OpenFolder<F>>,
    sequence: u64,
    failures: Vec<FolderFailure>,
    stats: WalkStats,
}

impl<F: MailFolder> FolderWalker<F> {
    /// Start a walk over `mailbox`.
    ///
    /// Fails only if the top-level folders cannot be listed. A `batch_size`
    /// of 0 is treated as 1.
    pub fn new<M>(mailbox: &M, batch_size: usize, traversal: Traversal) -> Result<Self>
    where
        M: Mailbox<Folder = F>,
    {
        let roots = mailbox.root_folders()?;
        let mut pending: Vec<(String, F)> = roots
            .into_iter()
            .map(|folder| (folder.name().to_string(), folder))
            .collect();
        pending.reverse();

        Ok(Self {
            batch_size: batch_size.max(1),
            traversal,
            pending,
            current: None,
            sequence: 0,
            failures: Vec::new(),
            stats: WalkStats::default(),
        })
    }

    pub fn failures(&self) -> &[FolderFailure] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<FolderFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    fn record_failure(&mut self, folder: &str, error: Error) {
        warn!(folder, batch = self.sequence + 1, error = %error, "Skipping unreadable folder content");
        self.failures.push(FolderFailure {
            folder: folder.to_string(),
            error,
        });
    }

    /// Open the next pending folder that has messages.
    fn open_next_folder(&mut self) -> bool {
        while let Some((path, folder)) = self.pending.pop() {
            if self.traversal == Traversal::Recursive {
                match folder.sub_folders() {
                    Ok(children) => {
                        for child in children.into_iter().rev() {
                            let child_path = join_folder_path(&path, child.name());
                            self.pending.push((child_path, child));
                        }
                    }
                    Err(e) => self.record_failure(&path, e),
                }
            }

            let count = match folder.message_count() {
                Ok(count) => count,
                Err(e) => {
                    self.stats.folders_skipped += 1;
                    self.record_failure(&path, e);
                    continue;
                }
            };

            if count == 0 {
                debug!(folder = %path, "Skipping empty folder");
                self.stats.folders_skipped += 1;
                continue;
            }

            info!(folder = %path, messages = count, "Walking folder");
            self.stats.folders_walked += 1;
            self.stats.messages_found += count;
            self.current = Some(OpenFolder {
                path,
                folder,
                count,
                next_index: 0,
            });
            return true;
        }
        false
    }
}

impl<F: MailFolder> Iterator for FolderWalker<F> {
    type Item = MessageBatch<F::Message>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() && !self.open_next_folder() {
                return None;
            }
            let Some(open) = self.current.as_mut() else {
                return None;
            };

            let mut messages = Vec::with_capacity(self.batch_size.min(open.count));
            let mut errors = Vec::new();
            while messages.len() < self.batch_size && open.next_index < open.count {
                let index = open.next_index;
                open.next_index += 1;
                match open.folder.message(index) {
                    Ok(message) => messages.push(message),
                    Err(e) => errors.push(e),
                }
            }

            let path = open.path.clone();
            if open.next_index >= open.count {
                self.current = None;
            }
            for error in errors {
                self.record_failure(&path, error);
            }

            if messages.is_empty() {
                continue;
            }

            self.sequence += 1;
            debug!(folder = %path, batch = self.sequence, size = messages.len(), "Yielding batch");
            return Some(MessageBatch {
                sequence: self.sequence,
                folder_path: path,
                messages,
            });
        }
    }
}
