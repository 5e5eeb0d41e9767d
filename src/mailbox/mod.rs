//! Mailbox containers: folder hierarchies of raw messages.
//!
//! A container is read serially by [`walker::FolderWalker`] on the caller's
//! thread. Messages it hands out must be `Send` so batches can be parsed on
//! a worker pool.

pub mod mboxdir;
pub mod memory;
pub mod walker;

use crate::error::Result;

/// One raw message as stored by the container. Never mutated.
///
/// Bodies are raw bytes in the message's charset. Timestamps are FILETIME
/// integers (see [`crate::parser::timestamp`]).
pub trait RawMessage: Send {
    /// Identifier assigned by the container, unique within it.
    fn identifier(&self) -> u64;
    fn subject(&self) -> Option<&str>;
    fn sender_name(&self) -> Option<&str>;
    /// The raw transport header block.
    fn transport_headers(&self) -> Option<&str>;
    fn plain_text_body(&self) -> Option<&[u8]>;
    fn html_body(&self) -> Option<&[u8]>;
    fn rtf_body(&self) -> Option<&[u8]>;
    fn creation_time(&self) -> Option<u64>;
    fn submit_time(&self) -> Option<u64>;
    fn delivery_time(&self) -> Option<u64>;

    fn attachment_count(&self) -> usize {
        0
    }

    /// Charset of the body bytes when it differs from the one declared in
    /// `Content-Type`.
    fn body_charset(&self) -> Option<&str> {
        None
    }
}

/// A named folder holding messages and sub-folders.
pub trait MailFolder: Sized {
    type Message: RawMessage;

    fn name(&self) -> &str;

    /// Number of messages directly in this folder.
    fn message_count(&self) -> Result<usize>;

    /// Read the message at `index` (`0..message_count`).
    fn message(&self, index: usize) -> Result<Self::Message>;

    fn sub_folders(&self) -> Result<Vec<Self>>;
}

/// An opened mailbox container.
pub trait Mailbox {
    type Folder: MailFolder;

    /// Top-level folders. Failing here means the container is unusable.
    fn root_folders(&self) -> Result<Vec<Self::Folder>>;
}

/// Join a parent folder path and a child name with `/`.
pub fn join_folder_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}
