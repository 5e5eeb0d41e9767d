//! In-memory mailbox container, for embedding and tests.

use crate::error::{Error, Result};

use super::{MailFolder, Mailbox, RawMessage};

/// A raw message held in memory. Fields map one-to-one onto [`RawMessage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryMessage {
    pub identifier: u64,
    pub subject: Option<String>,
    pub sender_name: Option<String>,
    pub transport_headers: Option<String>,
    pub plain_text_body: Option<Vec<u8>>,
    pub html_body: Option<Vec<u8>>,
    pub rtf_body: Option<Vec<u8>>,
    pub creation_time: Option<u64>,
    pub submit_time: Option<u64>,
    pub delivery_time: Option<u64>,
    pub attachment_count: usize,
}

impl MemoryMessage {
    pub fn new(identifier: u64) -> Self {
        Self {
            identifier,
            ..Self::default()
        }
    }

    pub fn with_headers(mut self, headers: &str) -> Self {
        self.transport_headers = Some(headers.to_string());
        self
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn with_sender_name(mut self, name: &str) -> Self {
        self.sender_name = Some(name.to_string());
        self
    }

    pub fn with_plain_body(mut self, body: &str) -> Self {
        self.plain_text_body = Some(body.as_bytes().to_vec());
        self
    }

    pub fn with_html_body(mut self, body: &str) -> Self {
        self.html_body = Some(body.as_bytes().to_vec());
        self
    }

    pub fn with_submit_time(mut self, filetime: u64) -> Self {
        self.submit_time = Some(filetime);
        self
    }
}

impl RawMessage for MemoryMessage {
    fn identifier(&self) -> u64 {
        self.identifier
    }

    fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    fn sender_name(&self) -> Option<&str> {
        self.sender_name.as_deref()
    }

    fn transport_headers(&self) -> Option<&str> {
        self.transport_headers.as_deref()
    }

    fn plain_text_body(&self) -> Option<&[u8]> {
        self.plain_text_body.as_deref()
    }

    fn html_body(&self) -> Option<&[u8]> {
        self.html_body.as_deref()
    }

    fn rtf_body(&self) -> Option<&[u8]> {
        self.rtf_body.as_deref()
    }

    fn creation_time(&self) -> Option<u64> {
        self.creation_time
    }

    fn submit_time(&self) -> Option<u64> {
        self.submit_time
    }

    fn delivery_time(&self) -> Option<u64> {
        self.delivery_time
    }

    fn attachment_count(&self) -> usize {
        self.attachment_count
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFolder {
    pub name: String,
    pub messages: Vec<MemoryMessage>,
    pub children: Vec<MemoryFolder>,
    /// When set, every access to this folder fails with this reason.
    pub broken: Option<String>,
}

impl MemoryFolder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_messages(mut self, messages: Vec<MemoryMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_child(mut self, child: MemoryFolder) -> Self {
        self.children.push(child);
        self
    }

    /// A folder that cannot be enumerated.
    pub fn broken(name: &str, reason: &str) -> Self {
        Self {
            broken: Some(reason.to_string()),
            ..Self::new(name)
        }
    }

    fn check(&self) -> Result<()> {
        match &self.broken {
            Some(reason) => Err(Error::folder(&self.name, reason)),
            None => Ok(()),
        }
    }
}

impl MailFolder for MemoryFolder {
    type Message = MemoryMessage;

    fn name(&self) -> &str {
        &self.name
    }

    fn message_count(&self) -> Result<usize> {
        self.check()?;
        Ok(self.messages.len())
    }

    fn message(&self, index: usize) -> Result<MemoryMessage> {
        self.check()?;
        self.messages
            .get(index)
            .cloned()
            .ok_or_else(|| Error::folder(&self.name, format!("no message at index {index}")))
    }

    fn sub_folders(&self) -> Result<Vec<MemoryFolder>> {
        self.check()?;
        Ok(self.children.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMailbox {
    pub folders: Vec<MemoryFolder>,
}

impl MemoryMailbox {
    pub fn new(folders: Vec<MemoryFolder>) -> Self {
        Self { folders }
    }
}

impl Mailbox for MemoryMailbox {
    type Folder = MemoryFolder;

    fn root_folders(&self) -> Result<Vec<MemoryFolder>> {
        Ok(self.folders.clone())
    }
}
