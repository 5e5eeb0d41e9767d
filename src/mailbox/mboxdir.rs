//! Directory-of-mbox container.
//!
//! The layout written by common PST exporters and by Thunderbird:
//!
//! ```text
//! export/
//! ├── Inbox.mbox          folder "Inbox"
//! ├── Inbox/              sub-folders of "Inbox" (also accepted: Inbox.sbd/)
//! │   └── Projects.mbox   folder "Inbox/Projects"
//! └── Sent Items          extensionless mbox file, folder "Sent Items"
//! ```
//!
//! A directory with no matching mbox file becomes a folder with no messages
//! of its own. Opening a single mbox file yields one top-level folder.
//!
//! mbox has no FILETIME fields, so timestamps are derived: submit time from
//! the `Date` header, delivery time from the newest `Received` header.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mail_parser::{MessageParser, PartType};
use tracing::debug;

use crate::error::{Error, Result};
use crate::parser::date::parse_date;
use crate::parser::header::parse_content_type;
use crate::parser::mbox::{strip_envelope_line, MboxScanner, MessageSpan};
use crate::parser::timestamp::encode_filetime;

use super::{MailFolder, Mailbox, RawMessage};

const MBOX_EXTENSIONS: [&str; 2] = ["mbox", "mbx"];
const SUBFOLDER_DIR_SUFFIX: &str = ".sbd";

/// An opened directory (or single file) of mbox folders.
#[derive(Debug, Clone)]
pub struct MboxDirectory {
    root: PathBuf,
}

impl MboxDirectory {
    /// Open a container. Fails if `path` does not exist or is unreadable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&root).map_err(|e| Error::MailboxOpen {
            path: root.clone(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() && !metadata.is_file() {
            return Err(Error::MailboxOpen {
                path: root,
                reason: "not a file or directory".to_string(),
            });
        }
        Ok(Self { root })
    }
}

impl Mailbox for MboxDirectory {
    type Folder = MboxFolder;

    fn root_folders(&self) -> Result<Vec<MboxFolder>> {
        if self.root.is_file() {
            let name = self
                .root
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "mbox".to_string());
            return Ok(vec![MboxFolder::new(name, Some(self.root.clone()), None)]);
        }
        list_folders(&self.root).map_err(|e| Error::MailboxOpen {
            path: self.root.clone(),
            reason: e.to_string(),
        })
    }
}

/// Group the entries of `dir` into folders, sorted by name.
fn list_folders(dir: &Path) -> Result<Vec<MboxFolder>> {
    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut dirs: BTreeMap<String, PathBuf> = BTreeMap::new();

    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            let name = file_name
                .strip_suffix(SUBFOLDER_DIR_SUFFIX)
                .unwrap_or(&file_name)
                .to_string();
            dirs.insert(name, path);
        } else if path.is_file() {
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase());
            match extension.as_deref() {
                Some(ext) if MBOX_EXTENSIONS.contains(&ext) => {
                    let name = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or(file_name);
                    files.insert(name, path);
                }
                None => {
                    files.insert(file_name, path);
                }
                Some(_) => debug!(path = %path.display(), "Ignoring non-mbox file"),
            }
        }
    }

    let mut names: Vec<String> = files.keys().chain(dirs.keys()).cloned().collect();
    names.sort();
    names.dedup();

    Ok(names
        .into_iter()
        .map(|name| {
            let file = files.remove(&name);
            let children = dirs.remove(&name);
            MboxFolder::new(name, file, children)
        })
        .collect())
}

/// One folder: an optional mbox file plus an optional directory of children.
#[derive(Debug)]
pub struct MboxFolder {
    name: String,
    file: Option<PathBuf>,
    children: Option<PathBuf>,
    scanned: OnceCell<(MboxScanner, Vec<MessageSpan>)>,
}

impl MboxFolder {
    fn new(name: String, file: Option<PathBuf>, children: Option<PathBuf>) -> Self {
        Self {
            name,
            file,
            children,
            scanned: OnceCell::new(),
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    fn scan(&self) -> Result<Option<&(MboxScanner, Vec<MessageSpan>)>> {
        let Some(file) = &self.file else {
            return Ok(None);
        };
        if let Some(scanned) = self.scanned.get() {
            return Ok(Some(scanned));
        }
        let scanner = MboxScanner::new(file).map_err(|e| Error::folder(&self.name, e))?;
        let spans = scanner.spans().map_err(|e| Error::folder(&self.name, e))?;
        Ok(Some(self.scanned.get_or_init(|| (scanner, spans))))
    }
}

impl MailFolder for MboxFolder {
    type Message = MboxMessage;

    fn name(&self) -> &str {
        &self.name
    }

    fn message_count(&self) -> Result<usize> {
        Ok(self.scan()?.map_or(0, |(_, spans)| spans.len()))
    }

    fn message(&self, index: usize) -> Result<MboxMessage> {
        let (scanner, spans) = self
            .scan()?
            .ok_or_else(|| Error::folder(&self.name, "folder has no mbox file"))?;
        let span = spans
            .get(index)
            .copied()
            .ok_or_else(|| Error::folder(&self.name, format!("no message at index {index}")))?;
        let raw = scanner
            .read_span(span)
            .map_err(|e| Error::folder(&self.name, e))?;
        Ok(MboxMessage::from_bytes(span.offset, &raw))
    }

    fn sub_folders(&self) -> Result<Vec<MboxFolder>> {
        match &self.children {
            Some(dir) => list_folders(dir).map_err(|e| Error::folder(&self.name, e)),
            None => Ok(Vec::new()),
        }
    }
}

/// A message read from an mbox file and decoded with `mail-parser`.
///
/// Bodies are handed out re-encoded in the charset declared by the
/// top-level `Content-Type`, matching what a native container stores.
/// Charsets that cannot be encoded to (UTF-16) are handed out as UTF-8 and
/// reported through [`RawMessage::body_charset`].
#[derive(Debug, Clone, Default)]
pub struct MboxMessage {
    offset: u64,
    subject: Option<String>,
    sender_name: Option<String>,
    headers: Option<String>,
    plain: Option<Vec<u8>>,
    html: Option<Vec<u8>>,
    submit_time: Option<u64>,
    delivery_time: Option<u64>,
    attachments: usize,
    body_charset: Option<String>,
}

impl MboxMessage {
    /// Decode one raw message. `offset` becomes the message identifier.
    pub fn from_bytes(offset: u64, raw: &[u8]) -> Self {
        let bytes = strip_envelope_line(raw);
        let headers = header_block(bytes);
        let mut message = Self {
            offset,
            headers: Some(headers.clone()).filter(|h| !h.trim().is_empty()),
            ..Self::default()
        };

        let Some(parsed) = MessageParser::default().parse(bytes) else {
            debug!(offset, "mail-parser could not parse message, keeping headers only");
            return message;
        };

        let (_, charset) = parse_content_type(find_header(&headers, "content-type").as_deref());
        let encoding = body_encoding(charset.as_deref());
        if is_decode_only(charset.as_deref()) {
            message.body_charset = Some(encoding.name().to_ascii_lowercase());
        }

        message.subject = parsed.subject().map(str::to_string);
        message.sender_name = parsed
            .from()
            .and_then(|from| from.first())
            .and_then(|addr| addr.name())
            .map(str::to_string);
        message.plain = first_body(&parsed, &parsed.text_body, false).map(|t| encode_body(&t, encoding));
        message.html = first_body(&parsed, &parsed.html_body, true).map(|t| encode_body(&t, encoding));
        message.attachments = parsed.attachment_count();

        message.submit_time = find_header(&headers, "date")
            .and_then(|d| parse_date(&d))
            .and_then(|dt| encode_filetime(&dt));
        message.delivery_time = find_header(&headers, "received")
            .and_then(|r| r.rsplit_once(';').map(|(_, date)| date.to_string()))
            .and_then(|d| parse_date(&d))
            .and_then(|dt| encode_filetime(&dt));

        message
    }
}

/// Text of the first body part of the wanted kind.
///
/// mail-parser lists the HTML part under `text_body` when a message has no
/// plain part; that case must not count as a plain body.
fn first_body(
    parsed: &mail_parser::Message<'_>,
    part_ids: &[mail_parser::MessagePartId],
    want_html: bool,
) -> Option<String> {
    let part = parsed.part(*part_ids.first()? as usize)?;
    match (&part.body, want_html) {
        (PartType::Text(text), false) | (PartType::Html(text), true) => Some(text.to_string()),
        _ => None,
    }
}

fn declared_encoding(charset: Option<&str>) -> Option<&'static encoding_rs::Encoding> {
    charset.and_then(|c| encoding_rs::Encoding::for_label(c.trim().as_bytes()))
}

/// Declared charsets `encoding_rs` only decodes (UTF-16, `replacement`).
fn is_decode_only(charset: Option<&str>) -> bool {
    declared_encoding(charset).is_some_and(|e| e.output_encoding() != e)
}

/// Encoding the bodies are handed out in: the declared one when it can be
/// encoded to, else UTF-8.
fn body_encoding(charset: Option<&str>) -> &'static encoding_rs::Encoding {
    declared_encoding(charset)
        .map(encoding_rs::Encoding::output_encoding)
        .unwrap_or(encoding_rs::UTF_8)
}

fn encode_body(text: &str, encoding: &'static encoding_rs::Encoding) -> Vec<u8> {
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

/// The header block of a message, up to the first blank line.
fn header_block(bytes: &[u8]) -> String {
    let end = find_subslice(bytes, b"\r\n\r\n")
        .map(|p| p + 2)
        .or_else(|| find_subslice(bytes, b"\n\n").map(|p| p + 1))
        .unwrap_or(bytes.len());
    let (text, _, _) = encoding_rs::UTF_8.decode(&bytes[..end]);
    text.into_owned()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// First occurrence of a header in a raw block, unfolded.
fn find_header(headers: &str, name: &str) -> Option<String> {
    let mut value: Option<String> = None;
    for line in headers.lines() {
        match value.as_mut() {
            Some(v) if line.starts_with(' ') || line.starts_with('\t') => {
                v.push(' ');
                v.push_str(line.trim());
            }
            Some(_) => break,
            None => {
                if let Some((key, rest)) = line.split_once(':') {
                    if key.trim().eq_ignore_ascii_case(name) {
                        value = Some(rest.trim().to_string());
                    }
                }
            }
        }
    }
    value
}

impl RawMessage for MboxMessage {
    fn identifier(&self) -> u64 {
        self.offset
    }

    fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    fn sender_name(&self) -> Option<&str> {
        self.sender_name.as_deref()
    }

    fn transport_headers(&self) -> Option<&str> {
        self.headers.as_deref()
    }

    fn plain_text_body(&self) -> Option<&[u8]> {
        self.plain.as_deref()
    }

    fn html_body(&self) -> Option<&[u8]> {
        self.html.as_deref()
    }

    fn rtf_body(&self) -> Option<&[u8]> {
        None
    }

    fn creation_time(&self) -> Option<u64> {
        None
    }

    fn submit_time(&self) -> Option<u64> {
        self.submit_time
    }

    fn delivery_time(&self) -> Option<u64> {
        self.delivery_time
    }

    fn attachment_count(&self) -> usize {
        self.attachments
    }

    fn body_charset(&self) -> Option<&str> {
        self.body_charset.as_deref()
    }
}
