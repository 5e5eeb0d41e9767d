//! Streaming MBOX scanner.
//!
//! Locates message boundaries line by line through a buffered reader and
//! never holds more than one line in memory. Messages are read back later
//! by seeking to their recorded span.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Messages larger than this are read back truncated.
const MAX_MESSAGE_SIZE: u64 = 256 * 1024 * 1024;

/// Location of one message inside an MBOX file, `From ` line included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpan {
    pub offset: u64,
    pub length: u64,
}

/// Boundary scanner for a single MBOX file.
///
/// Tolerates mixed `\n` / `\r\n` line endings, `From ` lines without a
/// preceding blank line (logged), a UTF-8 BOM and truncated trailing
/// messages.
#[derive(Debug, Clone)]
pub struct MboxScanner {
    path: PathBuf,
    file_size: u64,
}

impl MboxScanner {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Self {
            path,
            file_size: metadata.len(),
        })
    }

    /// Scan the whole file and return the span of every message, in file order.
    pub fn spans(&self) -> Result<Vec<MessageSpan>> {
        let mut spans = Vec::new();
        if self.file_size == 0 {
            return Ok(spans);
        }

        let file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut current_offset: u64 = 0;
        let mut message_start: Option<u64> = None;
        let mut prev_line_was_empty = true;
        let mut first_line = true;
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            let line_len = reader
                .read_until(b'\n', &mut line_buf)
                .map_err(|e| Error::io(&self.path, e))? as u64;
            if line_len == 0 {
                break;
            }

            if is_mbox_separator(&line_buf) {
                if !first_line && !prev_line_was_empty {
                    warn!(
                        path = %self.path.display(),
                        offset = current_offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                if let Some(start) = message_start {
                    spans.push(MessageSpan {
                        offset: start,
                        length: current_offset - start,
                    });
                }
                message_start = Some(current_offset);
            } else if first_line {
                warn!(path = %self.path.display(), "File does not start with a 'From ' line");
                message_start = Some(0);
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            first_line = false;
            current_offset += line_len;
        }

        if let Some(start) = message_start {
            if current_offset > start {
                spans.push(MessageSpan {
                    offset: start,
                    length: current_offset - start,
                });
            }
        }

        Ok(spans)
    }

    /// Read one message by span.
    pub fn read_span(&self, span: MessageSpan) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        file.seek(SeekFrom::Start(span.offset))
            .map_err(|e| Error::io(&self.path, e))?;
        let length = span.length.min(MAX_MESSAGE_SIZE);
        if length < span.length {
            warn!(
                path = %self.path.display(),
                offset = span.offset,
                max_size = MAX_MESSAGE_SIZE,
                "Message exceeds maximum size, truncating"
            );
        }
        let mut buffer = vec![0u8; length as usize];
        file.read_exact(&mut buffer)
            .map_err(|e| Error::io(&self.path, e))?;
        Ok(buffer)
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

/// Drop the leading `From ` envelope line, if any.
pub fn strip_envelope_line(raw: &[u8]) -> &[u8] {
    if !is_mbox_separator(raw) {
        return raw;
    }
    match raw.iter().position(|&b| b == b'\n') {
        Some(pos) => &raw[pos + 1..],
        None => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_mbox(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n"));
        assert!(!is_mbox_separator(b">From user@example.com\n"));
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn test_is_mbox_separator_with_bom() {
        let mut line = vec![0xEF, 0xBB, 0xBF];
        line.extend_from_slice(b"From user@example.com Thu Jan 01 00:00:00 2024\n");
        assert!(is_mbox_separator(&line));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(is_blank_line(b"  \n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_spans_and_read_back() {
        let first = b"From a@x.com Mon Jan  1 00:00:00 2018\nSubject: one\n\nbody one\n\n";
        let second = b"From b@x.com Mon Jan  1 00:00:00 2018\r\nSubject: two\r\n\r\nbody two\r\n";
        let mut content = first.to_vec();
        content.extend_from_slice(second);
        let file = write_mbox(&content);

        let scanner = MboxScanner::new(file.path()).unwrap();
        let spans = scanner.spans().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], MessageSpan { offset: 0, length: first.len() as u64 });
        assert_eq!(spans[1].offset, first.len() as u64);

        let raw = scanner.read_span(spans[1]).unwrap();
        assert_eq!(raw, second.to_vec());
    }

    #[test]
    fn test_empty_file() {
        let file = write_mbox(b"");
        assert!(MboxScanner::new(file.path()).unwrap().spans().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MboxScanner::new("/nonexistent/file.mbox"),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_strip_envelope_line() {
        assert_eq!(
            strip_envelope_line(b"From a@x.com Mon\nSubject: s\n"),
            b"Subject: s\n"
        );
        assert_eq!(strip_envelope_line(b"Subject: s\n"), b"Subject: s\n");
    }
}
