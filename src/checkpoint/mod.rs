//! Persist and reload the parsed corpus between runs.
//!
//! A checkpoint lives at `<cache>/<sha256 of source path>.ckpt` and is reused
//! only while its header validates, the parse settings are unchanged, the
//! source tree has not been modified since it was written, and the payload
//! hash matches. It carries the parse summary along with the messages so a
//! reused run reports the same counts and failures as the run that wrote it.

pub mod format;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::message::ParsedMessage;
use crate::pipeline::ParseSummary;

use self::format::{CheckpointHeader, HEADER_SIZE, MAGIC, VERSION};

/// Checkpoint file for `source` inside `cache_dir`.
pub fn checkpoint_path(cache_dir: &Path, source: &Path) -> PathBuf {
    let source = source.canonicalize().unwrap_or_else(|_| source.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(source.to_string_lossy().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    cache_dir.join(format!("{hash}.ckpt"))
}

/// The persisted parse phase of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub messages: Vec<ParsedMessage>,
    pub summary: ParseSummary,
}

/// Stable fingerprint of the settings a corpus was parsed with.
pub fn settings_fingerprint<T: Serialize>(settings: &T) -> u64 {
    let bytes = bincode::serialize(settings).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

/// Write `checkpoint` for `source`, parsed with the settings of `fingerprint`.
pub fn save(ckpt_path: &Path, source: &Path, fingerprint: u64, checkpoint: &Checkpoint) -> Result<()> {
    let payload = bincode::serialize(checkpoint).map_err(|e| checkpoint_error(ckpt_path, e))?;
    let header = CheckpointHeader {
        magic: *MAGIC,
        version: VERSION,
        message_count: checkpoint.messages.len() as u64,
        source_modified: source_modified(source),
        settings_fingerprint: fingerprint,
        payload_sha256: Sha256::digest(&payload).into(),
    };
    let header_bytes = bincode::serialize(&header).map_err(|e| checkpoint_error(ckpt_path, e))?;

    let mut padded_header = vec![0u8; HEADER_SIZE];
    let copy_len = header_bytes.len().min(HEADER_SIZE);
    padded_header[..copy_len].copy_from_slice(&header_bytes[..copy_len]);

    if let Some(parent) = ckpt_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut file = File::create(ckpt_path).map_err(|e| Error::io(ckpt_path, e))?;
    file.write_all(&padded_header)
        .map_err(|e| Error::io(ckpt_path, e))?;
    file.write_all(&payload).map_err(|e| Error::io(ckpt_path, e))?;
    file.flush().map_err(|e| Error::io(ckpt_path, e))?;

    info!(
        path = %ckpt_path.display(),
        messages = checkpoint.messages.len(),
        "Checkpoint written"
    );
    Ok(())
}

/// Load the checkpoint for `source` parsed with the settings of `fingerprint`.
///
/// Returns `Ok(None)` when the file is missing, stale or fails validation,
/// so the caller rebuilds. Only a read failure on an existing file is an
/// error.
pub fn load(ckpt_path: &Path, source: &Path, fingerprint: u64) -> Result<Option<Checkpoint>> {
    if !ckpt_path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(ckpt_path).map_err(|e| Error::io(ckpt_path, e))?;

    if data.len() < HEADER_SIZE {
        debug!("Checkpoint file too small");
        return Ok(None);
    }

    let header: CheckpointHeader = match bincode::deserialize(&data[..HEADER_SIZE]) {
        Ok(header) => header,
        Err(e) => {
            debug!(error = %e, "Checkpoint header unreadable");
            return Ok(None);
        }
    };
    if let Err(reason) = header.validate() {
        debug!(reason = %reason, "Checkpoint header invalid");
        return Ok(None);
    }

    if header.settings_fingerprint != fingerprint {
        debug!("Checkpoint written with different parse settings");
        return Ok(None);
    }

    if header.source_modified != source_modified(source) {
        debug!("Source modified since checkpoint");
        return Ok(None);
    }

    let payload = &data[HEADER_SIZE..];
    let hash: [u8; 32] = Sha256::digest(payload).into();
    if hash != header.payload_sha256 {
        debug!("Checkpoint payload hash mismatch");
        return Ok(None);
    }

    let checkpoint: Checkpoint = match bincode::deserialize(payload) {
        Ok(checkpoint) => checkpoint,
        Err(e) => {
            debug!(error = %e, "Checkpoint payload unreadable");
            return Ok(None);
        }
    };
    if checkpoint.messages.len() as u64 != header.message_count {
        debug!("Checkpoint message count mismatch");
        return Ok(None);
    }

    info!(
        path = %ckpt_path.display(),
        messages = checkpoint.messages.len(),
        "Checkpoint loaded"
    );
    Ok(Some(checkpoint))
}

/// Newest modification time of `path` and everything below it, in Unix seconds.
fn source_modified(path: &Path) -> i64 {
    let own = std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    if !path.is_dir() {
        return own;
    }
    std::fs::read_dir(path)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| source_modified(&entry.path()))
        .fold(own, i64::max)
}

fn checkpoint_error(path: &Path, e: impl ToString) -> Error {
    Error::Checkpoint {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
