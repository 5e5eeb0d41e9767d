//! Binary checkpoint file format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (128 bytes, fixed)            │
//! │  magic: [u8; 8] = b"MSIFTCK\0"       │
//! │  version: u32                        │
//! │  message_count: u64                  │
//! │  source_modified: i64                │
//! │  settings_fingerprint: u64           │
//! │  payload_sha256: [u8; 32]            │
//! │  (padding to 128 bytes)              │
//! ├──────────────────────────────────────┤
//! │ PAYLOAD (variable)                   │
//! │  bincode-serialized Checkpoint       │
//! │  (parsed messages + parse summary)   │
//! └──────────────────────────────────────┘
//! ```

/// Magic bytes identifying a mailsift checkpoint.
pub const MAGIC: &[u8; 8] = b"MSIFTCK\0";

/// Current checkpoint format version.
pub const VERSION: u32 = 2;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 128;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CheckpointHeader {
    /// Magic bytes (must equal [`MAGIC`]).
    pub magic: [u8; 8],
    /// Format version (must equal [`VERSION`]).
    pub version: u32,
    /// Number of messages in the payload.
    pub message_count: u64,
    /// Newest modification time under the source path (Unix seconds).
    pub source_modified: i64,
    /// Fingerprint of the settings the corpus was parsed with.
    pub settings_fingerprint: u64,
    /// SHA-256 of the payload bytes.
    pub payload_sha256: [u8; 32],
}

impl CheckpointHeader {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != *MAGIC {
            return Err("Invalid magic bytes".into());
        }
        if self.version != VERSION {
            return Err(format!(
                "Incompatible version: expected {VERSION}, found {}",
                self.version
            ));
        }
        Ok(())
    }
}
