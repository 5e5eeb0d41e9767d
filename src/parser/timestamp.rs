//! FILETIME codec: 100-nanosecond intervals since 1601-01-01T00:00:00Z.
//!
//! Mailbox containers store creation, submit and delivery times in this
//! form. Decoding divides by 10 (microsecond resolution), so
//! `encode(decode(x)) == x - x % 10`.

use chrono::{DateTime, Utc};

/// Microseconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET_MICROS: i64 = 11_644_473_600 * 1_000_000;

/// Decode a raw FILETIME integer.
///
/// Absent or zero input yields `None`; any other value maps to a UTC
/// timestamp on or after 1601-01-01.
pub fn decode_filetime(raw: Option<u64>) -> Option<DateTime<Utc>> {
    let raw = raw.filter(|&t| t != 0)?;
    // u64::MAX / 10 fits in i64.
    let micros = (raw / 10) as i64 - FILETIME_UNIX_OFFSET_MICROS;
    DateTime::from_timestamp_micros(micros)
}

/// Encode a timestamp as a FILETIME integer.
///
/// Returns `None` for instants before 1601-01-01. Sub-100ns precision is
/// dropped.
pub fn encode_filetime(dt: &DateTime<Utc>) -> Option<u64> {
    let micros = dt.timestamp_micros().checked_add(FILETIME_UNIX_OFFSET_MICROS)?;
    if micros < 0 {
        return None;
    }
    let sub_micro_intervals = u64::from(dt.timestamp_subsec_nanos() % 1_000) / 100;
    (micros as u64)
        .checked_mul(10)?
        .checked_add(sub_micro_intervals)
}
