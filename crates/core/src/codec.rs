// crates/core/src/codec.rs
//! Durable wire encoding for [`LoadStatus`].
//!
//! Layout, in order, big-endian, UTF-8:
//!
//! 1. lifecycle state symbolic name: u32 byte-length prefix + bytes
//! 2. tracking URL: u32 byte-length prefix + bytes
//! 3. stats: u32 pair count, then a length-prefixed key and value per entry
//! 4. counters: same shape as stats
//!
//! Map entries are written in ascending key order, so equal aggregates
//! encode to identical bytes. This four-field layout is frozen; a future
//! revision must wrap records in a versioned envelope rather than change the
//! field order.
//!
//! Table counters, the file map, progress, the failure message and the
//! engine result are not written. A decoded status has them at their
//! defaults; the runtime repopulates them after restart.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut};

use crate::error::DecodeError;
use crate::state::LoadState;
use crate::status::{DurableStatus, LoadStatus};

/// Encode the durable subset of `status`.
pub fn encode_status(status: &LoadStatus) -> Vec<u8> {
    let durable = &status.durable;
    let mut out = Vec::new();
    put_string(&mut out, durable.state.as_str());
    put_string(&mut out, &durable.tracking_url);
    put_string_map(&mut out, &durable.stats);
    put_string_map(&mut out, &durable.counters);
    out
}

/// Decode one status record from the front of `buf`.
///
/// Reads exactly the four durable fields and leaves any trailing bytes
/// unread, so records can be embedded in a larger journal buffer. An
/// unrecognized lifecycle name, a short buffer or a non-UTF-8 string all
/// fail the decode; nothing is silently defaulted.
pub fn decode_status<B: Buf>(buf: &mut B) -> Result<LoadStatus, DecodeError> {
    let name = get_string(buf, "state")?;
    let state = LoadState::parse_str(&name).ok_or(DecodeError::UnknownState { name })?;
    let tracking_url = get_string(buf, "tracking_url")?;
    let stats = get_string_map(buf, "stats")?;
    let counters = get_string_map(buf, "counters")?;

    Ok(LoadStatus::from_durable(DurableStatus {
        state,
        tracking_url,
        stats,
        counters,
    }))
}

/// Decode a record that occupies a buffer on its own.
pub fn decode_status_slice(mut bytes: &[u8]) -> Result<LoadStatus, DecodeError> {
    decode_status(&mut bytes)
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

fn put_string(out: &mut Vec<u8>, s: &str) {
    out.put_u32(s.len() as u32);
    out.put_slice(s.as_bytes());
}

fn put_string_map(out: &mut Vec<u8>, map: &BTreeMap<String, String>) {
    out.put_u32(map.len() as u32);
    for (key, value) in map {
        put_string(out, key);
        put_string(out, value);
    }
}

fn get_string<B: Buf>(buf: &mut B, field: &'static str) -> Result<String, DecodeError> {
    let len = get_u32(buf, field)? as usize;
    if buf.remaining() < len {
        return Err(DecodeError::Truncated {
            field,
            needed: len,
            remaining: buf.remaining(),
        });
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|source| DecodeError::InvalidUtf8 { field, source })
}

fn get_string_map<B: Buf>(
    buf: &mut B,
    field: &'static str,
) -> Result<BTreeMap<String, String>, DecodeError> {
    let count = get_u32(buf, field)?;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let key = get_string(buf, field)?;
        let value = get_string(buf, field)?;
        map.insert(key, value);
    }
    Ok(map)
}

fn get_u32<B: Buf>(buf: &mut B, field: &'static str) -> Result<u32, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::Truncated {
            field,
            needed: 4,
            remaining: buf.remaining(),
        });
    }
    Ok(buf.get_u32())
}
