//! Archive wire format primitives (spec.md §4.4): magic/version header
//! and the length-prefixed string/byte helpers every record uses.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use utils::{CoreError, CoreResult};

pub const MAGIC: &[u8; 4] = b"DVRA";
pub const MIN_SUPPORTED_VERSION: u32 = 1;
pub const MAX_SUPPORTED_VERSION: u32 = 1;
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Array = 0,
    Object = 1,
    ObjectRefOnly = 2,
}

impl RecordKind {
    pub fn from_byte(b: u8) -> CoreResult<RecordKind> {
        Ok(match b {
            0 => RecordKind::Array,
            1 => RecordKind::Object,
            2 => RecordKind::ObjectRefOnly,
            other => return Err(CoreError::ConsistencyError(format!("unknown record kind {other}"))),
        })
    }
}

pub fn write_header(out: &mut Vec<u8>) {
    out.extend_from_slice(MAGIC);
    out.write_u8(0).unwrap(); // endian flag: 0 == little-endian, the only form this writer emits
    out.write_u32::<LittleEndian>(CURRENT_VERSION).unwrap();
}

pub fn read_header(cursor: &mut Cursor<&[u8]>) -> CoreResult<u32> {
    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic).map_err(|_| CoreError::ConsistencyError("truncated archive header".to_string()))?;
    if &magic != MAGIC {
        return Err(CoreError::ConsistencyError("bad archive magic".to_string()));
    }
    let endian = cursor.read_u8().map_err(|_| CoreError::ConsistencyError("truncated archive header".to_string()))?;
    if endian != 0 {
        return Err(CoreError::ConsistencyError(format!("unsupported endian flag {endian}")));
    }
    let version = cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated archive header".to_string()))?;
    if version < MIN_SUPPORTED_VERSION || version > MAX_SUPPORTED_VERSION {
        return Err(CoreError::ArchiveVersionUnsupported { found: version, min: MIN_SUPPORTED_VERSION, max: MAX_SUPPORTED_VERSION });
    }
    Ok(version)
}

pub fn write_string(out: &mut Vec<u8>, s: &str) {
    out.write_u32::<LittleEndian>(s.len() as u32).unwrap();
    out.extend_from_slice(s.as_bytes());
}

pub fn read_string(cursor: &mut Cursor<&[u8]>) -> CoreResult<String> {
    let len = cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated string length".to_string()))? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).map_err(|_| CoreError::ConsistencyError("truncated string body".to_string()))?;
    String::from_utf8(buf).map_err(|e| CoreError::ConsistencyError(format!("non-utf8 string: {e}")))
}

/// Frames one top-level record as `kind | name | u64 body_len | body`
/// (spec.md §6), so a reader can always skip past a record's bytes
/// without having parsed its body.
pub fn write_record(out: &mut Vec<u8>, kind: RecordKind, name: &str, body: &[u8]) {
    out.push(kind as u8);
    write_string(out, name);
    out.write_u64::<LittleEndian>(body.len() as u64).unwrap();
    out.extend_from_slice(body);
}

pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.write_u32::<LittleEndian>(bytes.len() as u32).unwrap();
    out.extend_from_slice(bytes);
}

pub fn read_bytes(cursor: &mut Cursor<&[u8]>) -> CoreResult<Vec<u8>> {
    let len = cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated byte length".to_string()))? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).map_err(|_| CoreError::ConsistencyError("truncated byte body".to_string()))?;
    Ok(buf)
}

pub fn write_option_minmax(out: &mut Vec<u8>, minmax: Option<(f64, f64)>) {
    match minmax {
        Some((lo, hi)) => {
            out.write_u8(1).unwrap();
            out.write_f64::<LittleEndian>(lo).unwrap();
            out.write_f64::<LittleEndian>(hi).unwrap();
        }
        None => out.write_u8(0).unwrap(),
    }
}

pub fn read_option_minmax(cursor: &mut Cursor<&[u8]>) -> CoreResult<Option<(f64, f64)>> {
    let present = cursor.read_u8().map_err(|_| CoreError::ConsistencyError("truncated minmax flag".to_string()))?;
    if present == 0 {
        return Ok(None);
    }
    let lo = cursor.read_f64::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated minmax".to_string()))?;
    let hi = cursor.read_f64::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated minmax".to_string()))?;
    Ok(Some((lo, hi)))
}

/// Test-only helper: most record-level tests write through `Vec<u8>`
/// directly, but a couple of assertions want to prove the write half
/// actually goes through a `Write` impl rather than a bespoke path.
pub fn write_all(out: &mut Vec<u8>, bytes: &[u8]) {
    out.write_all(bytes).unwrap();
}
