//! Message-framing compression (spec.md §4.3): wraps an already-encoded
//! buffer (an archive record, a tile payload) with an outer, optional
//! general-purpose compressor. Distinct from the per-array codecs in
//! `lossless`/`lossy`, which operate on typed scalar data; this module
//! only ever sees bytes.

use crate::error::{CodecError, CodecResult};
use crate::MessageCompression;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Wraps `payload` with a one-byte compression tag and the uncompressed
/// length, so `decompress` is self-describing.
pub fn compress(payload: &[u8], mode: MessageCompression) -> CodecResult<Vec<u8>> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    let tag = match mode {
        MessageCompression::None => 0u8,
        MessageCompression::Lz4 => 1,
        MessageCompression::Zstd => 2,
    };
    out.write_u8(tag).unwrap();
    out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();

    match mode {
        MessageCompression::None => out.extend_from_slice(payload),
        MessageCompression::Lz4 => out.extend(lz4_flex::block::compress(payload)),
        MessageCompression::Zstd => {
            let compressed = zstd::stream::encode_all(payload, 0)
                .map_err(|e| CodecError::Failed { codec: "zstd", reason: e.to_string() })?;
            out.extend(compressed);
        }
    }
    Ok(out)
}

pub fn decompress(bytes: &[u8]) -> CodecResult<Vec<u8>> {
    let mut cursor = Cursor::new(bytes);
    let tag = cursor
        .read_u8()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))?;
    let uncompressed_len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))? as usize;
    let body = &bytes[cursor.position() as usize..];

    match tag {
        0 => Ok(body.to_vec()),
        1 => lz4_flex::block::decompress(body, uncompressed_len)
            .map_err(|e| CodecError::Failed { codec: "lz4", reason: e.to_string() }),
        2 => zstd::stream::decode_all(body)
            .map_err(|e| CodecError::Failed { codec: "zstd", reason: e.to_string() }),
        _ => Err(CodecError::MalformedHeader(format!("unknown message compression tag {tag}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_round_trips() {
        let payload = b"hello tile pipeline".to_vec();
        let framed = compress(&payload, MessageCompression::None).unwrap();
        assert_eq!(decompress(&framed).unwrap(), payload);
    }

    #[test]
    fn lz4_round_trips() {
        let payload: Vec<u8> = (0..4096).map(|i| (i % 17) as u8).collect();
        let framed = compress(&payload, MessageCompression::Lz4).unwrap();
        assert_eq!(decompress(&framed).unwrap(), payload);
    }

    #[test]
    fn zstd_round_trips() {
        let payload: Vec<u8> = (0..4096).map(|i| (i % 23) as u8).collect();
        let framed = compress(&payload, MessageCompression::Zstd).unwrap();
        assert_eq!(decompress(&framed).unwrap(), payload);
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = decompress(&[9, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedHeader(_)));
    }
}
