//! The Predict YUV-RGB tile color codec (spec.md §4.3): a cheap
//! reversible color-space decorrelation (`Y=B, U=G-B, V=G-R`) followed
//! by the same per-plane delta prediction `codec::lossless::predict_*`
//! uses for arrays, reused here for tiles instead of duplicated.
//!
//! Source pixels are always read as 4-byte BGRA regardless of whether
//! the RGB or RGBA variant is selected (alpha is simply ignored by the
//! RGB variant), matching the `src_bgra` parameter name used throughout
//! spec.md §4.6.

use crate::lossless::{predict_decode, predict_encode};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

fn extract_planes(src_bgra: &[u8], x: usize, y: usize, w: usize, h: usize, stride: usize, with_alpha: bool) -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>) {
    let stride = if stride == 0 { x + w } else { stride };
    let mut yp = Vec::with_capacity(w * h);
    let mut up = Vec::with_capacity(w * h);
    let mut vp = Vec::with_capacity(w * h);
    let mut ap = if with_alpha { Vec::with_capacity(w * h) } else { Vec::new() };

    for row in 0..h {
        let row_start = ((y + row) * stride + x) * 4;
        for col in 0..w {
            let px = row_start + col * 4;
            let b = src_bgra[px];
            let g = src_bgra[px + 1];
            let r = src_bgra[px + 2];
            let a = src_bgra[px + 3];
            yp.push(b);
            up.push(g.wrapping_sub(b));
            vp.push(g.wrapping_sub(r));
            if with_alpha {
                ap.push(a);
            }
        }
    }
    (yp, up, vp, ap)
}

fn write_header(out: &mut Vec<u8>, w: u32, h: u32) {
    out.write_u32::<LittleEndian>(w).unwrap();
    out.write_u32::<LittleEndian>(h).unwrap();
}

fn read_header(cursor: &mut Cursor<&[u8]>) -> (u32, u32) {
    let w = cursor.read_u32::<LittleEndian>().unwrap();
    let h = cursor.read_u32::<LittleEndian>().unwrap();
    (w, h)
}

pub fn encode_rgb(src_bgra: &[u8], x: usize, y: usize, w: usize, h: usize, stride: usize) -> Vec<u8> {
    let (yp, up, vp, _) = extract_planes(src_bgra, x, y, w, h, stride, false);
    let mut out = Vec::with_capacity(8 + 3 * w * h);
    write_header(&mut out, w as u32, h as u32);
    out.extend(predict_encode(&yp, 1, true));
    out.extend(predict_encode(&up, 1, true));
    out.extend(predict_encode(&vp, 1, true));
    out
}

pub fn encode_rgba(src_bgra: &[u8], x: usize, y: usize, w: usize, h: usize, stride: usize) -> Vec<u8> {
    let (yp, up, vp, ap) = extract_planes(src_bgra, x, y, w, h, stride, true);
    let mut out = Vec::with_capacity(8 + 4 * w * h);
    write_header(&mut out, w as u32, h as u32);
    out.extend(predict_encode(&yp, 1, true));
    out.extend(predict_encode(&up, 1, true));
    out.extend(predict_encode(&vp, 1, true));
    out.extend(predict_encode(&ap, 1, true));
    out
}

/// Decodes into `dst`, a BGRA interleaved framebuffer region, at
/// `(x,y)` with the given stride (0 meaning tightly packed).
pub fn decode_rgb(bytes: &[u8], dst: &mut [u8], x: usize, y: usize, stride: usize) {
    let mut cursor = Cursor::new(bytes);
    let (w, h) = read_header(&mut cursor);
    let (w, h) = (w as usize, h as usize);
    let stride = if stride == 0 { x + w } else { stride };
    let n = w * h;
    let payload = &bytes[cursor.position() as usize..];
    let yp: Vec<u8> = predict_decode(&payload[0..n], n, 1, true);
    let up: Vec<u8> = predict_decode(&payload[n..2 * n], n, 1, true);
    let vp: Vec<u8> = predict_decode(&payload[2 * n..3 * n], n, 1, true);

    for row in 0..h {
        let row_start = ((y + row) * stride + x) * 4;
        for col in 0..w {
            let idx = row * w + col;
            let b = yp[idx];
            let g = up[idx].wrapping_add(b);
            let r = g.wrapping_sub(vp[idx]);
            let px = row_start + col * 4;
            dst[px] = b;
            dst[px + 1] = g;
            dst[px + 2] = r;
        }
    }
}

pub fn decode_rgba(bytes: &[u8], dst: &mut [u8], x: usize, y: usize, stride: usize) {
    let mut cursor = Cursor::new(bytes);
    let (w, h) = read_header(&mut cursor);
    let (w, h) = (w as usize, h as usize);
    let stride = if stride == 0 { x + w } else { stride };
    let n = w * h;
    let payload = &bytes[cursor.position() as usize..];
    let yp: Vec<u8> = predict_decode(&payload[0..n], n, 1, true);
    let up: Vec<u8> = predict_decode(&payload[n..2 * n], n, 1, true);
    let vp: Vec<u8> = predict_decode(&payload[2 * n..3 * n], n, 1, true);
    let ap: Vec<u8> = predict_decode(&payload[3 * n..4 * n], n, 1, true);

    for row in 0..h {
        let row_start = ((y + row) * stride + x) * 4;
        for col in 0..w {
            let idx = row * w + col;
            let b = yp[idx];
            let g = up[idx].wrapping_add(b);
            let r = g.wrapping_sub(vp[idx]);
            let px = row_start + col * 4;
            dst[px] = b;
            dst[px + 1] = g;
            dst[px + 2] = r;
            dst[px + 3] = ap[idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_gradient(w: usize, h: usize) -> Vec<u8> {
        let mut buf = vec![0u8; w * h * 4];
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 4;
                buf[i] = (x * 3) as u8;
                buf[i + 1] = (y * 5) as u8;
                buf[i + 2] = ((x + y) * 2) as u8;
                buf[i + 3] = 255;
            }
        }
        buf
    }

    #[test]
    fn rgb_round_trip() {
        let (w, h) = (16, 16);
        let src = make_gradient(w, h);
        let encoded = encode_rgb(&src, 0, 0, w, h, 0);
        let mut dst = vec![0u8; w * h * 4];
        decode_rgb(&encoded, &mut dst, 0, 0, 0);
        for i in 0..w * h {
            assert_eq!(dst[i * 4], src[i * 4]);
            assert_eq!(dst[i * 4 + 1], src[i * 4 + 1]);
            assert_eq!(dst[i * 4 + 2], src[i * 4 + 2]);
        }
    }

    #[test]
    fn rgba_round_trip_preserves_alpha() {
        let (w, h) = (8, 8);
        let mut src = make_gradient(w, h);
        for i in 0..w * h {
            src[i * 4 + 3] = (i * 7) as u8;
        }
        let encoded = encode_rgba(&src, 0, 0, w, h, 0);
        let mut dst = vec![0u8; w * h * 4];
        decode_rgba(&encoded, &mut dst, 0, 0, 0);
        assert_eq!(dst, src);
    }
}
