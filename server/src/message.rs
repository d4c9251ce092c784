//! Remote-rendering wire protocol (spec.md §4.7, §6): the client-facing
//! message types wrapped in a `RemoteRender` envelope, and the
//! little-endian framing the teacher's Wayland wire (`ways::protocol`'s
//! generated marshalling) follows for its own messages -- here written
//! out by hand since there is no IDL/code-generator step in this stack.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use utils::{CoreError, CoreResult};

/// Framing header: 32 bytes, precedes every sub-message (spec.md §6).
pub const FRAME_HEADER_LEN: usize = 32;
/// Maximum size of one fixed-size `RhrSubMessage` (spec.md §6).
pub const SUBMESSAGE_MAX_LEN: usize = 840;

/// Eye offset for a stereo view (spec.md §4.7 `Matrices`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Middle,
    Left,
    Right,
}

impl Eye {
    fn to_wire(self) -> u8 {
        match self {
            Eye::Middle => 0,
            Eye::Left => 1,
            Eye::Right => 2,
        }
    }

    fn from_wire(tag: u8) -> CoreResult<Eye> {
        Ok(match tag {
            0 => Eye::Middle,
            1 => Eye::Left,
            2 => Eye::Right,
            other => return Err(CoreError::TransportError(format!("unknown eye tag {other}"))),
        })
    }
}

/// Requests rendering of one view (spec.md §4.7 `Matrices`).
#[derive(Debug, Clone, PartialEq)]
pub struct Matrices {
    pub view_num: u32,
    pub eye: Eye,
    pub width: u32,
    pub height: u32,
    pub request_number: u32,
    pub time: f64,
    pub head: [f64; 16],
    pub view: [f64; 16],
    pub proj: [f64; 16],
    pub model: [f64; 16],
    /// Commits the batch of simultaneous views for one frame.
    pub last: bool,
}

/// One light source entry inside a `Lights` message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightEntry {
    pub enabled: bool,
    pub position: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub spot_direction: [f32; 3],
    pub spot_cutoff: f32,
    pub spot_exponent: f32,
    pub attenuation: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lights {
    pub view_num: u32,
    pub array: Vec<LightEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub send_reply: bool,
    pub center: [f32; 3],
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animation {
    pub total: u32,
    pub current: u32,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub configure_visibility: bool,
    pub visible: bool,
    pub remove: bool,
}

/// Bit flags on a `Tile` header (spec.md §6).
pub mod tile_flags {
    pub const FIRST: u32 = 1;
    pub const LAST: u32 = 2;
    pub const REQUEST: u32 = 4;
}

/// Pixel format of a tile's payload (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Depth8,
    Depth16,
    Depth24,
    Depth32,
    DepthFloat,
    ColorRgba,
    DepthViewer,
}

impl TileFormat {
    fn to_wire(self) -> u8 {
        match self {
            TileFormat::Depth8 => 0,
            TileFormat::Depth16 => 1,
            TileFormat::Depth24 => 2,
            TileFormat::Depth32 => 3,
            TileFormat::DepthFloat => 4,
            TileFormat::ColorRgba => 5,
            TileFormat::DepthViewer => 6,
        }
    }

    fn from_wire(tag: u8) -> CoreResult<TileFormat> {
        Ok(match tag {
            0 => TileFormat::Depth8,
            1 => TileFormat::Depth16,
            2 => TileFormat::Depth24,
            3 => TileFormat::Depth32,
            4 => TileFormat::DepthFloat,
            5 => TileFormat::ColorRgba,
            6 => TileFormat::DepthViewer,
            other => return Err(CoreError::TransportError(format!("unknown tile format {other}"))),
        })
    }
}

/// Compression bitmask on a `Tile` header (spec.md §6).
pub mod tile_compression {
    pub const RAW: u32 = 0;
    pub const DEPTH_PREDICT: u32 = 1;
    pub const DEPTH_PREDICT_PLANAR: u32 = 2;
    pub const DEPTH_QUANTIZE: u32 = 4;
    pub const DEPTH_QUANTIZE_PLANAR: u32 = 8;
    pub const DEPTH_ZFP: u32 = 16;
    pub const JPEG: u32 = 32;
    pub const PREDICT_RGB: u32 = 64;
    pub const PREDICT_RGBA: u32 = 128;
    pub const CLEAR: u32 = 256;
}

/// One encoded tile message, plus its opaque payload (spec.md §4.7
/// `Tile`).
#[derive(Debug, Clone)]
pub struct Tile {
    pub flags: u32,
    pub format: TileFormat,
    pub compression: u32,
    pub eye: Eye,
    pub frame_number: u32,
    pub request_number: u32,
    pub size: u32,
    pub x: u32,
    pub y: u32,
    pub view_num: u32,
    pub width: u32,
    pub height: u32,
    pub total_width: u32,
    pub total_height: u32,
    pub timestep: u32,
    pub unzipped_size: u32,
    pub head: [f64; 16],
    pub view: [f64; 16],
    pub proj: [f64; 16],
    pub model: [f64; 16],
    pub request_time: f64,
    pub payload: Vec<u8>,
}

/// The common envelope every client-facing message travels in (spec.md
/// §4.7: "all wrapped in a common `RemoteRender` envelope").
#[derive(Debug, Clone)]
pub enum RemoteRender {
    Matrices(Matrices),
    Lights(Lights),
    Bounds(Bounds),
    Animation(Animation),
    Variant(Variant),
    Tile(Tile),
}

impl RemoteRender {
    fn kind_tag(&self) -> u8 {
        match self {
            RemoteRender::Matrices(_) => 0,
            RemoteRender::Lights(_) => 1,
            RemoteRender::Bounds(_) => 2,
            RemoteRender::Animation(_) => 3,
            RemoteRender::Variant(_) => 4,
            RemoteRender::Tile(_) => 5,
        }
    }

    /// Serializes the frame header, sub-message, and (for `Tile`) the
    /// trailing payload -- little-endian throughout (spec.md §6).
    pub fn encode(&self) -> Vec<u8> {
        let mut sub = Vec::with_capacity(SUBMESSAGE_MAX_LEN);
        match self {
            RemoteRender::Matrices(m) => write_matrices(&mut sub, m),
            RemoteRender::Lights(l) => write_lights(&mut sub, l),
            RemoteRender::Bounds(b) => write_bounds(&mut sub, b),
            RemoteRender::Animation(a) => write_animation(&mut sub, a),
            RemoteRender::Variant(v) => write_variant(&mut sub, v),
            RemoteRender::Tile(t) => write_tile_submessage(&mut sub, t),
        }
        assert!(sub.len() <= SUBMESSAGE_MAX_LEN, "sub-message exceeds the 840-byte limit");

        let payload: &[u8] = match self {
            RemoteRender::Tile(t) => &t.payload,
            _ => &[],
        };

        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + SUBMESSAGE_MAX_LEN + payload.len());
        out.write_u8(self.kind_tag()).unwrap();
        out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        // Remaining header bytes are reserved/padding up to FRAME_HEADER_LEN.
        out.resize(FRAME_HEADER_LEN, 0);
        out.extend_from_slice(&sub);
        out.resize(FRAME_HEADER_LEN + SUBMESSAGE_MAX_LEN, 0);
        out.extend_from_slice(payload);
        out
    }

    /// Inverse of `encode`: reads exactly one framed message out of
    /// `bytes`, returning the message and the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> CoreResult<(RemoteRender, usize)> {
        if bytes.len() < FRAME_HEADER_LEN + SUBMESSAGE_MAX_LEN {
            return Err(CoreError::TransportError("truncated frame header".to_string()));
        }
        let mut header = Cursor::new(&bytes[..FRAME_HEADER_LEN]);
        let kind = header.read_u8().map_err(|_| CoreError::TransportError("truncated frame kind".to_string()))?;
        let payload_size = header
            .read_u32::<LittleEndian>()
            .map_err(|_| CoreError::TransportError("truncated frame payload size".to_string()))? as usize;

        let sub_bytes = &bytes[FRAME_HEADER_LEN..FRAME_HEADER_LEN + SUBMESSAGE_MAX_LEN];
        let payload_start = FRAME_HEADER_LEN + SUBMESSAGE_MAX_LEN;
        if bytes.len() < payload_start + payload_size {
            return Err(CoreError::TransportError("truncated frame payload".to_string()));
        }
        let payload = bytes[payload_start..payload_start + payload_size].to_vec();
        let mut sub = Cursor::new(sub_bytes);

        let msg = match kind {
            0 => RemoteRender::Matrices(read_matrices(&mut sub)?),
            1 => RemoteRender::Lights(read_lights(&mut sub)?),
            2 => RemoteRender::Bounds(read_bounds(&mut sub)?),
            3 => RemoteRender::Animation(read_animation(&mut sub)?),
            4 => RemoteRender::Variant(read_variant(&mut sub)?),
            5 => RemoteRender::Tile(read_tile_submessage(&mut sub, payload)?),
            other => return Err(CoreError::TransportError(format!("unknown RemoteRender kind {other}"))),
        };
        Ok((msg, payload_start + payload_size))
    }
}

fn write_f64_array(out: &mut Vec<u8>, arr: &[f64; 16]) {
    for v in arr {
        out.write_f64::<LittleEndian>(*v).unwrap();
    }
}

fn read_f64_array(cur: &mut Cursor<&[u8]>) -> CoreResult<[f64; 16]> {
    let mut out = [0.0f64; 16];
    for slot in &mut out {
        *slot = cur.read_f64::<LittleEndian>().map_err(|_| CoreError::TransportError("truncated matrix".to_string()))?;
    }
    Ok(out)
}

fn write_matrices(out: &mut Vec<u8>, m: &Matrices) {
    out.write_u32::<LittleEndian>(m.view_num).unwrap();
    out.write_u8(m.eye.to_wire()).unwrap();
    out.write_u32::<LittleEndian>(m.width).unwrap();
    out.write_u32::<LittleEndian>(m.height).unwrap();
    out.write_u32::<LittleEndian>(m.request_number).unwrap();
    out.write_f64::<LittleEndian>(m.time).unwrap();
    write_f64_array(out, &m.head);
    write_f64_array(out, &m.view);
    write_f64_array(out, &m.proj);
    write_f64_array(out, &m.model);
    out.write_u8(m.last as u8).unwrap();
}

fn read_matrices(cur: &mut Cursor<&[u8]>) -> CoreResult<Matrices> {
    let err = || CoreError::TransportError("truncated Matrices".to_string());
    let view_num = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let eye = Eye::from_wire(cur.read_u8().map_err(|_| err())?)?;
    let width = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let height = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let request_number = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let time = cur.read_f64::<LittleEndian>().map_err(|_| err())?;
    let head = read_f64_array(cur)?;
    let view = read_f64_array(cur)?;
    let proj = read_f64_array(cur)?;
    let model = read_f64_array(cur)?;
    let last = cur.read_u8().map_err(|_| err())? != 0;
    Ok(Matrices { view_num, eye, width, height, request_number, time, head, view, proj, model, last })
}

fn write_lights(out: &mut Vec<u8>, l: &Lights) {
    out.write_u32::<LittleEndian>(l.view_num).unwrap();
    out.write_u32::<LittleEndian>(l.array.len() as u32).unwrap();
    for e in &l.array {
        out.write_u8(e.enabled as u8).unwrap();
        for v in e.position.iter().chain(e.ambient.iter()).chain(e.diffuse.iter()).chain(e.specular.iter()) {
            out.write_f32::<LittleEndian>(*v).unwrap();
        }
        for v in &e.spot_direction {
            out.write_f32::<LittleEndian>(*v).unwrap();
        }
        out.write_f32::<LittleEndian>(e.spot_cutoff).unwrap();
        out.write_f32::<LittleEndian>(e.spot_exponent).unwrap();
        for v in &e.attenuation {
            out.write_f32::<LittleEndian>(*v).unwrap();
        }
    }
}

fn read_lights(cur: &mut Cursor<&[u8]>) -> CoreResult<Lights> {
    let err = || CoreError::TransportError("truncated Lights".to_string());
    let view_num = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let count = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let mut array = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let enabled = cur.read_u8().map_err(|_| err())? != 0;
        let mut read4 = || -> CoreResult<[f32; 4]> {
            let mut a = [0.0f32; 4];
            for slot in &mut a {
                *slot = cur.read_f32::<LittleEndian>().map_err(|_| err())?;
            }
            Ok(a)
        };
        let position = read4()?;
        let ambient = read4()?;
        let diffuse = read4()?;
        let specular = read4()?;
        let mut spot_direction = [0.0f32; 3];
        for slot in &mut spot_direction {
            *slot = cur.read_f32::<LittleEndian>().map_err(|_| err())?;
        }
        let spot_cutoff = cur.read_f32::<LittleEndian>().map_err(|_| err())?;
        let spot_exponent = cur.read_f32::<LittleEndian>().map_err(|_| err())?;
        let mut attenuation = [0.0f32; 3];
        for slot in &mut attenuation {
            *slot = cur.read_f32::<LittleEndian>().map_err(|_| err())?;
        }
        array.push(LightEntry { enabled, position, ambient, diffuse, specular, spot_direction, spot_cutoff, spot_exponent, attenuation });
    }
    Ok(Lights { view_num, array })
}

fn write_bounds(out: &mut Vec<u8>, b: &Bounds) {
    out.write_u8(b.send_reply as u8).unwrap();
    for v in &b.center {
        out.write_f32::<LittleEndian>(*v).unwrap();
    }
    out.write_f32::<LittleEndian>(b.radius).unwrap();
}

fn read_bounds(cur: &mut Cursor<&[u8]>) -> CoreResult<Bounds> {
    let err = || CoreError::TransportError("truncated Bounds".to_string());
    let send_reply = cur.read_u8().map_err(|_| err())? != 0;
    let mut center = [0.0f32; 3];
    for slot in &mut center {
        *slot = cur.read_f32::<LittleEndian>().map_err(|_| err())?;
    }
    let radius = cur.read_f32::<LittleEndian>().map_err(|_| err())?;
    Ok(Bounds { send_reply, center, radius })
}

fn write_animation(out: &mut Vec<u8>, a: &Animation) {
    out.write_u32::<LittleEndian>(a.total).unwrap();
    out.write_u32::<LittleEndian>(a.current).unwrap();
    out.write_f64::<LittleEndian>(a.time).unwrap();
}

fn read_animation(cur: &mut Cursor<&[u8]>) -> CoreResult<Animation> {
    let err = || CoreError::TransportError("truncated Animation".to_string());
    let total = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let current = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let time = cur.read_f64::<LittleEndian>().map_err(|_| err())?;
    Ok(Animation { total, current, time })
}

fn write_variant(out: &mut Vec<u8>, v: &Variant) {
    let name_bytes = v.name.as_bytes();
    out.write_u32::<LittleEndian>(name_bytes.len() as u32).unwrap();
    out.write_all(name_bytes).unwrap();
    out.write_u8(v.configure_visibility as u8).unwrap();
    out.write_u8(v.visible as u8).unwrap();
    out.write_u8(v.remove as u8).unwrap();
}

fn read_variant(cur: &mut Cursor<&[u8]>) -> CoreResult<Variant> {
    let err = || CoreError::TransportError("truncated Variant".to_string());
    let len = cur.read_u32::<LittleEndian>().map_err(|_| err())? as usize;
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf).map_err(|_| err())?;
    let name = String::from_utf8(buf).map_err(|_| err())?;
    let configure_visibility = cur.read_u8().map_err(|_| err())? != 0;
    let visible = cur.read_u8().map_err(|_| err())? != 0;
    let remove = cur.read_u8().map_err(|_| err())? != 0;
    Ok(Variant { name, configure_visibility, visible, remove })
}

fn write_tile_submessage(out: &mut Vec<u8>, t: &Tile) {
    out.write_u32::<LittleEndian>(t.flags).unwrap();
    out.write_u8(t.format.to_wire()).unwrap();
    out.write_u32::<LittleEndian>(t.compression).unwrap();
    out.write_u8(t.eye.to_wire()).unwrap();
    out.write_u32::<LittleEndian>(t.frame_number).unwrap();
    out.write_u32::<LittleEndian>(t.request_number).unwrap();
    out.write_u32::<LittleEndian>(t.size).unwrap();
    out.write_u32::<LittleEndian>(t.x).unwrap();
    out.write_u32::<LittleEndian>(t.y).unwrap();
    out.write_u32::<LittleEndian>(t.view_num).unwrap();
    out.write_u32::<LittleEndian>(t.width).unwrap();
    out.write_u32::<LittleEndian>(t.height).unwrap();
    out.write_u32::<LittleEndian>(t.total_width).unwrap();
    out.write_u32::<LittleEndian>(t.total_height).unwrap();
    out.write_u32::<LittleEndian>(t.timestep).unwrap();
    out.write_u32::<LittleEndian>(t.unzipped_size).unwrap();
    write_f64_array(out, &t.head);
    write_f64_array(out, &t.view);
    write_f64_array(out, &t.proj);
    write_f64_array(out, &t.model);
    out.write_f64::<LittleEndian>(t.request_time).unwrap();
}

fn read_tile_submessage(cur: &mut Cursor<&[u8]>, payload: Vec<u8>) -> CoreResult<Tile> {
    let err = || CoreError::TransportError("truncated Tile".to_string());
    let flags = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let format = TileFormat::from_wire(cur.read_u8().map_err(|_| err())?)?;
    let compression = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let eye = Eye::from_wire(cur.read_u8().map_err(|_| err())?)?;
    let frame_number = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let request_number = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let size = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let x = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let y = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let view_num = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let width = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let height = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let total_width = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let total_height = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let timestep = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let unzipped_size = cur.read_u32::<LittleEndian>().map_err(|_| err())?;
    let head = read_f64_array(cur)?;
    let view = read_f64_array(cur)?;
    let proj = read_f64_array(cur)?;
    let model = read_f64_array(cur)?;
    let request_time = cur.read_f64::<LittleEndian>().map_err(|_| err())?;
    Ok(Tile {
        flags,
        format,
        compression,
        eye,
        frame_number,
        request_number,
        size,
        x,
        y,
        view_num,
        width,
        height,
        total_width,
        total_height,
        timestep,
        unzipped_size,
        head,
        view,
        proj,
        model,
        request_time,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tile(flags: u32) -> Tile {
        Tile {
            flags,
            format: TileFormat::ColorRgba,
            compression: tile_compression::PREDICT_RGB,
            eye: Eye::Middle,
            frame_number: 1,
            request_number: 1,
            size: 4,
            x: 0,
            y: 0,
            view_num: 0,
            width: 64,
            height: 64,
            total_width: 128,
            total_height: 128,
            timestep: 0,
            unzipped_size: 16384,
            head: [0.0; 16],
            view: [0.0; 16],
            proj: [0.0; 16],
            model: [0.0; 16],
            request_time: 1.5,
            payload: vec![1, 2, 3, 4],
        }
    }

    #[test]
    fn tile_round_trips_through_the_envelope() {
        let tile = sample_tile(tile_flags::FIRST | tile_flags::LAST);
        let msg = RemoteRender::Tile(tile.clone());
        let bytes = msg.encode();
        let (decoded, consumed) = RemoteRender::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        match decoded {
            RemoteRender::Tile(t) => {
                assert_eq!(t.flags, tile.flags);
                assert_eq!(t.payload, tile.payload);
                assert_eq!(t.request_time, tile.request_time);
            }
            _ => panic!("expected a Tile"),
        }
    }

    #[test]
    fn matrices_round_trips_with_last_flag() {
        let mut m = Matrices {
            view_num: 2,
            eye: Eye::Right,
            width: 800,
            height: 600,
            request_number: 9,
            time: 42.0,
            head: [1.0; 16],
            view: [2.0; 16],
            proj: [3.0; 16],
            model: [4.0; 16],
            last: true,
        };
        m.head[0] = 7.5;
        let bytes = RemoteRender::Matrices(m.clone()).encode();
        let (decoded, _) = RemoteRender::decode(&bytes).unwrap();
        match decoded {
            RemoteRender::Matrices(d) => assert_eq!(d, m),
            _ => panic!("expected Matrices"),
        }
    }

    #[test]
    fn variant_round_trips_name() {
        let v = Variant { name: "wireframe".to_string(), configure_visibility: true, visible: false, remove: false };
        let bytes = RemoteRender::Variant(v.clone()).encode();
        let (decoded, _) = RemoteRender::decode(&bytes).unwrap();
        match decoded {
            RemoteRender::Variant(d) => assert_eq!(d, v),
            _ => panic!("expected Variant"),
        }
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let err = RemoteRender::decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, CoreError::TransportError(_)));
    }
}
