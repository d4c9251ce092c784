//! Frame protocol (spec.md §4.7): splits each view's framebuffer into
//! tiles, dispatches encode tasks to the worker pool, and assembles the
//! outgoing `Tile` messages with `First`/`Last` markers.

use crate::message::{tile_compression, tile_flags, Eye, Tile, TileFormat};
use crate::worker::{EncodeTask, WorkerPool};
use tile::{ColorParams, DepthParams, EncodedTile};
use utils::region::Rect;

/// One view's rendered output for the current frame, ready to be tiled.
pub struct ViewFrame<'a> {
    pub view_num: u32,
    pub eye: Eye,
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
    pub depth: &'a [u8],
    pub stride: usize,
    pub head: [f64; 16],
    pub view: [f64; 16],
    pub proj: [f64; 16],
    pub model: [f64; 16],
}

#[derive(Debug, Clone, Copy)]
pub struct FramePlan {
    pub frame_number: u32,
    pub request_number: u32,
    pub timestep: u32,
    pub request_time: f64,
    pub tile_w: u32,
    pub tile_h: u32,
}

/// Splits every view's rectangle into `(tile_w, tile_h)` tiles and
/// enqueues one color-encode and one depth-encode task per tile onto
/// `pool` (spec.md §4.7 step 3). Returns the number of tasks submitted;
/// zero means every view's rectangle was empty and the caller must ship
/// the sentinel tile itself (step 5).
pub fn dispatch_frame(pool: &WorkerPool, views: &[ViewFrame], plan: &FramePlan, color_params: ColorParams, depth_params: DepthParams) -> usize {
    let mut submitted = 0;
    for view in views {
        let rect = Rect::new(0u32, 0, view.width, view.height);
        for tile_rect in rect.tile(plan.tile_w, plan.tile_h) {
            let (x, y, w, h) = (tile_rect.r_pos.0 as usize, tile_rect.r_pos.1 as usize, tile_rect.r_size.0 as usize, tile_rect.r_size.1 as usize);
            let view_num = view.view_num;

            let rgba = view.rgba.to_vec();
            let stride = view.stride;
            let mut cparams = color_params;
            pool.submit(EncodeTask {
                view_num,
                frame_number: plan.frame_number,
                run: Box::new(move || {
                    let payload = tile::compress_rgba(&rgba, x, y, w, h, stride, &mut cparams);
                    EncodedTile { rect: tile_rect, view_num, is_color: true, payload }
                }),
            });
            submitted += 1;

            let depth = view.depth.to_vec();
            let mut dparams = depth_params;
            pool.submit(EncodeTask {
                view_num,
                frame_number: plan.frame_number,
                run: Box::new(move || {
                    let payload = tile::compress_depth(&depth, x, y, w, h, stride, &mut dparams);
                    EncodedTile { rect: tile_rect, view_num, is_color: false, payload }
                }),
            });
            submitted += 1;
        }
    }
    submitted
}

/// Assembles one `EncodedTile` into an outgoing `Tile` message, copying
/// the requesting view's matrices and the client's request timestamp
/// back for latency measurement (spec.md §4.7: "the server copies it
/// into each resulting `Tile.request_time`").
#[allow(clippy::too_many_arguments)]
pub fn build_tile_message(encoded: &EncodedTile, view: &ViewFrame, plan: &FramePlan, is_first: bool, is_last: bool, total_width: u32, total_height: u32) -> Tile {
    let mut flags = 0u32;
    if is_first {
        flags |= tile_flags::FIRST;
    }
    if is_last {
        flags |= tile_flags::LAST;
    }

    let (format, compression) = if encoded.is_color {
        (TileFormat::ColorRgba, color_compression_bit(encoded))
    } else {
        (TileFormat::DepthFloat, depth_compression_bit(encoded))
    };

    Tile {
        flags,
        format,
        compression,
        eye: view.eye,
        frame_number: plan.frame_number,
        request_number: plan.request_number,
        size: encoded.payload.len() as u32,
        x: encoded.rect.r_pos.0,
        y: encoded.rect.r_pos.1,
        view_num: encoded.view_num,
        width: encoded.rect.r_size.0,
        height: encoded.rect.r_size.1,
        total_width,
        total_height,
        timestep: plan.timestep,
        unzipped_size: encoded.payload.len() as u32,
        head: view.head,
        view: view.view,
        proj: view.proj,
        model: view.model,
        request_time: plan.request_time,
        payload: encoded.payload.clone(),
    }
}

/// Builds the sentinel tile spec.md §4.7 step 5 requires when a frame
/// produced no real tiles (an empty requested rectangle).
pub fn sentinel_tile(plan: &FramePlan, view_num: u32, eye: Eye) -> Tile {
    Tile {
        flags: tile_flags::FIRST | tile_flags::LAST,
        format: TileFormat::ColorRgba,
        compression: tile_compression::RAW,
        eye,
        frame_number: plan.frame_number,
        request_number: plan.request_number,
        size: 0,
        x: 0,
        y: 0,
        view_num,
        width: 0,
        height: 0,
        total_width: 0,
        total_height: 0,
        timestep: plan.timestep,
        unzipped_size: 0,
        head: [0.0; 16],
        view: [0.0; 16],
        proj: [0.0; 16],
        model: [0.0; 16],
        request_time: plan.request_time,
        payload: Vec::new(),
    }
}

/// Maps `tile::codec`'s color wire tag (the first payload byte, per
/// `compress_rgba`) onto the `Tile` header's compression bitmask.
fn color_compression_bit(encoded: &EncodedTile) -> u32 {
    match encoded.payload.first().copied() {
        Some(1) => tile_compression::PREDICT_RGB,
        Some(2) => tile_compression::PREDICT_RGBA,
        Some(3) | Some(4) => tile_compression::JPEG,
        _ => tile_compression::RAW,
    }
}

/// Maps `tile::codec`'s depth wire tag onto the `Tile` header's
/// compression bitmask.
fn depth_compression_bit(encoded: &EncodedTile) -> u32 {
    match encoded.payload.first().copied() {
        Some(1) => tile_compression::DEPTH_PREDICT,
        Some(2) => tile_compression::DEPTH_PREDICT_PLANAR,
        Some(3) => tile_compression::DEPTH_QUANTIZE,
        Some(4) => tile_compression::DEPTH_QUANTIZE_PLANAR,
        Some(5) => tile_compression::DEPTH_ZFP,
        _ => tile_compression::RAW,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> FramePlan {
        FramePlan { frame_number: 1, request_number: 1, timestep: 0, request_time: 0.0, tile_w: 64, tile_h: 64 }
    }

    fn identity_view(view_num: u32, rgba: &[u8], depth: &[u8], w: u32, h: u32) -> ViewFrame<'_> {
        ViewFrame {
            view_num,
            eye: Eye::Middle,
            width: w,
            height: h,
            rgba,
            depth,
            stride: 0,
            head: [0.0; 16],
            view: [0.0; 16],
            proj: [0.0; 16],
            model: [0.0; 16],
        }
    }

    #[test]
    fn two_128x128_views_with_64x64_tiles_produce_eight_color_plus_eight_depth_tasks() {
        let pool = WorkerPool::new(2);
        let rgba = vec![0u8; 128 * 128 * 4];
        let depth = vec![0u8; 128 * 128 * 4];
        let views = vec![identity_view(0, &rgba, &depth, 128, 128), identity_view(1, &rgba, &depth, 128, 128)];
        let submitted = dispatch_frame(&pool, &views, &plan(), ColorParams::default(), DepthParams::default());
        // 4 tiles/view * 2 views * (1 color + 1 depth) task each.
        assert_eq!(submitted, 16);

        let mut results = Vec::new();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while results.len() < submitted && std::time::Instant::now() < deadline {
            results.extend(pool.drain_results());
            if results.len() < submitted {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        }
        assert_eq!(results.len(), 16);
        let color_tiles: Vec<_> = results.iter().filter(|t| t.is_color).collect();
        assert_eq!(color_tiles.len(), 8);
        pool.shutdown();
    }

    #[test]
    fn sentinel_tile_carries_first_and_last_with_empty_payload() {
        let tile = sentinel_tile(&plan(), 0, Eye::Middle);
        assert_eq!(tile.flags, tile_flags::FIRST | tile_flags::LAST);
        assert_eq!(tile.size, 0);
        assert!(tile.payload.is_empty());
    }

    #[test]
    fn build_tile_message_copies_request_time_and_matrices() {
        let pool = WorkerPool::new(1);
        let rgba = vec![0u8; 64 * 64 * 4];
        let depth = vec![0u8; 64 * 64 * 4];
        let view = identity_view(0, &rgba, &depth, 64, 64);
        let p = FramePlan { request_time: 42.5, ..plan() };
        dispatch_frame(&pool, std::slice::from_ref(&view), &p, ColorParams::default(), DepthParams::default());

        let mut results = Vec::new();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while results.len() < 2 && std::time::Instant::now() < deadline {
            results.extend(pool.drain_results());
            if results.len() < 2 {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        }
        let msg = build_tile_message(&results[0], &view, &p, true, false, 64, 64);
        assert_eq!(msg.request_time, 42.5);
        pool.shutdown();
    }
}
