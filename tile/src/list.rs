// A per-view list of the tiles produced for one frame (spec.md §4.7).
//
// Austin Shafer - 2020

use utils::region::Rect;

/// One encoded tile awaiting transport, plus the framing bits the
/// server needs to set on the wire message (`First`/`Last`/`Request`
/// are tracked by the caller; this just carries the payload and its
/// placement).
pub struct EncodedTile {
    pub rect: Rect<u32>,
    pub view_num: u32,
    /// Distinguishes a color tile from a depth tile when both are
    /// drained from the same worker-pool results queue (spec.md §4.7:
    /// "For each tile, it enqueues one color-encode task and one
    /// depth-encode task").
    pub is_color: bool,
    pub payload: Vec<u8>,
}

/// The ordered set of tiles produced while splitting and encoding one
/// view's framebuffer, mirroring the way the teacher's `SurfaceList`
/// holds the ordered draw list for one frame.
pub struct TileList {
    l_tiles: Vec<EncodedTile>,
}

impl TileList {
    pub fn new() -> Self {
        Self { l_tiles: Vec::new() }
    }

    pub fn push(&mut self, tile: EncodedTile) {
        self.l_tiles.push(tile);
    }

    pub fn iter(&self) -> impl Iterator<Item = &EncodedTile> {
        self.l_tiles.iter()
    }

    pub fn len(&self) -> usize {
        self.l_tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_tiles.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = EncodedTile> + '_ {
        self.l_tiles.drain(..)
    }
}

impl Default for TileList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_drain_preserves_order() {
        let mut list = TileList::new();
        for i in 0..3 {
            list.push(EncodedTile { rect: Rect::new(i * 16, 0, 16, 16), view_num: 0, is_color: true, payload: vec![i as u8] });
        }
        assert_eq!(list.len(), 3);
        let drained: Vec<_> = list.drain().collect();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[1].payload, vec![1]);
        assert!(list.is_empty());
    }
}
