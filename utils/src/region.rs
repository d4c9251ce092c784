// Region tracking helpers
//
// Austin Shafer - 2020

/// A rectangular region
///
/// This can be used to track input regions,
/// damage boxes, etc. It is determinined by
/// the corders of a rectangle:
///   r_start: the upper left corner's position on the desktop
///   r_size:  the distance from the left to the lower right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect<T> {
    pub r_pos: (T, T),
    pub r_size: (T, T),
}

impl<T> Rect<T> {
    pub fn new(x: T, y: T, width: T, height: T)
               -> Rect<T>
    {
        Rect {
            r_pos: (x, y),
            r_size: (width, height),
        }
    }
}

impl Rect<u32> {
    /// Total pixel count of this region, used to size tile payload buffers.
    pub fn area(&self) -> u64 {
        self.r_size.0 as u64 * self.r_size.1 as u64
    }

    /// Splits this rectangle into a row-major grid of sub-rectangles of at
    /// most `tile_w` x `tile_h`, clamped at the right/bottom edge. This is
    /// the tiling step in spec.md §4.7: "the server splits the requested
    /// rectangle into tiles of configured (tile_w, tile_h)".
    pub fn tile(&self, tile_w: u32, tile_h: u32) -> Vec<Rect<u32>> {
        let mut out = Vec::new();
        if self.r_size.0 == 0 || self.r_size.1 == 0 {
            return out;
        }
        let mut y = self.r_pos.1;
        while y < self.r_pos.1 + self.r_size.1 {
            let h = tile_h.min(self.r_pos.1 + self.r_size.1 - y);
            let mut x = self.r_pos.0;
            while x < self.r_pos.0 + self.r_size.0 {
                let w = tile_w.min(self.r_pos.0 + self.r_size.0 - x);
                out.push(Rect::new(x, y, w, h));
                x += tile_w;
            }
            y += tile_h;
        }
        out
    }
}
