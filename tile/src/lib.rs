//! Tile codec primitives and per-frame tile bookkeeping (spec.md §4.6),
//! grounded on the teacher's `thundr::{damage, list, surface,
//! deletion_queue}` module split -- one small module per concern
//! instead of one tile-pipeline monolith.

pub mod codec;
pub mod damage;
pub mod deletion_queue;
pub mod list;

pub use codec::{compress_depth, compress_rgba, decompress_tile, depthquant_size, ColorCodec, ColorParams, DepthCodec, DepthParams};
pub use damage::{Damage, DamageList};
pub use deletion_queue::{DeletionQueue, Droppable};
pub use list::{EncodedTile, TileList};
