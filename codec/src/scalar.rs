// Scalar tags for typed arrays (spec.md §3).
//
// Every typed array carries one of these tags so the archive reader can
// reconstruct the correct concrete `Vec<T>` without any out-of-band schema,
// matching the "template-per-scalar-type registration" pattern the
// original C++ core uses (see DESIGN.md), replaced here by a runtime
// dispatch enum per the REDESIGN FLAGS in spec.md §9.

use std::fmt;

/// Whether this build uses 32- or 64-bit element indices. The source
/// project picks this at compile time via a build-system switch; we
/// mirror that with a type alias chosen by a default (u32) which can be
/// swapped for u64 by changing this alias and rebuilding.
pub type Index = u32;

/// The default floating point element width used for field data.
pub type Scalar = f32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarTag {
    I8,
    U8,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Fixed-size celltree bounding-box node record, one dimension count
    /// per concrete celltree (1D/2D/3D). See SPEC_FULL.md §C.
    CelltreeNode1,
    CelltreeNode2,
    CelltreeNode3,
}

impl ScalarTag {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarTag::I8 => "i8",
            ScalarTag::U8 => "u8",
            ScalarTag::I32 => "i32",
            ScalarTag::U32 => "u32",
            ScalarTag::I64 => "i64",
            ScalarTag::U64 => "u64",
            ScalarTag::F32 => "f32",
            ScalarTag::F64 => "f64",
            ScalarTag::CelltreeNode1 => "celltree_node1",
            ScalarTag::CelltreeNode2 => "celltree_node2",
            ScalarTag::CelltreeNode3 => "celltree_node3",
        }
    }

    /// Size in bytes of one element on the wire, used to size payload
    /// buffers before reading/writing an archive record (spec.md §4.4).
    pub fn element_size(&self) -> usize {
        match self {
            ScalarTag::I8 | ScalarTag::U8 => 1,
            ScalarTag::I32 | ScalarTag::U32 | ScalarTag::F32 => 4,
            ScalarTag::I64 | ScalarTag::U64 | ScalarTag::F64 => 8,
            // min/max (Scalar, D floats) + child_or_leaf (Index) + flag (u8), D = 1,2,3
            ScalarTag::CelltreeNode1 => 2 * 1 * 4 + 4 + 1,
            ScalarTag::CelltreeNode2 => 2 * 2 * 4 + 4 + 1,
            ScalarTag::CelltreeNode3 => 2 * 3 * 4 + 4 + 1,
        }
    }

    pub fn from_wire(tag: u8) -> Option<ScalarTag> {
        Some(match tag {
            0 => ScalarTag::I8,
            1 => ScalarTag::U8,
            2 => ScalarTag::I32,
            3 => ScalarTag::U32,
            4 => ScalarTag::I64,
            5 => ScalarTag::U64,
            6 => ScalarTag::F32,
            7 => ScalarTag::F64,
            8 => ScalarTag::CelltreeNode1,
            9 => ScalarTag::CelltreeNode2,
            10 => ScalarTag::CelltreeNode3,
            _ => return None,
        })
    }

    pub fn to_wire(&self) -> u8 {
        match self {
            ScalarTag::I8 => 0,
            ScalarTag::U8 => 1,
            ScalarTag::I32 => 2,
            ScalarTag::U32 => 3,
            ScalarTag::I64 => 4,
            ScalarTag::U64 => 5,
            ScalarTag::F32 => 6,
            ScalarTag::F64 => 7,
            ScalarTag::CelltreeNode1 => 8,
            ScalarTag::CelltreeNode2 => 9,
            ScalarTag::CelltreeNode3 => 10,
        }
    }

    /// True for the floating point / integer scalar kinds that the lossy
    /// codecs (Zfp, Sz3, BigWhoop) can operate on -- excludes the
    /// celltree record tags, which are never compressed lossily.
    pub fn is_numeric(&self) -> bool {
        !matches!(
            self,
            ScalarTag::CelltreeNode1 | ScalarTag::CelltreeNode2 | ScalarTag::CelltreeNode3
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarTag::F32 | ScalarTag::F64)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ScalarTag::I8
                | ScalarTag::U8
                | ScalarTag::I32
                | ScalarTag::U32
                | ScalarTag::I64
                | ScalarTag::U64
        )
    }
}

impl fmt::Display for ScalarTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A bounding-volume-hierarchy node over cells of a grid, for dimension
/// `D`. Only the record layout and array-of-records storage are in
/// scope; traversal/building a celltree is rendering/culling machinery
/// and stays out of scope (spec.md §1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CelltreeNode<const D: usize> {
    pub min: [Scalar; D],
    pub max: [Scalar; D],
    /// Index of the first child, or (for a leaf) the first cell index.
    pub child_or_leaf: Index,
    /// Bit 0: is-leaf.
    pub flag: u8,
}

pub type CelltreeNode1 = CelltreeNode<1>;
pub type CelltreeNode2 = CelltreeNode<2>;
pub type CelltreeNode3 = CelltreeNode<3>;
