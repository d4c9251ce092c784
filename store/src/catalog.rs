//! The object type catalog (spec.md §4.8): a process-wide registry
//! mapping a type tag to the shape of its concrete record.
//!
//! The source models each concrete type as its own C++ class with
//! hand-written members; per SPEC_FULL.md §9 ("Inheritance -> tagged
//! variants + capability traits") this keeps one `TypeTag` enum but
//! represents every concrete type's payload uniformly as a named set of
//! array-reference slots and object-reference slots (`object::ObjectData`),
//! with the catalog only describing which slots a type expects. This
//! avoids one bespoke struct per concrete type while still letting
//! `store::validate`'s Size predicate check that every slot an object's
//! type declares is actually populated with the right scalar tag.

use codec::ScalarTag;
use lazy_static::lazy_static;
use std::collections::HashMap;
use utils::CoreError;

/// One concrete object type (spec.md §4.8's enumerated list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Points,
    Lines,
    Triangles,
    Quads,
    Polygons,
    Indexed,
    UniformGrid,
    RectilinearGrid,
    StructuredGrid,
    LayeredGrid,
    UnstructuredGrid,
    Celltree1,
    Celltree2,
    Celltree3,
    VertexOwnerList,
    Normals,
    Texture1d,
    Empty,
    Placeholder,
    Vec { elem: VecElem, dim: u8 },
}

/// Element type for the generic `vec{T}x{N}` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VecElem {
    Char,
    I8,
    U8,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl VecElem {
    fn scalar_tag(self) -> ScalarTag {
        match self {
            VecElem::Char | VecElem::I8 => ScalarTag::I8,
            VecElem::U8 => ScalarTag::U8,
            VecElem::I32 => ScalarTag::I32,
            VecElem::U32 => ScalarTag::U32,
            VecElem::I64 => ScalarTag::I64,
            VecElem::U64 => ScalarTag::U64,
            VecElem::F32 => ScalarTag::F32,
            VecElem::F64 => ScalarTag::F64,
        }
    }
}

/// Describes the array/object slots a concrete type's instances expect;
/// used by `create_empty`/`create_from_data` and by `validate::size`.
#[derive(Debug, Clone)]
pub struct ObjectTypeDescriptor {
    pub tag: TypeTag,
    /// `(slot name, expected scalar tag)` for every array reference slot.
    pub array_slots: Vec<(&'static str, ScalarTag)>,
    /// Names of every object-reference slot (e.g. a mesh's `"normals"`).
    pub object_slots: Vec<&'static str>,
}

fn static_descriptor(tag: TypeTag) -> ObjectTypeDescriptor {
    match tag {
        TypeTag::Points => ObjectTypeDescriptor {
            tag,
            array_slots: vec![("x", ScalarTag::F32), ("y", ScalarTag::F32), ("z", ScalarTag::F32)],
            object_slots: vec![],
        },
        TypeTag::Lines | TypeTag::Triangles | TypeTag::Quads | TypeTag::Polygons => ObjectTypeDescriptor {
            tag,
            array_slots: vec![("x", ScalarTag::F32), ("y", ScalarTag::F32), ("z", ScalarTag::F32)],
            object_slots: vec!["normals"],
        },
        TypeTag::Indexed => ObjectTypeDescriptor {
            tag,
            array_slots: vec![
                ("x", ScalarTag::F32),
                ("y", ScalarTag::F32),
                ("z", ScalarTag::F32),
                ("connectivity", ScalarTag::U32),
                ("element_list", ScalarTag::U32),
            ],
            object_slots: vec!["normals"],
        },
        TypeTag::UniformGrid => ObjectTypeDescriptor {
            tag,
            array_slots: vec![("min", ScalarTag::F32), ("max", ScalarTag::F32), ("num_divisions", ScalarTag::U32)],
            object_slots: vec![],
        },
        TypeTag::RectilinearGrid => ObjectTypeDescriptor {
            tag,
            array_slots: vec![("x", ScalarTag::F32), ("y", ScalarTag::F32), ("z", ScalarTag::F32)],
            object_slots: vec![],
        },
        TypeTag::StructuredGrid | TypeTag::LayeredGrid => ObjectTypeDescriptor {
            tag,
            array_slots: vec![("x", ScalarTag::F32), ("y", ScalarTag::F32), ("z", ScalarTag::F32)],
            object_slots: vec!["normals"],
        },
        TypeTag::UnstructuredGrid => ObjectTypeDescriptor {
            tag,
            array_slots: vec![
                ("x", ScalarTag::F32),
                ("y", ScalarTag::F32),
                ("z", ScalarTag::F32),
                ("connectivity", ScalarTag::U32),
                ("element_list", ScalarTag::U32),
                ("type_list", ScalarTag::U8),
            ],
            object_slots: vec!["normals"],
        },
        TypeTag::Celltree1 => ObjectTypeDescriptor { tag, array_slots: vec![("nodes", ScalarTag::CelltreeNode1)], object_slots: vec![] },
        TypeTag::Celltree2 => ObjectTypeDescriptor { tag, array_slots: vec![("nodes", ScalarTag::CelltreeNode2)], object_slots: vec![] },
        TypeTag::Celltree3 => ObjectTypeDescriptor { tag, array_slots: vec![("nodes", ScalarTag::CelltreeNode3)], object_slots: vec![] },
        TypeTag::VertexOwnerList => ObjectTypeDescriptor {
            tag,
            array_slots: vec![("vertex_list", ScalarTag::U32), ("vertex_owner", ScalarTag::U32)],
            object_slots: vec![],
        },
        TypeTag::Normals => ObjectTypeDescriptor {
            tag,
            array_slots: vec![("x", ScalarTag::F32), ("y", ScalarTag::F32), ("z", ScalarTag::F32)],
            object_slots: vec![],
        },
        TypeTag::Texture1d => ObjectTypeDescriptor {
            tag,
            array_slots: vec![("pixels", ScalarTag::U8), ("coords", ScalarTag::F32)],
            object_slots: vec![],
        },
        TypeTag::Empty | TypeTag::Placeholder => ObjectTypeDescriptor { tag, array_slots: vec![], object_slots: vec![] },
        TypeTag::Vec { elem, .. } => ObjectTypeDescriptor { tag, array_slots: vec![("data", elem.scalar_tag())], object_slots: vec![] },
    }
}

fn all_known_tags() -> Vec<TypeTag> {
    let mut tags = vec![
        TypeTag::Points,
        TypeTag::Lines,
        TypeTag::Triangles,
        TypeTag::Quads,
        TypeTag::Polygons,
        TypeTag::Indexed,
        TypeTag::UniformGrid,
        TypeTag::RectilinearGrid,
        TypeTag::StructuredGrid,
        TypeTag::LayeredGrid,
        TypeTag::UnstructuredGrid,
        TypeTag::Celltree1,
        TypeTag::Celltree2,
        TypeTag::Celltree3,
        TypeTag::VertexOwnerList,
        TypeTag::Normals,
        TypeTag::Texture1d,
        TypeTag::Empty,
        TypeTag::Placeholder,
    ];
    let elems = [
        VecElem::Char,
        VecElem::I8,
        VecElem::U8,
        VecElem::I32,
        VecElem::U32,
        VecElem::I64,
        VecElem::U64,
        VecElem::F32,
        VecElem::F64,
    ];
    for &elem in &elems {
        for dim in 1..=3u8 {
            tags.push(TypeTag::Vec { elem, dim });
        }
    }
    tags
}

lazy_static! {
    /// Idempotent process-wide registration (spec.md §4.8): built once,
    /// lazily, covering every concrete type listed in the spec.
    static ref CATALOG: HashMap<TypeTag, ObjectTypeDescriptor> =
        all_known_tags().into_iter().map(|t| (t, static_descriptor(t))).collect();
}

/// Looks up a type's descriptor; fails with `type_not_registered` for an
/// id the catalog does not know (spec.md §4.8).
pub fn lookup(tag: TypeTag) -> Result<&'static ObjectTypeDescriptor, CoreError> {
    CATALOG.get(&tag).ok_or_else(|| CoreError::TypeNotRegistered(format!("{tag:?}")))
}

/// Encodes a type tag as a stable wire code (spec.md §4.4's "type tag"
/// archive field): the tag's position in the registration order, which
/// `all_known_tags` keeps fixed across calls.
pub fn to_wire(tag: TypeTag) -> u16 {
    all_known_tags().iter().position(|&t| t == tag).expect("tag missing from all_known_tags") as u16
}

pub fn from_wire(code: u16) -> Result<TypeTag, CoreError> {
    all_known_tags()
        .get(code as usize)
        .copied()
        .ok_or_else(|| CoreError::TypeNotRegistered(format!("wire code {code}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_tag_is_registered() {
        for tag in all_known_tags() {
            assert!(lookup(tag).is_ok(), "{tag:?} missing from catalog");
        }
    }

    #[test]
    fn points_descriptor_has_three_coordinate_slots() {
        let d = lookup(TypeTag::Points).unwrap();
        assert_eq!(d.array_slots.len(), 3);
        assert!(d.object_slots.is_empty());
    }

    #[test]
    fn vec_descriptor_uses_requested_scalar_tag() {
        let d = lookup(TypeTag::Vec { elem: VecElem::F64, dim: 2 }).unwrap();
        assert_eq!(d.array_slots[0].1, ScalarTag::F64);
    }
}
