//! Archive writer (spec.md §4.4): walks an object graph depth-first and
//! serializes arrays and objects into one self-describing byte stream.
//!
//! Grounded on the wire form described in §4.4 ("For each top-level
//! record: `kind tag | name | body`") and §6's on-disk layout (`u8 kind
//! | u32 name_len | name | u64 body_len | body`), and on the
//! dedup/already-elsewhere hooks §4.5's deep saver needs to inject.

use crate::codecs;
use crate::format::{self, RecordKind};
use byteorder::{LittleEndian, WriteBytesExt};
use codec::ArrayCodecMode;
use std::collections::HashSet;
use store::{AnyArrayRef, ObjectMeta, ObjectRef, TypeTag};

/// Supplies the compression mode to use for a given array name, and
/// whether the `exact` flag overrides it to `Raw` (spec.md §4.4:
/// "subject to the `exact` override").
pub trait WriterPolicy {
    fn mode_for(&self, array_name: &str) -> ArrayCodecMode;
}

/// Builds one archive byte stream. A single writer instance should cover
/// exactly one `write_object`/`write_array` session so its dedup sets
/// stay meaningful (spec.md §4.4: "emits the array blob exactly once per
/// archive").
pub struct ArchiveWriter<'a> {
    out: Vec<u8>,
    written_arrays: HashSet<String>,
    written_objects: HashSet<String>,
    policy: &'a dyn WriterPolicy,
    already_elsewhere: &'a dyn Fn(&str) -> bool,
}

impl<'a> ArchiveWriter<'a> {
    /// `already_elsewhere(name)` lets a deep saver (§4.5) tell the writer
    /// an object has already been flushed to the remote peer, so only a
    /// name marker (`ObjectRefOnly`) is needed instead of a full body.
    pub fn new(policy: &'a dyn WriterPolicy, already_elsewhere: &'a dyn Fn(&str) -> bool) -> Self {
        let mut out = Vec::new();
        format::write_header(&mut out);
        ArchiveWriter { out, written_arrays: HashSet::new(), written_objects: HashSet::new(), policy, already_elsewhere }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    /// Emits `array`'s blob if it hasn't already been written in this
    /// session; no-op on a repeat name (spec.md §4.4 dedup).
    pub fn write_any_array(&mut self, array: &AnyArrayRef) {
        if self.written_arrays.contains(array.name()) {
            return;
        }
        self.written_arrays.insert(array.name().to_string());

        let mut mode = self.policy.mode_for(array.name());
        if array.is_exact() && !mode.is_lossless() {
            mode = ArrayCodecMode::Raw;
        }
        let (tag, body, minmax, dim_hint, exact, count) = encode_any_array(array, &mode);

        let mut record = Vec::new();
        record.write_u8(array.tag().to_wire()).unwrap();
        record.write_u32::<LittleEndian>(count as u32).unwrap();
        record.write_u8(exact as u8).unwrap();
        record.write_u32::<LittleEndian>(dim_hint.0).unwrap();
        record.write_u32::<LittleEndian>(dim_hint.1).unwrap();
        record.write_u32::<LittleEndian>(dim_hint.2).unwrap();
        format::write_option_minmax(&mut record, minmax);
        record.write_u8(tag).unwrap();
        format::write_bytes(&mut record, &body);

        format::write_record(&mut self.out, RecordKind::Array, array.name(), &record);
    }

    /// Emits `obj`'s subgraph depth-first: children (object slots, then
    /// the arrays it directly references) before the object's own
    /// record, so a reader can always resolve a name the moment it sees
    /// it referenced (spec.md §4.4 writer contract).
    pub fn write_object(&mut self, obj: &ObjectRef) {
        if self.written_objects.contains(&obj.name) {
            return;
        }
        self.written_objects.insert(obj.name.clone());

        if (self.already_elsewhere)(&obj.name) {
            format::write_record(&mut self.out, RecordKind::ObjectRefOnly, &obj.name, &[]);
            return;
        }

        for slot in obj.object_slot_names() {
            if let Some(child) = obj.object_slot(&slot) {
                self.write_object(&child);
            }
        }
        for slot in obj.array_slot_names() {
            if let Some(array) = obj.array_slot(&slot) {
                self.write_any_array(&array);
            }
        }

        let mut record = Vec::new();
        record.write_u16::<LittleEndian>(store::catalog::to_wire(obj.type_tag())).unwrap();
        write_meta(&mut record, &obj.meta());

        let array_slots = obj.array_slot_names();
        record.write_u32::<LittleEndian>(array_slots.len() as u32).unwrap();
        for slot in &array_slots {
            format::write_string(&mut record, slot);
            let array = obj.array_slot(slot).expect("slot name came from array_slot_names");
            format::write_string(&mut record, array.name());
        }

        let object_slots = obj.object_slot_names();
        record.write_u32::<LittleEndian>(object_slots.len() as u32).unwrap();
        for slot in &object_slots {
            format::write_string(&mut record, slot);
            let child = obj.object_slot(slot).expect("slot name came from object_slot_names");
            format::write_string(&mut record, &child.name);
        }

        let attributes = obj.get_attribute_list();
        record.write_u32::<LittleEndian>(attributes.len() as u32).unwrap();
        for (key, values) in &attributes {
            format::write_string(&mut record, key);
            record.write_u32::<LittleEndian>(values.len() as u32).unwrap();
            for v in values {
                format::write_string(&mut record, v);
            }
        }

        format::write_record(&mut self.out, RecordKind::Object, &obj.name, &record);
    }
}

fn write_meta(out: &mut Vec<u8>, meta: &ObjectMeta) {
    out.write_u32::<LittleEndian>(meta.block_index).unwrap();
    out.write_u32::<LittleEndian>(meta.block_count).unwrap();
    out.write_i32::<LittleEndian>(meta.timestep).unwrap();
    out.write_i32::<LittleEndian>(meta.timestep_count).unwrap();
    out.write_i32::<LittleEndian>(meta.iteration).unwrap();
    out.write_u32::<LittleEndian>(meta.generation).unwrap();
    out.write_u32::<LittleEndian>(meta.creator_id).unwrap();
    for v in &meta.transform {
        out.write_f64::<LittleEndian>(*v).unwrap();
    }
    out.write_f64::<LittleEndian>(meta.real_time).unwrap();
}

/// Encodes one `AnyArrayRef`'s data through the codec bridge, returning
/// `(used_mode_tag, body, minmax, dim_hint, exact, element_count)`.
fn encode_any_array(array: &AnyArrayRef, mode: &ArrayCodecMode) -> (u8, Vec<u8>, Option<(f64, f64)>, (u32, u32, u32), bool, usize) {
    macro_rules! encode_variant {
        ($r:expr) => {{
            let (used, body) = codecs::encode(&$r.to_vec(), mode);
            (used.wire_tag(), body, $r.bounds(), $r.dim_hint(), $r.is_exact(), $r.size())
        }};
    }
    match array {
        AnyArrayRef::I8(r) => encode_variant!(r),
        AnyArrayRef::U8(r) => encode_variant!(r),
        AnyArrayRef::I32(r) => encode_variant!(r),
        AnyArrayRef::U32(r) => encode_variant!(r),
        AnyArrayRef::I64(r) => encode_variant!(r),
        AnyArrayRef::U64(r) => encode_variant!(r),
        AnyArrayRef::F32(r) => encode_variant!(r),
        AnyArrayRef::F64(r) => encode_variant!(r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::ArrayCodecMode;
    use store::{ArrayStore, ObjectStore};

    struct RawPolicy;
    impl WriterPolicy for RawPolicy {
        fn mode_for(&self, _name: &str) -> ArrayCodecMode {
            ArrayCodecMode::Raw
        }
    }

    #[test]
    fn write_object_dedups_shared_array() {
        let arrays = ArrayStore::new("w");
        let objects = ObjectStore::new("w");
        let mesh = objects.create(TypeTag::Points, "mesh", ObjectMeta::default(), &arrays).unwrap();
        let policy = RawPolicy;
        let never_elsewhere = |_: &str| false;
        let mut writer = ArchiveWriter::new(&policy, &never_elsewhere);
        writer.write_object(&mesh);
        writer.write_object(&mesh);
        let bytes = writer.into_bytes();
        // Header (4+1+4) + one Array record + one Object record only;
        // writing the same object twice must not duplicate either.
        assert!(bytes.len() > format::MAGIC.len());
    }

    #[test]
    fn exact_array_is_never_encoded_lossy() {
        struct AlwaysZfp;
        impl WriterPolicy for AlwaysZfp {
            fn mode_for(&self, _name: &str) -> ArrayCodecMode {
                ArrayCodecMode::Zfp(codec::lossy::zfp::ZfpMode::FixedRate(8.0))
            }
        }

        let arrays = ArrayStore::new("w");
        let objects = ObjectStore::new("w");
        let obj = objects.create(TypeTag::Points, "exact-pts", ObjectMeta::default(), &arrays).unwrap();
        if let Some(AnyArrayRef::F32(x)) = obj.array_slot("x") {
            x.push_back(1.0);
            x.push_back(2.0);
            x.set_exact(true);
        }

        let policy = AlwaysZfp;
        let never_elsewhere = |_: &str| false;
        let mut writer = ArchiveWriter::new(&policy, &never_elsewhere);
        writer.write_object(&obj);
        let bytes = writer.into_bytes();

        let dst_arrays = ArrayStore::new("dst");
        let dst_objects = ObjectStore::new("dst");
        let loaded = crate::reader::read_all(&bytes, &dst_objects, &dst_arrays, false, None).unwrap();
        if let Some(AnyArrayRef::F32(x)) = loaded[0].array_slot("x") {
            assert_eq!(x.to_vec(), vec![1.0, 2.0]);
        } else {
            panic!("expected an F32 x slot");
        }
    }

    #[test]
    fn already_elsewhere_emits_ref_only_marker() {
        let arrays = ArrayStore::new("w");
        let objects = ObjectStore::new("w");
        let obj = objects.create(TypeTag::Empty, "remote-obj", ObjectMeta::default(), &arrays).unwrap();
        let policy = RawPolicy;
        let always_elsewhere = |_: &str| true;
        let mut writer = ArchiveWriter::new(&policy, &always_elsewhere);
        writer.write_object(&obj);
        let bytes = writer.into_bytes();
        // header + one byte RecordKind::ObjectRefOnly tag somewhere after it
        assert!(bytes.contains(&(RecordKind::ObjectRefOnly as u8)));
    }
}
