//! Archive reader (spec.md §4.4): streams a byte buffer produced by
//! `ArchiveWriter` back into live `store` objects and arrays.

use crate::codecs;
use crate::format::{self, RecordKind};
use byteorder::{LittleEndian, ReadBytesExt};
use codec::ScalarTag;
use std::collections::HashMap;
use std::io::Cursor;
use store::{AnyArrayRef, ArrayStore, ObjectMeta, ObjectRef, ObjectStore, TypeTag};
use utils::{CoreError, CoreResult};

/// Injected by a deep fetcher (§4.5) to resolve an object reference the
/// reader could not satisfy from within this archive's own bytes.
pub trait DeepFetch {
    /// Requests out-of-band resolution of `name`; the fetcher must call
    /// `on_resolved` once the placeholder it is attached to becomes
    /// complete. The reader has already bumped the owner's
    /// unresolved-reference counter before calling this.
    fn request_object(&self, name: &str, on_resolved: Box<dyn FnOnce() + Send>);

    /// Requests out-of-band resolution of array `name`; the fetcher must
    /// call `on_resolved` once the array has been decoded into the
    /// destination store. The reader has already bumped the owning
    /// object's unresolved-reference counter before calling this.
    fn request_array(&self, name: &str, on_resolved: Box<dyn FnOnce() + Send>);
}

/// Reads every top-level record in `bytes`, returning the objects that
/// were not purely `ObjectRefOnly` markers, in the order they were
/// written (spec.md §4.4 reader contract).
pub fn read_all(
    bytes: &[u8],
    objects: &ObjectStore,
    arrays: &ArrayStore,
    rename_objects: bool,
    fetcher: Option<&dyn DeepFetch>,
) -> CoreResult<Vec<ObjectRef>> {
    let mut cursor = Cursor::new(bytes);
    format::read_header(&mut cursor)?;

    let mut local_arrays: HashMap<String, AnyArrayRef> = HashMap::new();
    let mut local_objects: HashMap<String, ObjectRef> = HashMap::new();
    let mut ordered = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        let kind_byte = cursor.read_u8().map_err(|_| CoreError::ConsistencyError("truncated record kind".to_string()))?;
        let kind = RecordKind::from_byte(kind_byte)?;
        let name = format::read_string(&mut cursor)?;
        let body_len = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| CoreError::ConsistencyError("truncated record body length".to_string()))? as usize;

        let body_start = cursor.position() as usize;
        let body_end = body_start
            .checked_add(body_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| CoreError::ConsistencyError("record body length exceeds buffer".to_string()))?;
        let mut body = Cursor::new(&bytes[body_start..body_end]);

        match kind {
            RecordKind::Array => {
                let array = read_array_record(&mut body, &name, arrays)?;
                local_arrays.insert(name, array);
            }
            RecordKind::Object => {
                let obj = read_object_record(&mut body, &name, objects, rename_objects, &local_arrays, &mut local_objects, fetcher)?;
                local_objects.insert(name, obj.clone());
                ordered.push(obj);
            }
            RecordKind::ObjectRefOnly => {
                let resolved = objects.lookup(&name, false).unwrap_or_else(|| {
                    log::debug!("archive: '{name}' marked saved elsewhere but not found locally, registering placeholder");
                    objects.create_placeholder(TypeTag::Placeholder, &name).expect("placeholder name uniqueness")
                });
                local_objects.insert(name, resolved);
            }
        }

        // A record's length is authoritative regardless of how many bytes
        // its body parser actually consumed, so an unknown/partial body
        // can always be skipped cleanly (spec.md §6).
        cursor.set_position(body_end as u64);
    }

    Ok(ordered)
}

fn read_array_record(
    cursor: &mut Cursor<&[u8]>,
    name: &str,
    arrays: &ArrayStore,
) -> CoreResult<AnyArrayRef> {
    let scalar_tag_byte = cursor.read_u8().map_err(|_| CoreError::ConsistencyError("truncated array scalar tag".to_string()))?;
    let scalar_tag = ScalarTag::from_wire(scalar_tag_byte).ok_or_else(|| CoreError::ConsistencyError(format!("unknown scalar tag {scalar_tag_byte}")))?;
    let count = cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated array count".to_string()))? as usize;
    let exact = cursor.read_u8().map_err(|_| CoreError::ConsistencyError("truncated array exact flag".to_string()))? != 0;
    let dim_hint = (
        cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated dim hint".to_string()))?,
        cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated dim hint".to_string()))?,
        cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated dim hint".to_string()))?,
    );
    let minmax = format::read_option_minmax(cursor)?;
    let mode_tag = cursor.read_u8().map_err(|_| CoreError::ConsistencyError("truncated array codec tag".to_string()))?;
    let mode = codecs::mode_from_wire_tag(mode_tag)?;
    let body = format::read_bytes(cursor)?;

    macro_rules! load {
        ($t:ty, $variant:ident) => {{
            let existing = arrays.find_and_ref::<$t>(name);
            let array_ref = match existing {
                Some(r) => r,
                None => arrays.create::<$t>(name, 0)?,
            };
            let values: Vec<$t> = codecs::decode(&mode, &body, count)?;
            array_ref.clear();
            for v in values {
                array_ref.push_back(v);
            }
            array_ref.set_dim_hint(dim_hint);
            array_ref.set_exact(exact);
            if minmax.is_some() {
                array_ref.update_bounds();
            }
            AnyArrayRef::$variant(array_ref)
        }};
    }

    Ok(match scalar_tag {
        ScalarTag::I8 => load!(i8, I8),
        ScalarTag::U8 => load!(u8, U8),
        ScalarTag::I32 => load!(i32, I32),
        ScalarTag::U32 => load!(u32, U32),
        ScalarTag::I64 => load!(i64, I64),
        ScalarTag::U64 => load!(u64, U64),
        ScalarTag::F32 => load!(f32, F32),
        ScalarTag::F64 => load!(f64, F64),
        ScalarTag::CelltreeNode1 | ScalarTag::CelltreeNode2 | ScalarTag::CelltreeNode3 => {
            return Err(CoreError::ConsistencyError(format!("{scalar_tag} is not a loadable array element")))
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn read_object_record(
    cursor: &mut Cursor<&[u8]>,
    name: &str,
    objects: &ObjectStore,
    rename_objects: bool,
    local_arrays: &HashMap<String, AnyArrayRef>,
    local_objects: &mut HashMap<String, ObjectRef>,
    fetcher: Option<&dyn DeepFetch>,
) -> CoreResult<ObjectRef> {
    let type_wire = cursor.read_u16::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated object type tag".to_string()))?;
    let type_tag = store::catalog::from_wire(type_wire)?;
    let meta = read_meta(cursor)?;

    let local_name = if rename_objects { String::new() } else { name.to_string() };
    let obj = match objects.lookup(name, false) {
        Some(existing) if !rename_objects => {
            existing.set_meta(meta);
            existing
        }
        // No pre-populated slots here: every array/object slot this
        // object needs is supplied explicitly below from the archive,
        // which would otherwise collide with `create`'s catalog-default
        // slot arrays sharing the same "{name}::{slot}" names.
        _ => objects.create_empty_shell(type_tag, &local_name, meta)?,
    };

    let array_slot_count = cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated array slot count".to_string()))?;
    for _ in 0..array_slot_count {
        let slot = format::read_string(cursor)?;
        let array_name = format::read_string(cursor)?;
        match local_arrays.get(&array_name) {
            Some(array) => obj.set_array_slot(&slot, array.clone()),
            None => {
                // Referenced array never appeared in this stream: mark
                // permanently unresolved unless a fetcher can chase it
                // down (spec.md §4.4 failure semantics).
                log::warn!("archive: object '{name}' references unknown array '{array_name}' in slot '{slot}'");
                obj.unresolved_reference();
                if let Some(f) = fetcher {
                    let owner = obj.clone();
                    f.request_array(&array_name, Box::new(move || owner.reference_resolved(|| {})));
                }
            }
        }
    }

    let object_slot_count = cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated object slot count".to_string()))?;
    for _ in 0..object_slot_count {
        let slot = format::read_string(cursor)?;
        let ref_name = format::read_string(cursor)?;
        match local_objects.get(&ref_name) {
            Some(target) if target.is_complete() => obj.set_object_slot(&slot, target.clone()),
            Some(target) => {
                obj.set_object_slot(&slot, target.clone());
                obj.unresolved_reference();
                if let Some(f) = fetcher {
                    let owner = obj.clone();
                    f.request_object(&ref_name, Box::new(move || owner.reference_resolved(|| {})));
                }
            }
            None => {
                // Referenced name never appeared in this stream: mark
                // permanently unresolved unless a fetcher can chase it
                // down (spec.md §4.4 failure semantics).
                log::warn!("archive: object '{name}' references unknown name '{ref_name}' in slot '{slot}'");
                obj.unresolved_reference();
                if let Some(f) = fetcher {
                    let owner = obj.clone();
                    f.request_object(&ref_name, Box::new(move || owner.reference_resolved(|| {})));
                }
            }
        }
    }

    let attribute_count = cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated attribute count".to_string()))?;
    for _ in 0..attribute_count {
        let key = format::read_string(cursor)?;
        let value_count = cursor.read_u32::<LittleEndian>().map_err(|_| CoreError::ConsistencyError("truncated attribute value count".to_string()))?;
        let mut values = Vec::with_capacity(value_count as usize);
        for _ in 0..value_count {
            values.push(format::read_string(cursor)?);
        }
        obj.set_attribute_list(&key, values);
    }

    Ok(obj)
}

fn read_meta(cursor: &mut Cursor<&[u8]>) -> CoreResult<ObjectMeta> {
    let err = || CoreError::ConsistencyError("truncated object metadata".to_string());
    let block_index = cursor.read_u32::<LittleEndian>().map_err(|_| err())?;
    let block_count = cursor.read_u32::<LittleEndian>().map_err(|_| err())?;
    let timestep = cursor.read_i32::<LittleEndian>().map_err(|_| err())?;
    let timestep_count = cursor.read_i32::<LittleEndian>().map_err(|_| err())?;
    let iteration = cursor.read_i32::<LittleEndian>().map_err(|_| err())?;
    let generation = cursor.read_u32::<LittleEndian>().map_err(|_| err())?;
    let creator_id = cursor.read_u32::<LittleEndian>().map_err(|_| err())?;
    let mut transform = [0.0f64; 16];
    for slot in &mut transform {
        *slot = cursor.read_f64::<LittleEndian>().map_err(|_| err())?;
    }
    let real_time = cursor.read_f64::<LittleEndian>().map_err(|_| err())?;
    Ok(ObjectMeta { block_index, block_count, timestep, timestep_count, iteration, generation, creator_id, transform, real_time })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{ArchiveWriter, WriterPolicy};
    use byteorder::WriteBytesExt;
    use codec::ArrayCodecMode;

    struct RawPolicy;
    impl WriterPolicy for RawPolicy {
        fn mode_for(&self, _name: &str) -> ArrayCodecMode {
            ArrayCodecMode::Raw
        }
    }

    #[test]
    fn round_trips_an_object_with_array_slots() {
        let arrays = ArrayStore::new("src");
        let objects = ObjectStore::new("src");
        let pts = objects.create(TypeTag::Points, "pts", ObjectMeta::default(), &arrays).unwrap();
        if let Some(AnyArrayRef::F32(x)) = pts.array_slot("x") {
            x.push_back(1.0);
            x.push_back(2.0);
        }

        let policy = RawPolicy;
        let never_elsewhere = |_: &str| false;
        let mut writer = ArchiveWriter::new(&policy, &never_elsewhere);
        writer.write_object(&pts);
        let bytes = writer.into_bytes();

        let dst_arrays = ArrayStore::new("dst");
        let dst_objects = ObjectStore::new("dst");
        let loaded = read_all(&bytes, &dst_objects, &dst_arrays, false, None).unwrap();
        assert_eq!(loaded.len(), 1);
        let reloaded = &loaded[0];
        assert_eq!(reloaded.type_tag(), TypeTag::Points);
        if let Some(AnyArrayRef::F32(x)) = reloaded.array_slot("x") {
            assert_eq!(x.to_vec(), vec![1.0, 2.0]);
        } else {
            panic!("expected an F32 x slot");
        }
    }

    #[test]
    fn object_ref_only_marker_without_local_match_becomes_placeholder() {
        let arrays = ArrayStore::new("src");
        let objects = ObjectStore::new("src");
        let owner = objects.create(TypeTag::Empty, "owner", ObjectMeta::default(), &arrays).unwrap();
        let remote = objects.create(TypeTag::Empty, "remote", ObjectMeta::default(), &arrays).unwrap();
        owner.set_object_slot("dep", remote.clone());

        let policy = RawPolicy;
        let already_elsewhere = |n: &str| n == "remote";
        let mut writer = ArchiveWriter::new(&policy, &already_elsewhere);
        writer.write_object(&owner);
        let bytes = writer.into_bytes();

        let dst_arrays = ArrayStore::new("dst");
        let dst_objects = ObjectStore::new("dst");
        let loaded = read_all(&bytes, &dst_objects, &dst_arrays, false, None).unwrap();
        let reloaded_owner = loaded.iter().find(|o| o.name == "owner").unwrap();
        assert!(!reloaded_owner.is_complete());
        assert_eq!(reloaded_owner.unresolved_count(), 1);
    }

    #[test]
    fn missing_array_in_stream_leaves_object_unresolved() {
        // Hand-assemble a stream whose object record references an array
        // slot name that no Array record in the stream ever defines, the
        // way a partial deep-save (spec.md §4.5) would omit one already
        // known to be present at the remote end.
        let mut bytes = Vec::new();
        format::write_header(&mut bytes);

        let mut record = Vec::new();
        record.write_u16::<LittleEndian>(store::catalog::to_wire(TypeTag::Points)).unwrap();
        write_meta_for_test(&mut record, &ObjectMeta::default());
        record.write_u32::<LittleEndian>(1).unwrap(); // one array slot
        format::write_string(&mut record, "x");
        format::write_string(&mut record, "ghost-array");
        record.write_u32::<LittleEndian>(0).unwrap(); // no object slots
        record.write_u32::<LittleEndian>(0).unwrap(); // no attributes
        format::write_record(&mut bytes, RecordKind::Object, "pts", &record);

        let dst_arrays = ArrayStore::new("dst");
        let dst_objects = ObjectStore::new("dst");
        let loaded = read_all(&bytes, &dst_objects, &dst_arrays, false, None).unwrap();
        let reloaded = &loaded[0];
        assert!(!reloaded.is_complete());
        assert_eq!(reloaded.unresolved_count(), 1);
    }

    fn write_meta_for_test(out: &mut Vec<u8>, meta: &ObjectMeta) {
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

    #[test]
    fn truncated_header_is_an_error() {
        let err = read_all(&[1, 2, 3], &ObjectStore::new("d"), &ArrayStore::new("d"), false, None).unwrap_err();
        assert!(matches!(err, CoreError::ConsistencyError(_)));
    }
}
