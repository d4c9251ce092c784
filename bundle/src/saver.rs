//! Deep saver (spec.md §4.5): "Saves a closed set of objects/arrays,
//! tracking what has already been saved (`archived_objects`,
//! `archived_arrays`) versus what is pending flush (`objects`, `arrays`)."

use archive::{ArchiveWriter, WriterPolicy};
use codec::message::compress as frame_compress;
use codec::{ArrayCodecMode, MessageCompression};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use store::{AnyArrayRef, ObjectRef};
use utils::CoreResult;

struct SaverState {
    objects: HashMap<String, Vec<u8>>,
    arrays: HashMap<String, Vec<u8>>,
    archived_objects: HashSet<String>,
    archived_arrays: HashSet<String>,
}

/// One entry in a saver's pending directory (spec.md §4.5's
/// `(name, is_array, size, data_ptr)` tuple, minus the raw pointer --
/// callers fetch the bytes themselves via `DeepSaver::blob`).
pub struct DirectoryEntry {
    pub name: String,
    pub is_array: bool,
    pub size: usize,
}

struct FixedModePolicy(ArrayCodecMode);
impl WriterPolicy for FixedModePolicy {
    fn mode_for(&self, _array_name: &str) -> ArrayCodecMode {
        self.0.clone()
    }
}

/// Serializes objects and arrays into framed archive blobs, deduplicating
/// against both what is pending and what has already been flushed.
pub struct DeepSaver {
    state: Mutex<SaverState>,
    array_mode: ArrayCodecMode,
    message_compression: MessageCompression,
}

impl DeepSaver {
    pub fn new(array_mode: ArrayCodecMode, message_compression: MessageCompression) -> Self {
        DeepSaver {
            state: Mutex::new(SaverState {
                objects: HashMap::new(),
                arrays: HashMap::new(),
                archived_objects: HashSet::new(),
                archived_arrays: HashSet::new(),
            }),
            array_mode,
            message_compression,
        }
    }

    /// Idempotent check: consults both the live and archived sets (spec.md
    /// §4.5).
    pub fn is_object_saved(&self, name: &str) -> bool {
        let s = self.state.lock();
        s.objects.contains_key(name) || s.archived_objects.contains(name)
    }

    pub fn is_array_saved(&self, name: &str) -> bool {
        let s = self.state.lock();
        s.arrays.contains_key(name) || s.archived_arrays.contains(name)
    }

    /// Serializes `obj`'s transitive subgraph into one archive blob,
    /// deferring to `ObjectRefOnly` markers for anything this saver
    /// already considers saved (spec.md §4.4's `already_elsewhere` hook).
    pub fn save_object(&self, name: &str, obj: &ObjectRef) -> CoreResult<()> {
        if self.is_object_saved(name) {
            return Ok(());
        }
        let policy = FixedModePolicy(self.array_mode.clone());
        let already_elsewhere = |n: &str| self.is_object_saved(n);
        let mut writer = ArchiveWriter::new(&policy, &already_elsewhere);
        writer.write_object(obj);
        let framed = frame_compress(&writer.into_bytes(), self.message_compression)?;
        self.state.lock().objects.insert(name.to_string(), framed);
        Ok(())
    }

    /// Serializes a single array into its own archive blob.
    pub fn save_array(&self, name: &str, array: &AnyArrayRef) -> CoreResult<()> {
        if self.is_array_saved(name) {
            return Ok(());
        }
        let policy = FixedModePolicy(self.array_mode.clone());
        let never_elsewhere = |_: &str| false;
        let mut writer = ArchiveWriter::new(&policy, &never_elsewhere);
        writer.write_any_array(array);
        let framed = frame_compress(&writer.into_bytes(), self.message_compression)?;
        self.state.lock().arrays.insert(name.to_string(), framed);
        Ok(())
    }

    /// Snapshot of everything saved since the last flush (spec.md §4.5
    /// `directory()`).
    pub fn directory(&self) -> Vec<DirectoryEntry> {
        let s = self.state.lock();
        let mut entries: Vec<DirectoryEntry> =
            s.objects.iter().map(|(n, b)| DirectoryEntry { name: n.clone(), is_array: false, size: b.len() }).collect();
        entries.extend(s.arrays.iter().map(|(n, b)| DirectoryEntry { name: n.clone(), is_array: true, size: b.len() }));
        entries
    }

    /// Returns the framed bytes for one directory entry, for a transport
    /// layer to ship alongside the directory snapshot.
    pub fn blob(&self, name: &str, is_array: bool) -> Option<Vec<u8>> {
        let s = self.state.lock();
        if is_array {
            s.arrays.get(name).cloned()
        } else {
            s.objects.get(name).cloned()
        }
    }

    /// Moves every pending entry into the archived sets and clears the
    /// pending maps (spec.md §4.5 `flush_directory`).
    pub fn flush_directory(&self) {
        let mut s = self.state.lock();
        let obj_names: Vec<String> = s.objects.keys().cloned().collect();
        let arr_names: Vec<String> = s.arrays.keys().cloned().collect();
        s.archived_objects.extend(obj_names);
        s.archived_arrays.extend(arr_names);
        s.objects.clear();
        s.arrays.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{ObjectMeta, ObjectStore, TypeTag};

    fn store_pair() -> (store::ArrayStore, ObjectStore) {
        (store::ArrayStore::new("saver-test"), ObjectStore::new("saver-test"))
    }

    #[test]
    fn save_object_is_idempotent() {
        let (arrays, objects) = store_pair();
        let obj = objects.create(TypeTag::Empty, "a", ObjectMeta::default(), &arrays).unwrap();
        let saver = DeepSaver::new(ArrayCodecMode::Raw, MessageCompression::None);
        saver.save_object("a", &obj).unwrap();
        assert!(saver.is_object_saved("a"));
        let before = saver.directory().len();
        saver.save_object("a", &obj).unwrap();
        assert_eq!(saver.directory().len(), before);
    }

    #[test]
    fn flush_directory_moves_pending_into_archived_and_clears_it() {
        let (arrays, objects) = store_pair();
        let obj = objects.create(TypeTag::Empty, "a", ObjectMeta::default(), &arrays).unwrap();
        let saver = DeepSaver::new(ArrayCodecMode::Raw, MessageCompression::None);
        saver.save_object("a", &obj).unwrap();
        assert_eq!(saver.directory().len(), 1);
        saver.flush_directory();
        assert_eq!(saver.directory().len(), 0);
        assert!(saver.is_object_saved("a"));
    }

    #[test]
    fn blob_round_trips_through_message_framing() {
        let (arrays, objects) = store_pair();
        let obj = objects.create(TypeTag::Points, "pts", ObjectMeta::default(), &arrays).unwrap();
        let saver = DeepSaver::new(ArrayCodecMode::Raw, MessageCompression::Lz4);
        saver.save_object("pts", &obj).unwrap();
        let blob = saver.blob("pts", false).unwrap();
        let unframed = codec::message::decompress(&blob).unwrap();
        assert_eq!(&unframed[..archive::format::MAGIC.len()], archive::format::MAGIC);
    }
}
