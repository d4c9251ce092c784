//! The object store (spec.md §4.2): refcounted, name-addressed typed
//! records with metadata, an attribute map, and a reentrant-locked
//! attachment map. Each object is a `lluvia` entity, exactly as the
//! array store uses one per array -- completion state and refcounting
//! again ride on the same entity-lifetime mechanism.

use crate::array::ArrayStore;
use crate::catalog::{self, TypeTag};
use parking_lot::ReentrantMutex;
use lluvia as ll;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use utils::{CoreError, CoreResult};

pub use crate::array::{ArrayElement, ArrayRef};

/// Per-object scalar metadata (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct ObjectMeta {
    pub block_index: u32,
    pub block_count: u32,
    pub timestep: i32,
    pub timestep_count: i32,
    pub iteration: i32,
    pub generation: u32,
    pub creator_id: u32,
    pub transform: [f64; 16],
    pub real_time: f64,
}

impl Default for ObjectMeta {
    fn default() -> Self {
        let mut transform = [0.0; 16];
        for i in 0..4 {
            transform[i * 4 + i] = 1.0;
        }
        ObjectMeta {
            block_index: 0,
            block_count: 1,
            timestep: -1,
            timestep_count: -1,
            iteration: -1,
            generation: 0,
            creator_id: 0,
            transform,
            real_time: 0.0,
        }
    }
}

/// A type-erased strong reference into one of the array store's
/// scalar-typed tables, used to populate a concrete object's array slots
/// (spec.md §4.8's per-type "add strong references to arrays").
pub enum AnyArrayRef {
    I8(ArrayRef<i8>),
    U8(ArrayRef<u8>),
    I32(ArrayRef<i32>),
    U32(ArrayRef<u32>),
    I64(ArrayRef<i64>),
    U64(ArrayRef<u64>),
    F32(ArrayRef<f32>),
    F64(ArrayRef<f64>),
}

impl AnyArrayRef {
    pub fn tag(&self) -> codec::ScalarTag {
        use codec::ScalarTag::*;
        match self {
            AnyArrayRef::I8(_) => I8,
            AnyArrayRef::U8(_) => U8,
            AnyArrayRef::I32(_) => I32,
            AnyArrayRef::U32(_) => U32,
            AnyArrayRef::I64(_) => I64,
            AnyArrayRef::U64(_) => U64,
            AnyArrayRef::F32(_) => F32,
            AnyArrayRef::F64(_) => F64,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AnyArrayRef::I8(r) => &r.name,
            AnyArrayRef::U8(r) => &r.name,
            AnyArrayRef::I32(r) => &r.name,
            AnyArrayRef::U32(r) => &r.name,
            AnyArrayRef::I64(r) => &r.name,
            AnyArrayRef::U64(r) => &r.name,
            AnyArrayRef::F32(r) => &r.name,
            AnyArrayRef::F64(r) => &r.name,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            AnyArrayRef::I8(r) => r.size(),
            AnyArrayRef::U8(r) => r.size(),
            AnyArrayRef::I32(r) => r.size(),
            AnyArrayRef::U32(r) => r.size(),
            AnyArrayRef::I64(r) => r.size(),
            AnyArrayRef::U64(r) => r.size(),
            AnyArrayRef::F32(r) => r.size(),
            AnyArrayRef::F64(r) => r.size(),
        }
    }

    /// Whether this array is flagged exact (spec.md §3): a saver must
    /// never pick a lossy codec for it regardless of policy.
    pub fn is_exact(&self) -> bool {
        match self {
            AnyArrayRef::I8(r) => r.is_exact(),
            AnyArrayRef::U8(r) => r.is_exact(),
            AnyArrayRef::I32(r) => r.is_exact(),
            AnyArrayRef::U32(r) => r.is_exact(),
            AnyArrayRef::I64(r) => r.is_exact(),
            AnyArrayRef::U64(r) => r.is_exact(),
            AnyArrayRef::F32(r) => r.is_exact(),
            AnyArrayRef::F64(r) => r.is_exact(),
        }
    }
}

impl Clone for AnyArrayRef {
    fn clone(&self) -> Self {
        match self {
            AnyArrayRef::I8(r) => AnyArrayRef::I8(r.clone()),
            AnyArrayRef::U8(r) => AnyArrayRef::U8(r.clone()),
            AnyArrayRef::I32(r) => AnyArrayRef::I32(r.clone()),
            AnyArrayRef::U32(r) => AnyArrayRef::U32(r.clone()),
            AnyArrayRef::I64(r) => AnyArrayRef::I64(r.clone()),
            AnyArrayRef::U64(r) => AnyArrayRef::U64(r.clone()),
            AnyArrayRef::F32(r) => AnyArrayRef::F32(r.clone()),
            AnyArrayRef::F64(r) => AnyArrayRef::F64(r.clone()),
        }
    }
}

type AttachmentMap = Arc<ReentrantMutex<RefCell<HashMap<String, ObjectRef>>>>;

struct ObjectStoreInner {
    instance: ll::Instance,
    name_index: RwLock<HashMap<String, ll::Entity>>,
    seq: AtomicU64,
    process_tag: String,

    tag: ll::Component<TypeTag>,
    name_comp: ll::Component<String>,
    meta: ll::Component<ObjectMeta>,
    attributes: ll::Component<HashMap<String, Vec<String>>>,
    attachments: ll::Component<AttachmentMap>,
    array_slots: ll::Component<HashMap<String, AnyArrayRef>>,
    object_slots: ll::Component<HashMap<String, ObjectRef>>,
    unresolved: ll::Component<AtomicU32>,
    complete: ll::Component<AtomicBool>,
    refcount: ll::Component<AtomicUsize>,
}

/// Owns the name->object index for one object graph (spec.md §4.2).
#[derive(Clone)]
pub struct ObjectStore {
    inner: Arc<ObjectStoreInner>,
}

impl ObjectStore {
    pub fn new(process_tag: impl Into<String>) -> Self {
        let mut instance = ll::Instance::new();
        let tag = instance.add_component();
        let name_comp = instance.add_component();
        let meta = instance.add_component();
        let attributes = instance.add_component();
        let attachments = instance.add_component();
        let array_slots = instance.add_component();
        let object_slots = instance.add_component();
        let unresolved = instance.add_component();
        let complete = instance.add_component();
        let refcount = instance.add_component();

        ObjectStore {
            inner: Arc::new(ObjectStoreInner {
                instance,
                name_index: RwLock::new(HashMap::new()),
                seq: AtomicU64::new(0),
                process_tag: process_tag.into(),
                tag,
                name_comp,
                meta,
                attributes,
                attachments,
                array_slots,
                object_slots,
                unresolved,
                complete,
                refcount,
            }),
        }
    }

    fn fresh_name(&self) -> String {
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-obj-{}", self.inner.process_tag, seq)
    }

    /// Builds a new object of `type_tag`, creating an empty array for
    /// every numeric array slot the catalog declares for that type
    /// (spec.md §4.8's `create_empty`).
    pub fn create(&self, type_tag: TypeTag, name_or_empty: &str, meta: ObjectMeta, arrays: &ArrayStore) -> CoreResult<ObjectRef> {
        let descriptor = catalog::lookup(type_tag)?;
        let name = if name_or_empty.is_empty() { self.fresh_name() } else { name_or_empty.to_string() };

        let mut slots = HashMap::new();
        for (slot, scalar_tag) in &descriptor.array_slots {
            if let Some(any) = create_slot_array(arrays, &format!("{name}::{slot}"), *scalar_tag)? {
                slots.insert((*slot).to_string(), any);
            }
        }

        self.build_entity(type_tag, &name, meta, slots)
    }

    /// Builds a scaffold with no pre-populated array slots: used by the
    /// archive reader (spec.md §4.4), which supplies every array slot
    /// itself from the stream instead of the catalog's empty defaults.
    pub fn create_empty_shell(&self, type_tag: TypeTag, name_or_empty: &str, meta: ObjectMeta) -> CoreResult<ObjectRef> {
        let name = if name_or_empty.is_empty() { self.fresh_name() } else { name_or_empty.to_string() };
        self.build_entity(type_tag, &name, meta, HashMap::new())
    }

    fn build_entity(&self, type_tag: TypeTag, name: &str, meta: ObjectMeta, slots: HashMap<String, AnyArrayRef>) -> CoreResult<ObjectRef> {
        let mut index = self.inner.name_index.write().unwrap();
        if index.contains_key(name) {
            return Err(CoreError::ConsistencyError(format!("object name '{name}' already in use")));
        }

        let mut instance = self.inner.instance.clone();
        let entity = instance.add_entity();
        self.inner.tag.set(&entity, type_tag);
        self.inner.name_comp.set(&entity, name.to_string());
        self.inner.meta.set(&entity, meta);
        self.inner.attributes.set(&entity, HashMap::new());
        self.inner.attachments.set(&entity, Arc::new(ReentrantMutex::new(RefCell::new(HashMap::new()))));
        self.inner.array_slots.set(&entity, slots);
        self.inner.object_slots.set(&entity, HashMap::new());
        self.inner.unresolved.set(&entity, AtomicU32::new(0));
        self.inner.complete.set(&entity, AtomicBool::new(true));
        self.inner.refcount.set(&entity, AtomicUsize::new(1));

        index.insert(name.to_string(), entity.clone());
        drop(index);

        Ok(ObjectRef { store: self.clone(), entity, name: name.to_string() })
    }

    /// Creates a placeholder object (spec.md §4.2's load state machine):
    /// all metadata, no data, starting incomplete.
    pub fn create_placeholder(&self, type_tag: TypeTag, name: &str) -> CoreResult<ObjectRef> {
        let obj = self.create_empty_shell(type_tag, name, ObjectMeta::default())?;
        obj.store.inner.complete.get(&obj.entity).unwrap().store(false, Ordering::Release);
        Ok(obj)
    }

    /// Looks up `name`; filters incomplete objects unless `only_complete` is false.
    pub fn lookup(&self, name: &str, only_complete: bool) -> Option<ObjectRef> {
        let index = self.inner.name_index.write().unwrap();
        let entity = index.get(name)?.clone();
        if only_complete {
            let complete = self.inner.complete.get(&entity)?.load(Ordering::Acquire);
            if !complete {
                return None;
            }
        }
        self.inner.refcount.get(&entity)?.fetch_add(1, Ordering::AcqRel);
        Some(ObjectRef { store: self.clone(), entity, name: name.to_string() })
    }

    fn release(&self, entity: &ll::Entity, name: &str) {
        let mut index = self.inner.name_index.write().unwrap();
        let rc = self.inner.refcount.get(entity).expect("entity missing refcount component");
        if rc.fetch_sub(1, Ordering::AcqRel) == 1 {
            index.remove(name);
        }
    }
}

fn create_slot_array(arrays: &ArrayStore, name: &str, tag: codec::ScalarTag) -> CoreResult<Option<AnyArrayRef>> {
    use codec::ScalarTag::*;
    Ok(Some(match tag {
        I8 => AnyArrayRef::I8(arrays.create(name, 0)?),
        U8 => AnyArrayRef::U8(arrays.create(name, 0)?),
        I32 => AnyArrayRef::I32(arrays.create(name, 0)?),
        U32 => AnyArrayRef::U32(arrays.create(name, 0)?),
        I64 => AnyArrayRef::I64(arrays.create(name, 0)?),
        U64 => AnyArrayRef::U64(arrays.create(name, 0)?),
        F32 => AnyArrayRef::F32(arrays.create(name, 0)?),
        F64 => AnyArrayRef::F64(arrays.create(name, 0)?),
        // Celltree node records are not a numeric `ArrayElement`; the
        // slot is declared for validation purposes only (see catalog.rs).
        CelltreeNode1 | CelltreeNode2 | CelltreeNode3 => return Ok(None),
    }))
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore").field("process_tag", &self.inner.process_tag).finish()
    }
}

/// A strong reference to one object record (spec.md §3).
pub struct ObjectRef {
    store: ObjectStore,
    entity: ll::Entity,
    pub name: String,
}

impl ObjectRef {
    pub fn type_tag(&self) -> TypeTag {
        *self.store.inner.tag.get(&self.entity).expect("object missing type tag")
    }

    pub fn meta(&self) -> ObjectMeta {
        *self.store.inner.meta.get(&self.entity).expect("object missing metadata")
    }

    pub fn set_meta(&self, meta: ObjectMeta) {
        self.store.inner.meta.set(&self.entity, meta);
    }

    pub fn refcount(&self) -> usize {
        self.store.inner.refcount.get(&self.entity).map(|rc| rc.load(Ordering::Acquire)).unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.store.inner.complete.get(&self.entity).map(|c| c.load(Ordering::Acquire)).unwrap_or(false)
    }

    pub fn unresolved_count(&self) -> u32 {
        self.store.inner.unresolved.get(&self.entity).map(|u| u.load(Ordering::Acquire)).unwrap_or(0)
    }

    /// Registers one more pending fetch; the object becomes incomplete
    /// until a matching number of `reference_resolved` calls land.
    pub fn unresolved_reference(&self) {
        self.store.inner.unresolved.get(&self.entity).expect("missing unresolved counter").fetch_add(1, Ordering::AcqRel);
        self.store.inner.complete.get(&self.entity).expect("missing complete flag").store(false, Ordering::Release);
    }

    /// Resolves one pending fetch; if this was the last one, marks the
    /// object complete and invokes `on_complete`.
    pub fn reference_resolved(&self, on_complete: impl FnOnce()) {
        let counter = self.store.inner.unresolved.get(&self.entity).expect("missing unresolved counter");
        let prev = counter.fetch_sub(1, Ordering::AcqRel);
        if prev == 1 {
            self.store.inner.complete.get(&self.entity).expect("missing complete flag").store(true, Ordering::Release);
            on_complete();
        }
    }

    // -- attributes --------------------------------------------------

    pub fn add_attribute(&self, key: &str, value: impl Into<String>) {
        let mut attrs = self.store.inner.attributes.get_mut(&self.entity).expect("missing attribute map");
        attrs.entry(key.to_string()).or_default().push(value.into());
    }

    pub fn set_attribute_list(&self, key: &str, values: Vec<String>) {
        let mut attrs = self.store.inner.attributes.get_mut(&self.entity).expect("missing attribute map");
        attrs.insert(key.to_string(), values);
    }

    pub fn get_attributes(&self, key: &str) -> Option<Vec<String>> {
        self.store.inner.attributes.get(&self.entity)?.get(key).cloned()
    }

    pub fn get_attribute_list(&self) -> Vec<(String, Vec<String>)> {
        self.store
            .inner
            .attributes
            .get(&self.entity)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    // -- attachments (reentrant: may be traversed while held) --------

    fn attachment_map(&self) -> AttachmentMap {
        self.store.inner.attachments.get(&self.entity).expect("missing attachment map").clone()
    }

    pub fn add_attachment(&self, key: &str, obj: ObjectRef) -> CoreResult<()> {
        let map = self.attachment_map();
        let guard = map.lock();
        let mut borrow = guard.borrow_mut();
        if borrow.contains_key(key) {
            return Err(CoreError::ConsistencyError(format!("attachment '{key}' already present")));
        }
        borrow.insert(key.to_string(), obj);
        Ok(())
    }

    pub fn get_attachment(&self, key: &str) -> Option<ObjectRef> {
        let map = self.attachment_map();
        let guard = map.lock();
        guard.borrow().get(key).cloned()
    }

    pub fn remove_attachment(&self, key: &str) -> Option<ObjectRef> {
        let map = self.attachment_map();
        let guard = map.lock();
        guard.borrow_mut().remove(key)
    }

    pub fn has_attachment(&self, key: &str) -> bool {
        let map = self.attachment_map();
        let guard = map.lock();
        guard.borrow().contains_key(key)
    }

    /// Copies every attachment from `src` into `self`; when `replace` is
    /// false, keys already present in `self` are left untouched.
    pub fn copy_attachments(&self, src: &ObjectRef, replace: bool) {
        let src_map = src.attachment_map();
        let entries: Vec<(String, ObjectRef)> = {
            let guard = src_map.lock();
            guard.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let dst_map = self.attachment_map();
        let guard = dst_map.lock();
        let mut borrow = guard.borrow_mut();
        for (key, obj) in entries {
            if replace || !borrow.contains_key(&key) {
                borrow.insert(key, obj);
            }
        }
    }

    // -- array / object slots ----------------------------------------

    pub fn array_slot(&self, slot: &str) -> Option<AnyArrayRef> {
        self.store.inner.array_slots.get(&self.entity)?.get(slot).cloned()
    }

    pub fn set_array_slot(&self, slot: &str, array: AnyArrayRef) {
        self.store.inner.array_slots.get_mut(&self.entity).expect("missing array slot map").insert(slot.to_string(), array);
    }

    pub fn array_slot_names(&self) -> Vec<String> {
        self.store.inner.array_slots.get(&self.entity).map(|m| m.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn object_slot(&self, slot: &str) -> Option<ObjectRef> {
        self.store.inner.object_slots.get(&self.entity)?.get(slot).cloned()
    }

    pub fn set_object_slot(&self, slot: &str, obj: ObjectRef) {
        self.store.inner.object_slots.get_mut(&self.entity).expect("missing object slot map").insert(slot.to_string(), obj);
    }

    pub fn object_slot_names(&self) -> Vec<String> {
        self.store.inner.object_slots.get(&self.entity).map(|m| m.keys().cloned().collect()).unwrap_or_default()
    }

    /// Deep-copies this object's data block under a fresh name; arrays
    /// are shared by refcount, not duplicated (spec.md §4.2).
    pub fn clone_object(&self, arrays: &ArrayStore) -> CoreResult<ObjectRef> {
        let fresh = self.store.create(self.type_tag(), "", self.meta(), arrays)?;
        for slot in self.array_slot_names() {
            if let Some(arr) = self.array_slot(&slot) {
                fresh.set_array_slot(&slot, arr);
            }
        }
        for (key, values) in self.get_attribute_list() {
            fresh.set_attribute_list(&key, values);
        }
        fresh.copy_attachments(self, true);
        Ok(fresh)
    }

    /// Yields an empty instance of the same concrete type.
    pub fn clone_type(&self, arrays: &ArrayStore) -> CoreResult<ObjectRef> {
        self.store.create(self.type_tag(), "", ObjectMeta::default(), arrays)
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> Self {
        self.store.inner.refcount.get(&self.entity).expect("missing refcount").fetch_add(1, Ordering::AcqRel);
        ObjectRef { store: self.store.clone(), entity: self.entity.clone(), name: self.name.clone() }
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        self.store.release(&self.entity, &self.name);
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("name", &self.name)
            .field("type_tag", &self.type_tag())
            .field("refcount", &self.refcount())
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeTag;

    #[test]
    fn create_allocates_declared_array_slots() {
        let arrays = ArrayStore::new("t");
        let objects = ObjectStore::new("t");
        let p = objects.create(TypeTag::Points, "pts", ObjectMeta::default(), &arrays).unwrap();
        assert_eq!(p.array_slot_names().len(), 3);
        assert!(p.array_slot("x").is_some());
    }

    #[test]
    fn lookup_filters_incomplete_by_default() {
        let arrays = ArrayStore::new("t");
        let objects = ObjectStore::new("t");
        let p = objects.create(TypeTag::Empty, "root", ObjectMeta::default(), &arrays).unwrap();
        p.unresolved_reference();
        assert!(objects.lookup("root", true).is_none());
        assert!(objects.lookup("root", false).is_some());
        p.reference_resolved(|| {});
        assert!(objects.lookup("root", true).is_some());
    }

    #[test]
    fn reference_resolved_fires_only_at_zero() {
        let arrays = ArrayStore::new("t");
        let objects = ObjectStore::new("t");
        let p = objects.create(TypeTag::Empty, "root", ObjectMeta::default(), &arrays).unwrap();
        p.unresolved_reference();
        p.unresolved_reference();
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let f2 = fired.clone();
        p.reference_resolved(move || f2.store(true, Ordering::SeqCst));
        assert!(!fired.load(Ordering::SeqCst));
        let f2 = fired.clone();
        p.reference_resolved(move || f2.store(true, Ordering::SeqCst));
        assert!(fired.load(Ordering::SeqCst));
        assert!(p.is_complete());
    }

    #[test]
    fn shared_attachment_bumps_refcount() {
        let arrays = ArrayStore::new("t");
        let objects = ObjectStore::new("t");
        let n = objects.create(TypeTag::Normals, "N", ObjectMeta::default(), &arrays).unwrap();
        let a = objects.create(TypeTag::Empty, "A", ObjectMeta::default(), &arrays).unwrap();
        let b = objects.create(TypeTag::Empty, "B", ObjectMeta::default(), &arrays).unwrap();
        assert_eq!(n.refcount(), 1);
        a.add_attachment("norm", n.clone()).unwrap();
        b.add_attachment("norm", n.clone()).unwrap();
        assert_eq!(n.refcount(), 3);
        assert!(a.get_attachment("norm").unwrap() == b.get_attachment("norm").unwrap());
    }

    #[test]
    fn duplicate_attachment_key_is_refused() {
        let arrays = ArrayStore::new("t");
        let objects = ObjectStore::new("t");
        let n1 = objects.create(TypeTag::Normals, "N1", ObjectMeta::default(), &arrays).unwrap();
        let n2 = objects.create(TypeTag::Normals, "N2", ObjectMeta::default(), &arrays).unwrap();
        let a = objects.create(TypeTag::Empty, "A", ObjectMeta::default(), &arrays).unwrap();
        a.add_attachment("norm", n1).unwrap();
        assert!(a.add_attachment("norm", n2).is_err());
    }

    #[test]
    fn destroy_releases_name_and_attachment_refcount() {
        let arrays = ArrayStore::new("t");
        let objects = ObjectStore::new("t");
        let n = objects.create(TypeTag::Normals, "N", ObjectMeta::default(), &arrays).unwrap();
        {
            let a = objects.create(TypeTag::Empty, "A", ObjectMeta::default(), &arrays).unwrap();
            a.add_attachment("norm", n.clone()).unwrap();
            assert_eq!(n.refcount(), 2);
        }
        assert_eq!(n.refcount(), 1);
        assert!(objects.lookup("A", false).is_none());
    }
}
