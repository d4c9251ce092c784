//! The array store (spec.md §4.1): typed, refcounted, name-addressed
//! vectors. Each array is a `lluvia` entity; its size/capacity live in
//! the entity's `Vec<T>` component directly, and dropping the last
//! `ArrayRef` to an entity lets `lluvia` clear its component data the
//! same way the teacher's `Atmosphere` relies on `Entity`'s `Arc`-based
//! lifetime to free per-client/per-surface state.

use codec::ScalarTag;
use lluvia as ll;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use utils::{CoreError, CoreResult};

/// Scalar types the array store can hold (spec.md §3: `{i8,u8,i32,u32,i64,u64,f32,f64}`).
pub trait ArrayElement: Copy + Default + Send + Sync + 'static {
    const TAG: ScalarTag;
    fn to_f64(self) -> f64;
    /// Inverse of `to_f64`, used by the lossy codecs' shared f64-based
    /// quantization path (archive's Zfp/Sz3/BigWhoop dispatch) to convert
    /// decoded values back into this array's concrete element type.
    fn from_f64(x: f64) -> Self;
    #[doc(hidden)]
    fn component(store: &ArrayStore) -> &ll::Component<Vec<Self>>;
}

macro_rules! impl_array_element {
    ($t:ty, $tag:expr, $field:ident, int) => {
        impl ArrayElement for $t {
            const TAG: ScalarTag = $tag;
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn from_f64(x: f64) -> Self {
                x.round() as $t
            }
            fn component(store: &ArrayStore) -> &ll::Component<Vec<Self>> {
                &store.inner.$field
            }
        }
    };
    ($t:ty, $tag:expr, $field:ident, float) => {
        impl ArrayElement for $t {
            const TAG: ScalarTag = $tag;
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn from_f64(x: f64) -> Self {
                x as $t
            }
            fn component(store: &ArrayStore) -> &ll::Component<Vec<Self>> {
                &store.inner.$field
            }
        }
    };
}

impl_array_element!(i8, ScalarTag::I8, data_i8, int);
impl_array_element!(u8, ScalarTag::U8, data_u8, int);
impl_array_element!(i32, ScalarTag::I32, data_i32, int);
impl_array_element!(u32, ScalarTag::U32, data_u32, int);
impl_array_element!(i64, ScalarTag::I64, data_i64, int);
impl_array_element!(u64, ScalarTag::U64, data_u64, int);
impl_array_element!(f32, ScalarTag::F32, data_f32, float);
impl_array_element!(f64, ScalarTag::F64, data_f64, float);

struct ArrayStoreInner {
    instance: ll::Instance,
    name_index: RwLock<HashMap<String, ll::Entity>>,
    seq: AtomicU64,
    process_tag: String,

    tag: ll::Component<ScalarTag>,
    dim_hint: ll::Component<(u32, u32, u32)>,
    exact: ll::Component<bool>,
    minmax: ll::Component<Option<(f64, f64)>>,
    refcount: ll::Component<AtomicUsize>,

    data_i8: ll::Component<Vec<i8>>,
    data_u8: ll::Component<Vec<u8>>,
    data_i32: ll::Component<Vec<i32>>,
    data_u32: ll::Component<Vec<u32>>,
    data_i64: ll::Component<Vec<i64>>,
    data_u64: ll::Component<Vec<u64>>,
    data_f32: ll::Component<Vec<f32>>,
    data_f64: ll::Component<Vec<f64>>,
}

/// Owns the name->array index for one array arena (spec.md §4.1).
/// Cheap to clone: internally an `Arc`, the way `lluvia::Instance` itself is.
#[derive(Clone)]
pub struct ArrayStore {
    inner: Arc<ArrayStoreInner>,
}

impl ArrayStore {
    pub fn new(process_tag: impl Into<String>) -> Self {
        let mut instance = ll::Instance::new();
        let tag = instance.add_component();
        let dim_hint = instance.add_component();
        let exact = instance.add_component();
        let minmax = instance.add_component();
        let refcount = instance.add_component();
        let data_i8 = instance.add_component();
        let data_u8 = instance.add_component();
        let data_i32 = instance.add_component();
        let data_u32 = instance.add_component();
        let data_i64 = instance.add_component();
        let data_u64 = instance.add_component();
        let data_f32 = instance.add_component();
        let data_f64 = instance.add_component();

        ArrayStore {
            inner: Arc::new(ArrayStoreInner {
                instance,
                name_index: RwLock::new(HashMap::new()),
                seq: AtomicU64::new(0),
                process_tag: process_tag.into(),
                tag,
                dim_hint,
                exact,
                minmax,
                refcount,
                data_i8,
                data_u8,
                data_i32,
                data_u32,
                data_i64,
                data_u64,
                data_f32,
                data_f64,
            }),
        }
    }

    fn fresh_name(&self) -> String {
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.inner.process_tag, seq)
    }

    /// Allocates a new array of `size` elements, publishes it under
    /// `name_or_empty` (or a generated name if empty), and returns a
    /// handle with refcount 1.
    pub fn create<T: ArrayElement>(&self, name_or_empty: &str, size: usize) -> CoreResult<ArrayRef<T>> {
        let name = if name_or_empty.is_empty() { self.fresh_name() } else { name_or_empty.to_string() };

        let mut index = self.inner.name_index.write().unwrap();
        if index.contains_key(&name) {
            return Err(CoreError::ConsistencyError(format!("array name '{name}' already in use")));
        }

        let mut instance = self.inner.instance.clone();
        let entity = instance.add_entity();
        self.inner.tag.set(&entity, T::TAG);
        self.inner.dim_hint.set(&entity, (0, 1, 1));
        self.inner.exact.set(&entity, false);
        self.inner.minmax.set(&entity, None);
        self.inner.refcount.set(&entity, AtomicUsize::new(1));
        T::component(self).set(&entity, vec![T::default(); size]);

        index.insert(name.clone(), entity.clone());
        drop(index);

        Ok(ArrayRef { store: self.clone(), entity, name, _marker: PhantomData })
    }

    /// Looks up `name` and, if it exists and its stored scalar tag
    /// matches `T`, atomically bumps its refcount and returns a handle.
    pub fn find_and_ref<T: ArrayElement>(&self, name: &str) -> Option<ArrayRef<T>> {
        let index = self.inner.name_index.write().unwrap();
        let entity = index.get(name)?.clone();
        let tag = *self.inner.tag.get(&entity)?;
        if tag != T::TAG {
            return None;
        }
        self.inner
            .refcount
            .get(&entity)
            .expect("entity missing refcount component")
            .fetch_add(1, Ordering::AcqRel);
        Some(ArrayRef { store: self.clone(), entity, name: name.to_string(), _marker: PhantomData })
    }

    /// Explicitly drops a handle, matching spec.md §4.1's named
    /// `destroy(name, ref)` operation (equivalent to just dropping `r`).
    pub fn destroy<T: ArrayElement>(&self, r: ArrayRef<T>) {
        drop(r)
    }

    fn release(&self, entity: &ll::Entity, name: &str) {
        let mut index = self.inner.name_index.write().unwrap();
        let rc = self.inner.refcount.get(entity).expect("entity missing refcount component");
        if rc.fetch_sub(1, Ordering::AcqRel) == 1 {
            index.remove(name);
        }
    }
}

impl fmt::Debug for ArrayStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayStore")
            .field("process_tag", &self.inner.process_tag)
            .field("entities", &self.inner.instance.num_entities())
            .finish()
    }
}

/// A strong, refcounted reference to one typed array (spec.md §3).
pub struct ArrayRef<T: ArrayElement> {
    store: ArrayStore,
    entity: ll::Entity,
    pub name: String,
    _marker: PhantomData<T>,
}

impl<T: ArrayElement> ArrayRef<T> {
    pub fn size(&self) -> usize {
        T::component(&self.store).get(&self.entity).map(|v| v.len()).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        T::component(&self.store).get(&self.entity).map(|v| v.capacity()).unwrap_or(0)
    }

    pub fn dim_hint(&self) -> (u32, u32, u32) {
        self.store.inner.dim_hint.get(&self.entity).map(|h| *h).unwrap_or((0, 1, 1))
    }

    pub fn set_dim_hint(&self, hint: (u32, u32, u32)) {
        self.store.inner.dim_hint.set(&self.entity, hint);
    }

    pub fn is_exact(&self) -> bool {
        self.store.inner.exact.get(&self.entity).map(|v| *v).unwrap_or(false)
    }

    pub fn set_exact(&self, exact: bool) {
        self.store.inner.exact.set(&self.entity, exact);
    }

    pub fn refcount(&self) -> usize {
        self.store.inner.refcount.get(&self.entity).map(|rc| rc.load(Ordering::Acquire)).unwrap_or(0)
    }

    pub fn resize(&self, new_len: usize) {
        if let Some(mut data) = T::component(&self.store).get_mut(&self.entity) {
            data.resize(new_len, T::default());
        }
        self.invalidate_bounds();
    }

    pub fn reserve(&self, additional: usize) {
        if let Some(mut data) = T::component(&self.store).get_mut(&self.entity) {
            data.reserve(additional);
        }
    }

    pub fn push_back(&self, value: T) {
        if let Some(mut data) = T::component(&self.store).get_mut(&self.entity) {
            data.push(value);
        }
        self.invalidate_bounds();
    }

    /// Identical to `push_back`; Rust has no placement-new distinction.
    pub fn emplace_back(&self, value: T) {
        self.push_back(value)
    }

    pub fn clear(&self) {
        if let Some(mut data) = T::component(&self.store).get_mut(&self.entity) {
            data.clear();
        }
        self.invalidate_bounds();
    }

    pub fn at(&self, idx: usize) -> Option<T> {
        T::component(&self.store).get(&self.entity)?.get(idx).copied()
    }

    pub fn to_vec(&self) -> Vec<T> {
        T::component(&self.store).get(&self.entity).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.store.inner.minmax.get(&self.entity).and_then(|b| *b)
    }

    /// Recomputes and caches the element-wise min/max (spec.md §4.1).
    pub fn update_bounds(&self) {
        let bounds = T::component(&self.store).get(&self.entity).and_then(|data| {
            if data.is_empty() {
                return None;
            }
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &v in data.iter() {
                let f = v.to_f64();
                lo = lo.min(f);
                hi = hi.max(f);
            }
            Some((lo, hi))
        });
        self.store.inner.minmax.set(&self.entity, bounds);
    }

    pub fn invalidate_bounds(&self) {
        self.store.inner.minmax.set(&self.entity, None);
    }
}

impl<T: ArrayElement> Clone for ArrayRef<T> {
    fn clone(&self) -> Self {
        self.store
            .inner
            .refcount
            .get(&self.entity)
            .expect("entity missing refcount component")
            .fetch_add(1, Ordering::AcqRel);
        ArrayRef { store: self.store.clone(), entity: self.entity.clone(), name: self.name.clone(), _marker: PhantomData }
    }
}

impl<T: ArrayElement> Drop for ArrayRef<T> {
    fn drop(&mut self) {
        self.store.release(&self.entity, &self.name);
    }
}

impl<T: ArrayElement> fmt::Debug for ArrayRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("name", &self.name)
            .field("size", &self.size())
            .field("refcount", &self.refcount())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_find_share_refcount() {
        let store = ArrayStore::new("test");
        let a = store.create::<f32>("coords", 10).unwrap();
        assert_eq!(a.refcount(), 1);
        let b = store.find_and_ref::<f32>("coords").unwrap();
        assert_eq!(a.refcount(), 2);
        assert_eq!(b.refcount(), 2);
        drop(b);
        assert_eq!(a.refcount(), 1);
    }

    #[test]
    fn find_and_ref_rejects_scalar_mismatch() {
        let store = ArrayStore::new("test");
        let _a = store.create::<f32>("coords", 4).unwrap();
        assert!(store.find_and_ref::<i32>("coords").is_none());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let store = ArrayStore::new("test");
        let _a = store.create::<f32>("coords", 4).unwrap();
        let err = store.create::<f32>("coords", 4).unwrap_err();
        assert!(matches!(err, CoreError::ConsistencyError(_)));
    }

    #[test]
    fn empty_name_generates_unique_names() {
        let store = ArrayStore::new("p0");
        let a = store.create::<u8>("", 1).unwrap();
        let b = store.create::<u8>("", 1).unwrap();
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn destroy_at_zero_refcount_frees_the_name() {
        let store = ArrayStore::new("test");
        let a = store.create::<i32>("arr", 3).unwrap();
        store.destroy(a);
        assert!(store.find_and_ref::<i32>("arr").is_none());
    }

    #[test]
    fn update_bounds_computes_min_max() {
        let store = ArrayStore::new("test");
        let a = store.create::<f32>("arr", 0).unwrap();
        for v in [3.0f32, -1.0, 7.5, 2.0] {
            a.push_back(v);
        }
        assert!(a.bounds().is_none());
        a.update_bounds();
        let (lo, hi) = a.bounds().unwrap();
        assert_eq!(lo, -1.0);
        assert_eq!(hi, 7.5);
    }

    #[test]
    fn mutation_invalidates_cached_bounds() {
        let store = ArrayStore::new("test");
        let a = store.create::<f32>("arr", 0).unwrap();
        a.push_back(1.0);
        a.update_bounds();
        assert!(a.bounds().is_some());
        a.push_back(2.0);
        assert!(a.bounds().is_none());
    }
}
