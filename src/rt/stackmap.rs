//! Pointer bitmaps ("stack maps") for JIT-managed memory regions.
//!
//! A stack map describes a region word by word: bit `i` is set when word `i`
//! holds a pointer the collector must trace. Maps are assembled with
//! [`StackMapBuilder`] while a routine is compiled and frozen with
//! [`StackMapBuilder::build`].
//!
//! Compiled code refers to its stack map through a raw address obtained from
//! [`StackMap::pin`]. Such an address is invisible to ordinary reachability,
//! so pinning also inserts the map into a process-wide retention set that is
//! never pruned.
//!
//! # Example
//!
//! ```
//! use jitenc::rt::{StackMapBuilder, stackmap};
//!
//! let mut builder = StackMapBuilder::new();
//! builder.add_field(true); // word 0: pointer
//! builder.add_fields(3, false); // words 1..4: scalars
//!
//! let map = builder.build();
//! let handle = map.pin();
//! drop(map);
//!
//! let again = stackmap::lookup_pinned(handle).unwrap();
//! assert_eq!(again.bit_len(), 4);
//! assert!(again.is_pointer(0));
//! ```

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

use super::alloc::{alloc_gc, GcBlock, BYTE_TYPE};
use super::bitmap::Bitmap;

// =============================================================================
// StackMap
// =============================================================================

/// Immutable pointer bitmap.
#[derive(Debug)]
pub struct StackMap {
    /// Number of bitmaps; always 1.
    n: i32,
    /// Bit length of each bitmap.
    l: i32,
    /// Packed bits, allocated as no-scan bytes.
    b: GcBlock,
}

impl StackMap {
    /// Number of bitmaps stored in this map.
    #[inline]
    pub fn bitmap_count(&self) -> i32 {
        self.n
    }

    /// Number of described words.
    #[inline]
    pub fn bit_len(&self) -> usize {
        self.l as usize
    }

    /// Packed bitmap bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.b.as_slice()
    }

    /// Whether word `i` holds a traced pointer.
    ///
    /// # Panics
    ///
    /// Panics if `i` is outside the described region.
    #[inline]
    pub fn is_pointer(&self, i: usize) -> bool {
        assert!(i < self.bit_len(), "stackmap: word {} out of range", i);
        self.bytes()[i / 8] & (1 << (i % 8)) != 0
    }

    /// Indices of all pointer words.
    pub fn pointer_words(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.bit_len()).filter(move |&i| self.is_pointer(i))
    }

    /// Pin the map for the rest of the process and return its raw handle.
    ///
    /// The handle is the map's address. Pinning the same map again returns
    /// the same handle and leaves the retention set unchanged.
    pub fn pin(self: &Arc<Self>) -> usize {
        let handle = Arc::as_ptr(self) as usize;
        let mut cache = retention_set().lock();
        cache.entry(handle).or_insert_with(|| Arc::clone(self));
        log::trace!("stackmap: pinned {:#x} ({} words)", handle, self.l);
        handle
    }
}

// =============================================================================
// Retention set
// =============================================================================

/// Pinned maps, keyed by handle. Grows for the lifetime of the process.
fn retention_set() -> &'static Mutex<HashMap<usize, Arc<StackMap>>> {
    static STACK_MAP_CACHE: OnceLock<Mutex<HashMap<usize, Arc<StackMap>>>> = OnceLock::new();
    STACK_MAP_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Resolve a handle returned by [`StackMap::pin`].
pub fn lookup_pinned(handle: usize) -> Option<Arc<StackMap>> {
    retention_set().lock().get(&handle).cloned()
}

/// Number of maps pinned so far.
pub fn pinned_count() -> usize {
    retention_set().lock().len()
}

// =============================================================================
// StackMapBuilder
// =============================================================================

/// Builder accumulating one bit per described word.
#[derive(Debug, Default, Clone)]
pub struct StackMapBuilder {
    b: Bitmap,
}

impl StackMapBuilder {
    /// Create a new, empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe the next word.
    #[inline]
    pub fn add_field(&mut self, is_pointer: bool) {
        self.b.append(is_pointer);
    }

    /// Describe the next `n` words, all of the same kind.
    #[inline]
    pub fn add_fields(&mut self, n: usize, is_pointer: bool) {
        self.b.append_many(n, is_pointer);
    }

    /// Number of words described so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.b.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Freeze the accumulated bits into a stack map.
    ///
    /// The result is ordinary shared memory until [`StackMap::pin`] is called.
    ///
    /// # Panics
    ///
    /// Panics if more than `i32::MAX` words were described.
    pub fn build(&self) -> Arc<StackMap> {
        let src = self.b.as_bytes();
        let l = i32::try_from(self.b.len()).expect("stackmap: too many fields");

        let mut bits = alloc_gc(src.len(), &BYTE_TYPE, false);
        bits.as_mut_slice().copy_from_slice(src);

        Arc::new(StackMap { n: 1, l, b: bits })
    }
}
