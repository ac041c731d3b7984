// This module provides the collector-aware allocation primitive used by runtime metadata.
// Every allocation is tagged with a TypeDescriptor telling the collector which prefix of
// the block may hold pointers (ptr_data); a descriptor with ptr_data == 0 marks the block
// as raw bytes the default scanner never looks inside. Stack map bitmaps are allocated
// this way: they describe pointers elsewhere but contain none themselves. The allocator
// also keeps process-wide counters (blocks, bytes, no-scan bytes) that tests and
// diagnostics read through alloc_stats().

//! Collector-aware raw allocation.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Layout summary the collector consults when scanning a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Human readable type name.
    pub name: &'static str,
    /// Size of one element in bytes.
    pub size: usize,
    /// Length of the prefix that may contain pointers. Zero means no-scan.
    pub ptr_data: usize,
}

impl TypeDescriptor {
    /// Whether the collector can skip the block entirely.
    #[inline]
    pub const fn is_no_scan(&self) -> bool {
        self.ptr_data == 0
    }
}

/// Plain byte data; never scanned.
pub static BYTE_TYPE: TypeDescriptor = TypeDescriptor {
    name: "uint8",
    size: 1,
    ptr_data: 0,
};

/// Fill pattern for blocks requested without zeroing (debug builds only).
const POISON: u8 = 0xa5;

static BLOCKS: AtomicUsize = AtomicUsize::new(0);
static BYTES: AtomicUsize = AtomicUsize::new(0);
static NO_SCAN_BYTES: AtomicUsize = AtomicUsize::new(0);

/// Snapshot of the allocator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub blocks: usize,
    pub bytes: usize,
    pub no_scan_bytes: usize,
}

/// Read the process-wide allocation counters.
pub fn alloc_stats() -> AllocStats {
    AllocStats {
        blocks: BLOCKS.load(Ordering::Relaxed),
        bytes: BYTES.load(Ordering::Relaxed),
        no_scan_bytes: NO_SCAN_BYTES.load(Ordering::Relaxed),
    }
}

/// A block of collector-managed memory.
///
/// The block is reclaimed when its owner is dropped unless the owner has been
/// made permanently reachable (see [`StackMap::pin`](super::StackMap::pin)).
#[derive(Debug)]
pub struct GcBlock {
    ty: &'static TypeDescriptor,
    data: Box<[u8]>,
}

impl GcBlock {
    /// Descriptor the block was allocated with.
    #[inline]
    pub fn ty(&self) -> &'static TypeDescriptor {
        self.ty
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Allocate `size` bytes described by `ty`.
///
/// When `zero` is false the caller promises to overwrite the whole block
/// before reading it; debug builds fill it with a poison pattern so stale
/// reads are visible.
pub fn alloc_gc(size: usize, ty: &'static TypeDescriptor, zero: bool) -> GcBlock {
    let fill = if zero || !cfg!(debug_assertions) { 0 } else { POISON };
    let data = vec![fill; size].into_boxed_slice();

    BLOCKS.fetch_add(1, Ordering::Relaxed);
    BYTES.fetch_add(size, Ordering::Relaxed);
    if ty.is_no_scan() {
        NO_SCAN_BYTES.fetch_add(size, Ordering::Relaxed);
    }
    log::trace!("alloc_gc: {} bytes of {} (zero: {})", size, ty.name, zero);

    GcBlock { ty, data }
}
