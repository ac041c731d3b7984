// This module groups the runtime metadata that compiled encoders depend on at execution
// time: the growable Bitmap primitive, the collector-aware raw allocator, and stack maps
// with their process-wide retention set. None of it knows about the SSA IR; the encoder
// program builder feeds it one bit per frame word.

//! Runtime metadata for JIT-managed memory.

pub mod alloc;
pub mod bitmap;
pub mod stackmap;

pub use alloc::{alloc_gc, alloc_stats, AllocStats, GcBlock, TypeDescriptor, BYTE_TYPE};
pub use bitmap::Bitmap;
pub use stackmap::{StackMap, StackMapBuilder};
