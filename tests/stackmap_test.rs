// This test suite covers the runtime metadata path end to end: Bitmap growth and bit
// packing, StackMapBuilder producing a map whose header and bits match the fields added,
// and pinning. Pinned maps must stay reachable through their handle after every other
// owner is gone, pinning the same map twice must return the same handle without growing
// the retention set, and distinct maps must get distinct handles. Tests that read the
// global retention set only assert lower bounds on its size, since other tests in this
// binary pin maps concurrently.

//! Bitmap and stack map behaviour through the public API.

use std::sync::Arc;

use jitenc::rt::{alloc_stats, stackmap, Bitmap, StackMapBuilder};

#[test]
fn bitmap_round_trip() {
    let pattern = [true, false, false, true, true, false, true, false, true, true, false];
    let mut bm = Bitmap::new();
    for &bit in &pattern {
        bm.append(bit);
    }

    assert_eq!(bm.len(), pattern.len());
    for (i, &bit) in pattern.iter().enumerate() {
        assert_eq!(bm.get(i), Some(bit), "bit {i}");
    }
    assert_eq!(bm.get(pattern.len()), None);
    assert_eq!(bm.as_bytes(), &[0b0101_1001, 0b0000_0011]);
}

#[test]
fn bitmap_growth_is_one_byte_per_eight_bits() {
    let mut bm = Bitmap::new();
    for k in 0..64usize {
        assert_eq!(bm.as_bytes().len(), k.div_ceil(8));
        bm.append(k % 3 == 0);
    }
    bm.append_many(17, true);
    assert_eq!(bm.len(), 81);
    assert_eq!(bm.as_bytes().len(), 11);
}

#[test]
fn bitmap_set_overwrites_in_place() {
    let mut bm = Bitmap::new();
    bm.append_many(12, false);
    bm.set(11, true);
    bm.set(0, true);
    bm.set(0, false);
    assert_eq!(bm.as_bytes(), &[0, 0b0000_1000]);
}

#[test]
fn builder_matches_fields() {
    let mut b = StackMapBuilder::new();
    b.add_field(false);
    b.add_fields(3, true);
    b.add_field(false);
    b.add_fields(0, true);
    b.add_fields(4, false);
    b.add_field(true);

    let map = b.build();
    assert_eq!(map.bitmap_count(), 1);
    assert_eq!(map.bit_len(), 10);
    assert_eq!(map.pointer_words().collect::<Vec<_>>(), vec![1, 2, 3, 9]);
    assert_eq!(map.bytes(), &[0b0000_1110, 0b0000_0010]);
}

#[test]
fn build_goes_through_collector_allocator() {
    let before = alloc_stats();
    let mut b = StackMapBuilder::new();
    b.add_fields(20, false);
    let _map = b.build();
    let after = alloc_stats();

    assert!(after.blocks > before.blocks);
    assert!(after.no_scan_bytes >= before.no_scan_bytes + 3);
}

#[test]
fn pinned_map_outlives_its_owners() {
    let handle = {
        let mut b = StackMapBuilder::new();
        b.add_fields(5, false);
        b.add_field(true);
        let map = b.build();
        map.pin()
    };

    let again = stackmap::lookup_pinned(handle).expect("pinned map is retained");
    assert_eq!(again.bit_len(), 6);
    assert!(again.is_pointer(5));
    assert!(!again.is_pointer(0));
}

#[test]
fn pin_is_idempotent_and_unique() {
    let mut b = StackMapBuilder::new();
    b.add_field(true);
    let first = b.build();
    let second = b.build();

    let h1 = first.pin();
    let count = stackmap::pinned_count();
    let h1_again = first.pin();
    assert_eq!(h1, h1_again);
    assert!(stackmap::pinned_count() >= count);

    let h2 = second.pin();
    assert_ne!(h1, h2);
    assert!(stackmap::pinned_count() >= 2);

    let looked_up = stackmap::lookup_pinned(h1).unwrap();
    assert!(Arc::ptr_eq(&looked_up, &first));
}

#[test]
fn unpinned_handles_are_unknown() {
    let mut b = StackMapBuilder::new();
    b.add_field(false);
    let map = b.build();
    assert!(stackmap::lookup_pinned(Arc::as_ptr(&map) as usize).is_none());
}
