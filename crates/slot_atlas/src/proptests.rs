use super::*;

use proptest::prelude::*;
use std::collections::BTreeSet;

const DOMAIN: u32 = 64;

#[derive(Debug, Clone, Copy)]
enum Op {
    Alloc(u32),
    AllocPinned(u32),
    TryAlloc(u32),
    Free(usize),
    Refresh(usize),
    FreeOldest,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        6 => (1u32..=DOMAIN / 2).prop_map(Op::Alloc),
        1 => (1u32..=DOMAIN / 8).prop_map(Op::AllocPinned),
        2 => (1u32..=DOMAIN / 2).prop_map(Op::TryAlloc),
        3 => any::<usize>().prop_map(Op::Free),
        3 => any::<usize>().prop_map(Op::Refresh),
        1 => Just(Op::FreeOldest),
    ];
    prop::collection::vec(op, 1..200)
}

fn pick(live: &BTreeSet<SlotHandle>, index: usize) -> Option<SlotHandle> {
    if live.is_empty() {
        return None;
    }
    live.iter().nth(index % live.len()).copied()
}

fn check_live_set(allocator: &SlotAllocator, live: &BTreeSet<SlotHandle>) {
    assert_eq!(allocator.len(), live.len());
    assert_eq!(allocator.tree().allocation_count(), live.len());
    let infos: Vec<SlotInfo> = live
        .iter()
        .map(|&handle| allocator.info(handle).expect("live handle must have info"))
        .collect();
    for (index, a) in infos.iter().enumerate() {
        assert!(a.size.is_power_of_two());
        assert!(a.size <= DOMAIN / 2);
        assert_eq!(a.x % a.size, 0, "slot must be aligned to its size");
        assert_eq!(a.y % a.size, 0, "slot must be aligned to its size");
        for b in &infos[index + 1..] {
            assert!(!a.overlaps(*b), "{a:?} overlaps {b:?}");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_tree_invariants_hold(ops in ops_strategy()) {
        let mut allocator = SlotAllocator::new(DOMAIN).unwrap();
        let mut live: BTreeSet<SlotHandle> = BTreeSet::new();
        let mut pinned: BTreeSet<SlotHandle> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Alloc(size) | Op::AllocPinned(size) | Op::TryAlloc(size) => {
                    let result = match op {
                        Op::Alloc(_) => allocator.alloc(size),
                        Op::AllocPinned(_) => allocator.alloc_pinned(size),
                        _ => allocator.try_alloc(size),
                    };
                    match result {
                        Ok(handle) => {
                            prop_assert!(!live.contains(&handle));
                            prop_assert_eq!(
                                allocator.info(handle).unwrap().size,
                                size.next_power_of_two()
                            );
                            live.insert(handle);
                            if matches!(op, Op::AllocPinned(_)) {
                                pinned.insert(handle);
                            }
                        }
                        Err(SlotAllocError::AtlasFull) => {
                            prop_assert!(matches!(op, Op::TryAlloc(_)));
                        }
                        Err(SlotAllocError::NoEvictionCandidate) => {
                            prop_assert!(!pinned.is_empty());
                            // a refused request evicts nothing
                            prop_assert!(live.iter().all(|&handle| allocator.valid(handle)));
                        }
                        Err(error) => prop_assert!(false, "unexpected error {error}"),
                    }
                    // evictions drop handles from the live set
                    live.retain(|&handle| allocator.valid(handle));
                    prop_assert!(pinned.iter().all(|&handle| allocator.valid(handle)));
                }
                Op::Free(index) => {
                    if let Some(handle) = pick(&live, index) {
                        prop_assert!(allocator.free(handle));
                        prop_assert!(!allocator.valid(handle));
                        prop_assert!(!allocator.free(handle));
                        live.remove(&handle);
                        pinned.remove(&handle);
                    }
                }
                Op::Refresh(index) => {
                    if let Some(handle) = pick(&live, index) {
                        prop_assert_eq!(allocator.refresh(handle), Some(handle));
                    }
                }
                Op::FreeOldest => {
                    match allocator.free_oldest() {
                        Ok(handle) => {
                            prop_assert!(live.remove(&handle));
                            prop_assert!(!pinned.contains(&handle));
                        }
                        Err(error) => {
                            prop_assert_eq!(error, SlotAllocError::NoEvictionCandidate);
                            prop_assert_eq!(live.len(), pinned.len());
                        }
                    }
                }
            }

            allocator.tree().validate();
            check_live_set(&allocator, &live);
        }
    }

    #[test]
    fn prop_refresh_protects_from_next_eviction(
        count in 2usize..16,
        refreshed in any::<usize>(),
    ) {
        let mut allocator = SlotAllocator::new(DOMAIN).unwrap();
        let handles: Vec<_> = (0..count).map(|_| allocator.alloc(8).unwrap()).collect();
        let keep = handles[refreshed % count];
        allocator.refresh(keep);

        let evicted = allocator.free_oldest().unwrap();
        prop_assert_ne!(evicted, keep);
        let expected = if keep == handles[0] { handles[1] } else { handles[0] };
        prop_assert_eq!(evicted, expected);
    }
}
