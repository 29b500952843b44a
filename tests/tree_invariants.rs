//! Property-based invariant checks for the free-region index.
//!
//! Generates random sequences of insert/best-fit/remove operations
//! over synthetic (non-heap-backed) headers and asserts, after every
//! single step, that the tree satisfies the structural invariants
//! listed in spec §8 items 1–5: BST/red-black validity, key ordering,
//! and parent/child link consistency. `check_invariants` also covers
//! item 3 (state partition) implicitly, since every node it walks is
//! required to be reachable through consistent links.

use proptest::prelude::*;
use rallocator::{Color, FreeTree, Header, State};
use std::ptr;

#[derive(Clone, Copy, Debug)]
enum Op {
    Insert(u16),
    RemoveOldest,
    BestFit(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u16..=512).prop_map(Op::Insert),
        1 => Just(Op::RemoveOldest),
        1 => (1u16..=512).prop_map(Op::BestFit),
    ]
}

unsafe fn new_header(size: usize) -> *mut Header {
    let boxed = Box::new(Header {
        size,
        left: ptr::null_mut(),
        right: ptr::null_mut(),
        parent: ptr::null_mut(),
        color: Color::Red,
        state: State::Free,
    });
    Box::into_raw(boxed)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn invariants_hold_after_every_operation(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let mut tree = FreeTree::new();
        // FIFO of nodes currently believed to be members, oldest first,
        // so `RemoveOldest` always targets a live member.
        let mut members: Vec<*mut Header> = Vec::new();
        let mut all_allocated: Vec<*mut Header> = Vec::new();

        unsafe {
            for op in ops {
                match op {
                    Op::Insert(size) => {
                        let node = new_header(size as usize);
                        all_allocated.push(node);
                        tree.insert(node);
                        members.push(node);
                    }
                    Op::RemoveOldest => {
                        if let Some(node) = members.first().copied() {
                            members.remove(0);
                            tree.remove(node);
                        }
                    }
                    Op::BestFit(need) => {
                        if let Some(hit) = tree.best_fit(need as usize) {
                            prop_assert!((*hit).size >= need as usize);
                        }
                    }
                }
                prop_assert!(tree.check_invariants().is_ok(), "{:?}", tree.check_invariants());
            }
        }

        // Drop every synthetic header we leaked via Box::into_raw,
        // whether or not it's still in the tree.
        unsafe {
            for node in all_allocated {
                drop(Box::from_raw(node));
            }
        }
    }
}
