//! Property-based tests for decoder resilience and tree invariants.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;

use arbor_core::{Hash256, Path, Tree, Tree384};

#[derive(Debug, Clone)]
enum Op {
    Insert(u8),
    Flush(u16),
    Retract(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u8>().prop_map(Op::Insert),
        1 => any::<u16>().prop_map(Op::Flush),
        1 => any::<u16>().prop_map(Op::Retract),
    ]
}

/// Maps a raw number onto the retained window, so most ops are legal.
fn pick(tree: &Tree, raw: u16) -> u64 {
    let width = tree.max_index() - tree.min_index() + 1;
    tree.min_index() + u64::from(raw) % width
}

fn encoded(n: u8) -> Vec<u8> {
    let mut tree = Tree::new();
    for i in 0..n {
        tree.insert(Hash256::new([i; 32]));
    }
    let mut buf = Vec::new();
    tree.serialise(&mut buf).unwrap();
    buf
}

proptest! {
    /// Tree decoding should never panic on arbitrary bytes
    #[test]
    fn fuzz_tree_from_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let _ = Tree::deserialise(&bytes);
        let _ = Tree384::deserialise(&bytes);
    }

    /// Path decoding should never panic on arbitrary bytes
    #[test]
    fn fuzz_path_from_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
        let _ = Path::deserialise(&bytes);
    }

    /// Flipping any single byte of a valid encoding is either rejected or
    /// decodes to a tree that still satisfies its invariant
    #[test]
    fn fuzz_tree_bit_flips(n in 1u8..40, pos in any::<prop::sample::Index>(), mask in 1u8..=255) {
        let mut buf = encoded(n);
        let at = pos.index(buf.len());
        buf[at] ^= mask;
        if let Ok(tree) = Tree::deserialise(&buf) {
            prop_assert!(tree.invariant());
        }
    }

    /// Any legal sequence of operations keeps the invariant and the root of
    /// the equivalent freshly built tree
    #[test]
    fn ops_preserve_invariant(ops in prop::collection::vec(op_strategy(), 1..120)) {
        let mut tree = Tree::new();
        let mut leaves: Vec<Hash256> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(b) => {
                    let h = Hash256::new([b; 32]);
                    tree.insert(h);
                    leaves.push(h);
                }
                Op::Flush(raw) if !tree.is_empty() => {
                    let target = pick(&tree, raw);
                    prop_assert!(tree.flush_to(target).is_ok());
                }
                Op::Retract(raw) if !tree.is_empty() => {
                    let target = pick(&tree, raw);
                    prop_assert!(tree.retract_to(target).is_ok());
                    leaves.truncate(target as usize + 1);
                }
                _ => {}
            }
            prop_assert!(tree.invariant());
        }

        if !leaves.is_empty() {
            let mut fresh = Tree::new();
            fresh.insert_all(leaves.iter().copied());
            prop_assert_eq!(tree.root().unwrap(), fresh.root().unwrap());

            let mut buf = Vec::new();
            tree.serialise(&mut buf).unwrap();
            let decoded = Tree::deserialise(&buf).unwrap();
            prop_assert_eq!(decoded.root().unwrap(), fresh.root().unwrap());
            prop_assert_eq!(decoded.min_index(), tree.min_index());
        }
    }
}
