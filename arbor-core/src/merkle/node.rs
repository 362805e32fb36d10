use crate::hash::Hash;

/// A tree node exclusively owned by its parent (or by the forest table).
///
/// `Leaf` and `Branch` carry full detail. `Flushed` keeps only the digest of a
/// subtree whose children have been discarded; nothing below it can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<const N: usize> {
    Leaf(Hash<N>),
    Branch {
        hash: Hash<N>,
        left: Box<Node<N>>,
        right: Box<Node<N>>,
    },
    Flushed(Hash<N>),
}

impl<const N: usize> Node<N> {
    /// Join two children under a precomputed parent digest.
    pub fn join(hash: Hash<N>, left: Node<N>, right: Node<N>) -> Self {
        Node::Branch {
            hash,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn hash(&self) -> &Hash<N> {
        match self {
            Node::Leaf(hash) | Node::Flushed(hash) => hash,
            Node::Branch { hash, .. } => hash,
        }
    }

    pub fn is_flushed(&self) -> bool {
        matches!(self, Node::Flushed(_))
    }

    /// Drop all detail below this node, keeping its digest.
    pub fn flush(&mut self) {
        if !self.is_flushed() {
            *self = Node::Flushed(*self.hash());
        }
    }
}

/// Number of leaf positions covered by a subtree of the given height.
pub(crate) fn span(height: u32) -> u64 {
    1u64 << height
}

/// A subtree borrowed out of a tree, positioned by its first leaf and height.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Block<'a, const N: usize> {
    pub node: &'a Node<N>,
    pub start: u64,
    pub height: u32,
}

impl<'a, const N: usize> Block<'a, N> {
    pub fn new(node: &'a Node<N>, start: u64, height: u32) -> Self {
        Self { node, start, height }
    }

    /// Last leaf index covered (inclusive).
    pub fn end(&self) -> u64 {
        self.start + (span(self.height) - 1)
    }

    pub fn contains(&self, index: u64) -> bool {
        self.start <= index && index <= self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(val: u8) -> Hash<32> {
        let mut bytes = [0u8; 32];
        bytes[0] = val;
        Hash::new(bytes)
    }

    #[test]
    fn test_flush_keeps_digest() {
        let mut node = Node::join(h(9), Node::Leaf(h(1)), Node::Leaf(h(2)));
        assert!(!node.is_flushed());

        node.flush();
        assert!(node.is_flushed());
        assert_eq!(node.hash(), &h(9));

        node.flush();
        assert_eq!(node, Node::Flushed(h(9)));
    }

    #[test]
    fn test_block_bounds() {
        let leaf = Node::Leaf(h(1));
        let block = Block::new(&leaf, 8, 2);
        assert_eq!(block.end(), 11);
        assert!(block.contains(8));
        assert!(block.contains(11));
        assert!(!block.contains(7));
        assert!(!block.contains(12));

        let top = Block::new(&leaf, 0, 63);
        assert_eq!(top.end(), (1u64 << 63) - 1);
    }
}
