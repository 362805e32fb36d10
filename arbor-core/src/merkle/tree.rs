use std::cell::Cell;
use std::fmt::Write as _;
use std::marker::PhantomData;

use tracing::{debug, trace};

use super::node::{span, Block, Node};
use super::path::{Direction, PathStep, PathT};
use super::stats::Statistics;
use super::{Result, TreeError};
use crate::compress::Compress;
use crate::constants::MAX_LEVELS;
use crate::hash::Hash;

/// An append-only Merkle tree stored as a forest of perfect subtrees.
///
/// `levels[h]` holds the top-level subtree of height `h`, present exactly when
/// bit `h` of the leaf count is set; larger subtrees sit further left. The root
/// folds the forest right to left, `compress(T0, compress(T1, .. Tk))`, which
/// gives the same digest as the usual left-balanced Merkle tree hash.
///
/// Leaves keep their absolute index forever. `flush_to` advances `min_index`
/// and collapses everything left of it into `Node::Flushed` digests; the left
/// siblings along any retained leaf's path survive, which is all that roots and
/// proofs for indices at or after `min_index` need.
#[derive(Debug, Clone)]
pub struct TreeT<const N: usize, C: Compress<N>> {
    levels: [Option<Node<N>>; MAX_LEVELS],
    min_index: u64,
    num_leaves: u64,
    stats: Cell<Statistics>,
    _compress: PhantomData<C>,
}

impl<const N: usize, C: Compress<N>> Default for TreeT<N, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, C: Compress<N>> TreeT<N, C> {
    pub fn new() -> Self {
        Self {
            levels: std::array::from_fn(|_| None),
            min_index: 0,
            num_leaves: 0,
            stats: Cell::new(Statistics::default()),
            _compress: PhantomData,
        }
    }

    /// A tree holding a single leaf at index 0.
    pub fn with_leaf(hash: Hash<N>) -> Self {
        let mut tree = Self::new();
        tree.insert(hash);
        tree
    }

    /// Reassemble a tree from decoded parts. The caller guarantees the shape.
    pub(crate) fn from_parts(
        levels: [Option<Node<N>>; MAX_LEVELS],
        min_index: u64,
        num_leaves: u64,
    ) -> Self {
        Self {
            levels,
            min_index,
            num_leaves,
            stats: Cell::new(Statistics::default()),
            _compress: PhantomData,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_leaves == 0
    }

    pub fn min_index(&self) -> u64 {
        self.min_index
    }

    /// Largest inserted index; 0 for an empty tree.
    pub fn max_index(&self) -> u64 {
        self.num_leaves.saturating_sub(1)
    }

    /// Number of retained leaves, `max_index - min_index + 1`.
    pub fn size(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.num_leaves - self.min_index
        }
    }

    /// Number of leaves ever inserted and not retracted, flushed ones included.
    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    pub fn statistics(&self) -> Statistics {
        self.stats.get()
    }

    fn bump(&self, f: impl FnOnce(&mut Statistics)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn hash_pair(&self, left: &Hash<N>, right: &Hash<N>) -> Hash<N> {
        self.bump(|s| s.num_hash += 1);
        C::compress(left, right)
    }

    /// Top-level subtrees from left (largest) to right (smallest).
    pub(crate) fn forest(&self) -> impl Iterator<Item = Block<'_, N>> + '_ {
        let mut start = 0u64;
        (0..MAX_LEVELS).rev().filter_map(move |height| {
            let node = self.levels[height].as_ref()?;
            let height = height as u32;
            let block = Block::new(node, start, height);
            start += span(height);
            Some(block)
        })
    }

    /// Appends a leaf at index `max_index + 1` (or 0 on an empty tree).
    pub fn insert(&mut self, hash: Hash<N>) {
        let mut carry = Node::Leaf(hash);
        let mut height = 0;
        // The top slot never carries further; decoded trees stay below MAX_LEAVES.
        while height + 1 < MAX_LEVELS {
            let Some(left) = self.levels[height].take() else {
                break;
            };
            let parent = self.hash_pair(left.hash(), carry.hash());
            carry = Node::join(parent, left, carry);
            height += 1;
        }
        self.levels[height] = Some(carry);
        self.num_leaves += 1;
        self.bump(|s| s.num_insert += 1);
        trace!(index = self.num_leaves - 1, merges = height, "inserted leaf");
    }

    pub fn insert_all<I: IntoIterator<Item = Hash<N>>>(&mut self, hashes: I) {
        for hash in hashes {
            self.insert(hash);
        }
    }

    fn check_index(&self, index: u64) -> Result<()> {
        if self.is_empty() {
            return Err(TreeError::EmptyTree);
        }
        if index < self.min_index || index > self.max_index() {
            return Err(TreeError::IndexOutOfRange {
                index,
                min: self.min_index,
                max: self.max_index(),
            });
        }
        Ok(())
    }

    /// Folds block digests right to left.
    fn fold(&self, blocks: &[Block<'_, N>]) -> Option<Hash<N>> {
        let mut iter = blocks.iter().rev();
        let mut acc = *iter.next()?.node.hash();
        for block in iter {
            acc = self.hash_pair(block.node.hash(), &acc);
        }
        Some(acc)
    }

    pub fn root(&self) -> Result<Hash<N>> {
        let blocks: Vec<Block<'_, N>> = self.forest().collect();
        let root = self.fold(&blocks).ok_or(TreeError::EmptyTree)?;
        self.bump(|s| s.num_root += 1);
        Ok(root)
    }

    /// The digest stored at `index`.
    pub fn leaf(&self, index: u64) -> Result<Hash<N>> {
        self.check_index(index)?;
        let block = self
            .forest()
            .find(|b| b.contains(index))
            .ok_or(TreeError::UnavailableDetail { index })?;

        let (mut node, mut start, mut height) = (block.node, block.start, block.height);
        while height > 0 {
            match node {
                Node::Branch { left, right, .. } => {
                    let mid = start + span(height - 1);
                    if index < mid {
                        node = &**left;
                    } else {
                        node = &**right;
                        start = mid;
                    }
                    height -= 1;
                }
                _ => return Err(TreeError::UnavailableDetail { index }),
            }
        }
        match node {
            Node::Leaf(hash) => Ok(*hash),
            _ => Err(TreeError::UnavailableDetail { index }),
        }
    }

    /// Subtrees that made up the forest when the tree held `as_of + 1` leaves.
    ///
    /// These are the top-level subtrees left of the one containing `as_of`, then
    /// the left siblings on the way down to it, then the highest node on that
    /// path ending exactly at `as_of`. Every one of them survives a flush to any
    /// index at or below `as_of`.
    pub(crate) fn past_forest(&self, as_of: u64) -> Result<Vec<Block<'_, N>>> {
        let mut blocks = Vec::new();
        for block in self.forest() {
            if block.end() <= as_of {
                blocks.push(block);
                if block.end() == as_of {
                    return Ok(blocks);
                }
                continue;
            }

            let (mut node, mut start, mut height) = (block.node, block.start, block.height);
            loop {
                if start + (span(height) - 1) == as_of {
                    blocks.push(Block::new(node, start, height));
                    return Ok(blocks);
                }
                match node {
                    Node::Branch { left, right, .. } if height > 0 => {
                        let mid = start + span(height - 1);
                        if as_of < mid {
                            node = &**left;
                        } else {
                            blocks.push(Block::new(left, start, height - 1));
                            node = &**right;
                            start = mid;
                        }
                        height -= 1;
                    }
                    _ => return Err(TreeError::UnavailableDetail { index: as_of }),
                }
            }
        }
        Err(TreeError::IndexOutOfRange {
            index: as_of,
            min: self.min_index,
            max: self.max_index(),
        })
    }

    /// Proof for `index` within the forest described by `blocks`.
    fn path_within(&self, blocks: &[Block<'_, N>], index: u64) -> Result<PathT<N, C>> {
        let pos = blocks
            .iter()
            .position(|b| b.contains(index))
            .ok_or(TreeError::UnavailableDetail { index })?;
        let block = blocks[pos];

        let mut steps = Vec::new();
        let (mut node, mut start, mut height) = (block.node, block.start, block.height);
        while height > 0 {
            match node {
                Node::Branch { left, right, .. } => {
                    let mid = start + span(height - 1);
                    if index < mid {
                        steps.push(PathStep { hash: *right.hash(), direction: Direction::Right });
                        node = &**left;
                    } else {
                        steps.push(PathStep { hash: *left.hash(), direction: Direction::Left });
                        node = &**right;
                        start = mid;
                    }
                    height -= 1;
                }
                _ => return Err(TreeError::UnavailableDetail { index }),
            }
        }
        let leaf = match node {
            Node::Leaf(hash) => *hash,
            _ => return Err(TreeError::UnavailableDetail { index }),
        };
        steps.reverse();

        if let Some(right) = self.fold(&blocks[pos + 1..]) {
            steps.push(PathStep { hash: right, direction: Direction::Right });
        }
        for left in blocks[..pos].iter().rev() {
            steps.push(PathStep { hash: *left.node.hash(), direction: Direction::Left });
        }

        let max_index = blocks.last().map(|b| b.end()).unwrap_or(index);
        Ok(PathT::new(index, max_index, leaf, steps))
    }

    /// Inclusion proof for `index` against the current root.
    pub fn path(&self, index: u64) -> Result<PathT<N, C>> {
        self.check_index(index)?;
        let blocks: Vec<Block<'_, N>> = self.forest().collect();
        let path = self.path_within(&blocks, index)?;
        self.bump(|s| s.num_path += 1);
        Ok(path)
    }

    /// Root of the tree as it was when it held `as_of + 1` leaves.
    pub fn past_root(&self, as_of: u64) -> Result<Hash<N>> {
        self.check_index(as_of)?;
        let blocks = self.past_forest(as_of)?;
        let root = self.fold(&blocks).ok_or(TreeError::EmptyTree)?;
        self.bump(|s| s.num_past_root += 1);
        Ok(root)
    }

    /// Proof for `index` against `past_root(as_of)`.
    pub fn past_path(&self, index: u64, as_of: u64) -> Result<PathT<N, C>> {
        if self.is_empty() {
            return Err(TreeError::EmptyTree);
        }
        if index > as_of {
            return Err(TreeError::InvalidRange { from: index, to: as_of });
        }
        self.check_index(index)?;
        self.check_index(as_of)?;
        let blocks = self.past_forest(as_of)?;
        let path = self.path_within(&blocks, index)?;
        self.bump(|s| s.num_past_path += 1);
        Ok(path)
    }

    /// Irreversibly drops the detail of every subtree lying strictly left of
    /// `index` and makes `index` the smallest retrievable leaf.
    pub fn flush_to(&mut self, index: u64) -> Result<()> {
        if self.is_empty() {
            return if index == 0 { Ok(()) } else { Err(TreeError::EmptyTree) };
        }
        if index > self.max_index() {
            return Err(TreeError::IndexOutOfRange {
                index,
                min: self.min_index,
                max: self.max_index(),
            });
        }
        if index <= self.min_index {
            return Ok(());
        }

        let mut start = 0u64;
        for height in (0..MAX_LEVELS).rev() {
            let Some(top) = self.levels[height].as_mut() else {
                continue;
            };
            let mut height = height as u32;
            let end = start + (span(height) - 1);
            let next = start + span(height);

            if end < index {
                top.flush();
            } else if start < index {
                let mut cursor = top;
                let mut lo = start;
                while lo < index && height > 0 {
                    match cursor {
                        Node::Branch { left, right, .. } => {
                            let mid = lo + span(height - 1);
                            if index < mid {
                                cursor = &mut **left;
                            } else {
                                left.flush();
                                cursor = &mut **right;
                                lo = mid;
                            }
                            height -= 1;
                        }
                        _ => break,
                    }
                }
            } else {
                break;
            }
            start = next;
        }

        debug!(from = self.min_index, to = index, "flushed tree");
        self.min_index = index;
        self.bump(|s| s.num_flush += 1);
        Ok(())
    }

    /// Discards every leaf after `index`. Flushed leaves cannot be retracted.
    pub fn retract_to(&mut self, index: u64) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        if index < self.min_index {
            return Err(TreeError::RetractBelowFlush {
                index,
                min: self.min_index,
            });
        }
        if index >= self.max_index() {
            return Ok(());
        }

        // Fail before touching anything if the path to `index` is broken.
        self.past_forest(index)?;
        let (top_height, top_start) = self
            .forest()
            .find(|b| b.contains(index))
            .map(|b| (b.height, b.start))
            .ok_or(TreeError::UnavailableDetail { index })?;

        for level in self.levels.iter_mut().take(top_height as usize) {
            *level = None;
        }
        let Some(mut node) = self.levels[top_height as usize].take() else {
            return Err(TreeError::UnavailableDetail { index });
        };

        let (mut start, mut height) = (top_start, top_height);
        loop {
            if start + (span(height) - 1) == index {
                self.levels[height as usize] = Some(node);
                break;
            }
            match node {
                Node::Branch { left, right, .. } => {
                    let mid = start + span(height - 1);
                    if index < mid {
                        node = *left;
                    } else {
                        self.levels[height as usize - 1] = Some(*left);
                        node = *right;
                        start = mid;
                    }
                    height -= 1;
                }
                other => {
                    // Unreachable: past_forest already walked this path.
                    self.levels[height as usize] = Some(other);
                    break;
                }
            }
        }

        debug!(from = self.max_index(), to = index, "retracted tree");
        self.num_leaves = index + 1;
        self.bump(|s| s.num_retract += 1);
        Ok(())
    }

    /// Checks forest shape, branch digests and retained detail.
    pub fn invariant(&self) -> bool {
        if self.is_empty() {
            return self.min_index == 0 && self.levels.iter().all(Option::is_none);
        }
        if self.min_index > self.max_index() {
            return false;
        }

        for (height, level) in self.levels.iter().enumerate() {
            let present = self.num_leaves & (1u64 << height) != 0;
            if present != level.is_some() {
                return false;
            }
        }

        self.forest()
            .all(|b| node_invariant::<N, C>(b.node, b.start, b.height, self.min_index))
    }

    /// Human-readable dump of the forest, digests cut to `prefix` bytes.
    /// Flushed nodes are marked with `*`.
    pub fn render(&self, prefix: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "leaves [{}, {}] of {}",
            self.min_index,
            self.max_index(),
            self.num_leaves
        );
        for block in self.forest() {
            render_node(&mut out, block.node, block.start, block.height, 0, prefix);
        }
        out
    }
}

fn node_invariant<const N: usize, C: Compress<N>>(
    node: &Node<N>,
    start: u64,
    height: u32,
    min_index: u64,
) -> bool {
    let end = start + (span(height) - 1);
    match node {
        Node::Flushed(_) => end < min_index,
        Node::Leaf(_) => height == 0,
        Node::Branch { hash, left, right } => {
            if height == 0 || C::compress(left.hash(), right.hash()) != *hash {
                return false;
            }
            let mid = start + span(height - 1);
            node_invariant::<N, C>(left, start, height - 1, min_index)
                && node_invariant::<N, C>(right, mid, height - 1, min_index)
        }
    }
}

fn render_node<const N: usize>(
    out: &mut String,
    node: &Node<N>,
    start: u64,
    height: u32,
    depth: usize,
    prefix: usize,
) {
    let end = start + (span(height) - 1);
    let marker = if node.is_flushed() { "*" } else { "" };
    let _ = writeln!(
        out,
        "{:indent$}[{start}..{end}] {}{marker}",
        "",
        node.hash().to_string_prefix(prefix),
        indent = depth * 2
    );
    if let Node::Branch { left, right, .. } = node {
        let mid = start + span(height - 1);
        render_node(out, left, start, height - 1, depth + 1, prefix);
        render_node(out, right, mid, height - 1, depth + 1, prefix);
    }
}
