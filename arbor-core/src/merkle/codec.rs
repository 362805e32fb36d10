//! Byte encoding of whole trees and of leaf ranges of a tree.
//!
//! Layout (big-endian):
//!
//! ```text
//! u16 version | u16 digest size | u8 flags
//! [u64 min_index | u64 max_index | node*]            when flags has NON_EMPTY
//! node = u8 tag | digest | (left node | right node)  children only for branches
//! ```
//!
//! One node tree is written per top-level subtree, largest first. Subtree
//! heights are implied by `max_index + 1`, so no shape data is stored.

use tracing::{debug, warn};

use super::node::{span, Block, Node};
use super::tree::TreeT;
use super::{Result, TreeError};
use crate::compress::Compress;
use crate::constants::{
    MAX_LEAVES, MAX_LEVELS, NODE_TAG_BRANCH, NODE_TAG_FLUSHED, NODE_TAG_LEAF, TREE_FLAG_NON_EMPTY,
    TREE_FORMAT_VERSION,
};
use crate::hash::Hash;

const HEADER_SIZE: usize = 2 + 2 + 1;
const RANGE_SIZE: usize = 8 + 8;

/// Bounds-checked cursor over an input buffer.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.offset;
        if len > remaining {
            return Err(TreeError::MalformedData(format!(
                "insufficient data at offset {}: need {len} bytes, got {remaining}",
                self.offset
            )));
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    pub fn hash<const N: usize>(&mut self) -> Result<Hash<N>> {
        Hash::from_slice(self.take(N)?)
    }

    pub fn expect_hash_size(&mut self, expected: usize) -> Result<()> {
        let size = self.u16()? as usize;
        if size != expected {
            return Err(TreeError::MalformedData(format!(
                "digest size mismatch: expected {expected}, got {size}"
            )));
        }
        Ok(())
    }

    /// Fails if any input is left over.
    pub fn finish(self) -> Result<()> {
        let trailing = self.data.len() - self.offset;
        if trailing != 0 {
            return Err(TreeError::MalformedData(format!(
                "{trailing} trailing bytes"
            )));
        }
        Ok(())
    }
}

impl<const N: usize, C: Compress<N>> TreeT<N, C> {
    /// Subtrees to encode for the window `[from, to]`.
    fn window(&self, from: u64, to: u64) -> Result<Vec<Block<'_, N>>> {
        if self.is_empty() {
            return Err(TreeError::EmptyTree);
        }
        if from > to {
            return Err(TreeError::InvalidRange { from, to });
        }
        if from < self.min_index() || to > self.max_index() {
            let index = if from < self.min_index() { from } else { to };
            return Err(TreeError::IndexOutOfRange {
                index,
                min: self.min_index(),
                max: self.max_index(),
            });
        }
        self.past_forest(to)
    }

    /// Appends the encoding of the whole tree to `buf`.
    pub fn serialise(&self, buf: &mut Vec<u8>) -> Result<()> {
        if self.is_empty() {
            write_header::<N>(buf, false);
            return Ok(());
        }
        self.serialise_range(self.min_index(), self.max_index(), buf)
    }

    /// Appends the encoding of the tree as of `to`, with everything left of
    /// `from` flushed. Decoding it yields a tree with `min_index == from` and
    /// `max_index == to`.
    pub fn serialise_range(&self, from: u64, to: u64, buf: &mut Vec<u8>) -> Result<()> {
        let blocks = self.window(from, to)?;
        let size = HEADER_SIZE + RANGE_SIZE + blocks_len::<N>(&blocks, from);
        buf.reserve(size);

        write_header::<N>(buf, true);
        buf.extend_from_slice(&from.to_be_bytes());
        buf.extend_from_slice(&to.to_be_bytes());
        for block in &blocks {
            write_node(buf, block.node, block.start, block.height, from);
        }
        debug!(from, to, bytes = size, "serialised tree");
        Ok(())
    }

    /// Exact length `serialise` would append.
    pub fn serialised_size(&self) -> usize {
        if self.is_empty() {
            return HEADER_SIZE;
        }
        self.serialised_size_range(self.min_index(), self.max_index())
            .unwrap_or(HEADER_SIZE)
    }

    /// Exact length `serialise_range(from, to, ..)` would append.
    pub fn serialised_size_range(&self, from: u64, to: u64) -> Result<usize> {
        let blocks = self.window(from, to)?;
        Ok(HEADER_SIZE + RANGE_SIZE + blocks_len::<N>(&blocks, from))
    }

    /// Decodes a tree produced by `serialise` or `serialise_range`.
    pub fn deserialise(data: &[u8]) -> Result<Self> {
        decode::<N, C>(data).map_err(|e| {
            warn!(error = %e, len = data.len(), "rejected tree encoding");
            e
        })
    }

    /// Replaces this tree with the decoded one. On error `self` is untouched.
    pub fn deserialise_in_place(&mut self, data: &[u8]) -> Result<()> {
        *self = Self::deserialise(data)?;
        Ok(())
    }
}

fn write_header<const N: usize>(buf: &mut Vec<u8>, non_empty: bool) {
    buf.extend_from_slice(&TREE_FORMAT_VERSION.to_be_bytes());
    buf.extend_from_slice(&(N as u16).to_be_bytes());
    buf.push(if non_empty { TREE_FLAG_NON_EMPTY } else { 0 });
}

fn blocks_len<const N: usize>(blocks: &[Block<'_, N>], from: u64) -> usize {
    blocks
        .iter()
        .map(|b| node_len(b.node, b.start, b.height, from))
        .sum()
}

fn node_len<const N: usize>(node: &Node<N>, start: u64, height: u32, from: u64) -> usize {
    let own = 1 + N;
    if start + (span(height) - 1) < from {
        return own;
    }
    match node {
        Node::Branch { left, right, .. } => {
            let mid = start + span(height - 1);
            own + node_len(left, start, height - 1, from) + node_len(right, mid, height - 1, from)
        }
        _ => own,
    }
}

fn write_node<const N: usize>(buf: &mut Vec<u8>, node: &Node<N>, start: u64, height: u32, from: u64) {
    if start + (span(height) - 1) < from {
        buf.push(NODE_TAG_FLUSHED);
        buf.extend_from_slice(node.hash().as_bytes());
        return;
    }
    match node {
        Node::Leaf(hash) => {
            buf.push(NODE_TAG_LEAF);
            buf.extend_from_slice(hash.as_bytes());
        }
        Node::Flushed(hash) => {
            buf.push(NODE_TAG_FLUSHED);
            buf.extend_from_slice(hash.as_bytes());
        }
        Node::Branch { hash, left, right } => {
            buf.push(NODE_TAG_BRANCH);
            buf.extend_from_slice(hash.as_bytes());
            let mid = start + span(height - 1);
            write_node(buf, left, start, height - 1, from);
            write_node(buf, right, mid, height - 1, from);
        }
    }
}

fn decode<const N: usize, C: Compress<N>>(data: &[u8]) -> Result<TreeT<N, C>> {
    let mut reader = Reader::new(data);

    let version = reader.u16()?;
    if version != TREE_FORMAT_VERSION {
        return Err(TreeError::MalformedData(format!(
            "unsupported tree version: {version:#06x}"
        )));
    }
    reader.expect_hash_size(N)?;

    let flags = reader.u8()?;
    if flags == 0 {
        reader.finish()?;
        return Ok(TreeT::new());
    }
    if flags != TREE_FLAG_NON_EMPTY {
        return Err(TreeError::MalformedData(format!("unknown flags: {flags:#04x}")));
    }

    let min_index = reader.u64()?;
    let max_index = reader.u64()?;
    if min_index > max_index || max_index == u64::MAX {
        return Err(TreeError::MalformedData(format!(
            "invalid leaf window [{min_index}, {max_index}]"
        )));
    }
    let num_leaves = max_index + 1;
    if num_leaves >= MAX_LEAVES {
        return Err(TreeError::MalformedData(format!(
            "leaf count {num_leaves} exceeds forest capacity"
        )));
    }

    let mut levels: [Option<Node<N>>; MAX_LEVELS] = std::array::from_fn(|_| None);
    let mut start = 0u64;
    for height in (0..MAX_LEVELS).rev() {
        if num_leaves & (1u64 << height) == 0 {
            continue;
        }
        let height_u32 = height as u32;
        levels[height] = Some(decode_node::<N, C>(&mut reader, start, height_u32, min_index)?);
        start += span(height_u32);
    }
    reader.finish()?;

    debug!(min_index, max_index, "deserialised tree");
    Ok(TreeT::from_parts(levels, min_index, num_leaves))
}

fn decode_node<const N: usize, C: Compress<N>>(
    reader: &mut Reader<'_>,
    start: u64,
    height: u32,
    min_index: u64,
) -> Result<Node<N>> {
    let tag = reader.u8()?;
    let hash = reader.hash::<N>()?;
    let end = start + (span(height) - 1);
    let flushed = end < min_index;

    match tag {
        NODE_TAG_FLUSHED => {
            if !flushed {
                return Err(TreeError::MalformedData(format!(
                    "flushed node [{start}, {end}] covers retained leaves"
                )));
            }
            Ok(Node::Flushed(hash))
        }
        NODE_TAG_LEAF => {
            if height != 0 {
                return Err(TreeError::MalformedData(format!(
                    "leaf at height {height}"
                )));
            }
            Ok(if flushed { Node::Flushed(hash) } else { Node::Leaf(hash) })
        }
        NODE_TAG_BRANCH => {
            if height == 0 {
                return Err(TreeError::MalformedData(format!(
                    "branch in leaf position {start}"
                )));
            }
            let mid = start + span(height - 1);
            let left = decode_node::<N, C>(reader, start, height - 1, min_index)?;
            let right = decode_node::<N, C>(reader, mid, height - 1, min_index)?;
            if C::compress(left.hash(), right.hash()) != hash {
                return Err(TreeError::MalformedData(format!(
                    "digest mismatch in branch [{start}, {end}]"
                )));
            }
            Ok(if flushed {
                Node::Flushed(hash)
            } else {
                Node::join(hash, left, right)
            })
        }
        other => Err(TreeError::MalformedData(format!("unknown node tag: {other:#04x}"))),
    }
}
