/// Tree wire format version tag.
pub const TREE_FORMAT_VERSION: u16 = 0xA201;

/// Path wire format version tag.
pub const PATH_FORMAT_VERSION: u16 = 0xA202;

/// Capacity of the per-level forest table (one slot per subtree height).
pub const MAX_LEVELS: usize = 64;

/// Leaf counts must stay below this so every carry on insert lands in the table.
pub const MAX_LEAVES: u64 = 1 << (MAX_LEVELS - 1);

/// Tree header flag: the tree holds at least one leaf.
pub const TREE_FLAG_NON_EMPTY: u8 = 0x01;

/// Node tag: a leaf carrying its digest.
pub const NODE_TAG_LEAF: u8 = 0x00;
/// Node tag: an internal node followed by its two children.
pub const NODE_TAG_BRANCH: u8 = 0x01;
/// Node tag: a flushed subtree, digest only.
pub const NODE_TAG_FLUSHED: u8 = 0x02;

/// Path step tag: the sibling sits to the left.
pub const DIRECTION_LEFT: u8 = 0x00;
/// Path step tag: the sibling sits to the right.
pub const DIRECTION_RIGHT: u8 = 0x01;

/// SHA-256 initial hash value (FIPS 180-4, section 5.3.3).
pub const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a,
    0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];
