use std::fmt::{self, Write as _};
use std::marker::PhantomData;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use super::codec::Reader;
use super::{Result, TreeError};
use crate::compress::Compress;
use crate::constants::{DIRECTION_LEFT, DIRECTION_RIGHT, PATH_FORMAT_VERSION};
use crate::hash::Hash;

/// Side on which a sibling digest sits relative to the running digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    fn tag(self) -> u8 {
        match self {
            Direction::Left => DIRECTION_LEFT,
            Direction::Right => DIRECTION_RIGHT,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = TreeError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            DIRECTION_LEFT => Ok(Direction::Left),
            DIRECTION_RIGHT => Ok(Direction::Right),
            _ => Err(TreeError::MalformedData(format!(
                "invalid path direction: {value:#04x}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep<const N: usize> {
    pub hash: Hash<N>,
    pub direction: Direction,
}

/// Inclusion proof for one leaf, detached from the tree that produced it.
///
/// Steps run from the leaf upwards. Folding them over the leaf digest with the
/// compressor `C` yields the root the proof was taken against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PathT<const N: usize, C: Compress<N>> {
    index: u64,
    max_index: u64,
    leaf: Hash<N>,
    steps: Vec<PathStep<N>>,
    #[serde(skip)]
    _compress: PhantomData<C>,
}

impl<const N: usize, C: Compress<N>> PathT<N, C> {
    pub fn new(index: u64, max_index: u64, leaf: Hash<N>, steps: Vec<PathStep<N>>) -> Self {
        Self {
            index,
            max_index,
            leaf,
            steps,
            _compress: PhantomData,
        }
    }

    pub fn leaf(&self) -> &Hash<N> {
        &self.leaf
    }

    pub fn leaf_index(&self) -> u64 {
        self.index
    }

    /// Largest leaf index of the tree the proof was taken against.
    pub fn max_index(&self) -> u64 {
        self.max_index
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PathStep<N>] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathStep<N>> {
        self.steps.iter()
    }

    /// Root implied by the leaf and the recorded siblings.
    pub fn root(&self) -> Hash<N> {
        self.steps.iter().fold(self.leaf, |acc, step| match step.direction {
            Direction::Left => C::compress(&step.hash, &acc),
            Direction::Right => C::compress(&acc, &step.hash),
        })
    }

    pub fn verify(&self, root: &Hash<N>) -> bool {
        self.root() == *root
    }

    /// One line for the leaf, then one per step from the leaf upwards.
    /// Digests are cut to `prefix` bytes.
    pub fn render(&self, prefix: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "leaf {} of {}: {}",
            self.index,
            self.max_index,
            self.leaf.to_string_prefix(prefix)
        );
        for step in &self.steps {
            let side = match step.direction {
                Direction::Left => 'L',
                Direction::Right => 'R',
            };
            let _ = writeln!(out, "  {side} {}", step.hash.to_string_prefix(prefix));
        }
        out
    }

    pub fn serialised_size(&self) -> usize {
        2 + 2 + 8 + 8 + N + 2 + self.steps.len() * (1 + N)
    }

    pub fn serialise(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.serialised_size());
        buf.extend_from_slice(&PATH_FORMAT_VERSION.to_be_bytes());
        buf.extend_from_slice(&(N as u16).to_be_bytes());
        buf.extend_from_slice(&self.index.to_be_bytes());
        buf.extend_from_slice(&self.max_index.to_be_bytes());
        buf.extend_from_slice(self.leaf.as_bytes());
        buf.extend_from_slice(&(self.steps.len() as u16).to_be_bytes());
        for step in &self.steps {
            buf.push(step.direction.tag());
            buf.extend_from_slice(step.hash.as_bytes());
        }
    }

    pub fn deserialise(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);

        let version = reader.u16()?;
        if version != PATH_FORMAT_VERSION {
            return Err(TreeError::MalformedData(format!(
                "unsupported path version: {version:#06x}"
            )));
        }
        reader.expect_hash_size(N)?;

        let index = reader.u64()?;
        let max_index = reader.u64()?;
        if index > max_index {
            return Err(TreeError::MalformedData(format!(
                "path index {index} beyond max index {max_index}"
            )));
        }
        let leaf = reader.hash::<N>()?;

        let count = reader.u16()? as usize;
        let mut steps = Vec::with_capacity(count);
        for _ in 0..count {
            let direction = Direction::try_from(reader.u8()?)?;
            let hash = reader.hash::<N>()?;
            steps.push(PathStep { hash, direction });
        }
        reader.finish()?;

        Ok(Self::new(index, max_index, leaf, steps))
    }
}

impl<const N: usize, C: Compress<N>> fmt::Display for PathT<N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(N))
    }
}

impl<const N: usize, C: Compress<N>> PartialEq for PathT<N, C> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.steps == other.steps
    }
}

impl<const N: usize, C: Compress<N>> Eq for PathT<N, C> {}

impl<const N: usize, C: Compress<N>> Index<usize> for PathT<N, C> {
    type Output = Hash<N>;

    fn index(&self, i: usize) -> &Hash<N> {
        &self.steps[i].hash
    }
}

impl<'a, const N: usize, C: Compress<N>> IntoIterator for &'a PathT<N, C> {
    type Item = &'a PathStep<N>;
    type IntoIter = std::slice::Iter<'a, PathStep<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::{Sha256Compress, Sha384Full};

    type TestPath = PathT<32, Sha256Compress>;

    fn h(val: u8) -> Hash<32> {
        let mut bytes = [0u8; 32];
        bytes[31] = val;
        Hash::new(bytes)
    }

    fn sample_path() -> TestPath {
        PathT::new(
            2,
            4,
            h(2),
            vec![
                PathStep { hash: h(3), direction: Direction::Right },
                PathStep { hash: h(10), direction: Direction::Left },
                PathStep { hash: h(4), direction: Direction::Right },
            ],
        )
    }

    #[test]
    fn test_root_folds_in_direction() {
        let path = sample_path();
        let expected = Sha256Compress::compress(
            &Sha256Compress::compress(&h(10), &Sha256Compress::compress(&h(2), &h(3))),
            &h(4),
        );
        assert_eq!(path.root(), expected);
        assert!(path.verify(&expected));
        assert!(!path.verify(&h(0)));
    }

    #[test]
    fn test_empty_path_root_is_leaf() {
        let path: TestPath = PathT::new(0, 0, h(7), Vec::new());
        assert!(path.is_empty());
        assert_eq!(path.root(), h(7));
    }

    #[test]
    fn test_serialise_roundtrip() {
        let path = sample_path();
        let mut buf = Vec::new();
        path.serialise(&mut buf);
        assert_eq!(buf.len(), path.serialised_size());

        let decoded = TestPath::deserialise(&buf).unwrap();
        assert_eq!(decoded, path);
        assert_eq!(decoded.leaf(), path.leaf());
        assert_eq!(decoded.max_index(), 4);
        assert_eq!(decoded.root(), path.root());
    }

    #[test]
    fn test_deserialise_rejects_bad_input() {
        let path = sample_path();
        let mut buf = Vec::new();
        path.serialise(&mut buf);

        for len in 0..buf.len() {
            assert!(TestPath::deserialise(&buf[..len]).is_err(), "prefix {len}");
        }

        let mut trailing = buf.clone();
        trailing.push(0);
        assert!(TestPath::deserialise(&trailing).is_err());

        let mut bad_direction = buf.clone();
        bad_direction[2 + 2 + 8 + 8 + 32 + 2] = 0x07;
        assert!(TestPath::deserialise(&bad_direction).is_err());

        assert!(PathT::<48, Sha384Full>::deserialise(&buf).is_err());
    }

    #[test]
    fn test_equality_ignores_leaf_value() {
        let a = sample_path();
        let b: TestPath = PathT::new(2, 9, h(99), a.steps().to_vec());
        assert_eq!(a, b);

        let c: TestPath = PathT::new(1, 4, *a.leaf(), a.steps().to_vec());
        assert_ne!(a, c);
    }

    #[test]
    fn test_indexing_and_iteration() {
        let path = sample_path();
        assert_eq!(path.len(), 3);
        assert_eq!(path[1], h(10));
        let directions: Vec<Direction> = path.iter().map(|s| s.direction).collect();
        assert_eq!(
            directions,
            vec![Direction::Right, Direction::Left, Direction::Right]
        );
    }

    #[test]
    fn test_render_lists_steps() {
        let path = sample_path();
        let out = path.render(1);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec!["leaf 2 of 4: 00", "  R 00", "  L 00", "  R 00"]
        );

        let full = path.to_string();
        assert!(full.starts_with(&format!("leaf 2 of 4: {}", h(2).to_hex())));
        assert!(full.contains(&format!("  L {}", h(10).to_hex())));
    }

    #[test]
    fn test_bincode_roundtrip() {
        let path = sample_path();
        let bytes = bincode::serialize(&path).unwrap();
        let decoded: TestPath = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, path);
        assert_eq!(decoded.leaf(), path.leaf());
    }
}
