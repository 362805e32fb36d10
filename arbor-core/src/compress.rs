//! Pluggable node compression functions.
//!
//! A tree type fixes its digest size and compressor at compile time, so trees
//! built over different functions can never be mixed.

use std::fmt;

use sha2::digest::consts::U64;
use sha2::digest::generic_array::GenericArray;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::constants::SHA256_IV;
use crate::hash::Hash;

/// Pure two-to-one compression of child digests into a parent digest.
pub trait Compress<const N: usize>: Copy + Default + fmt::Debug + Send + Sync + 'static {
    fn compress(left: &Hash<N>, right: &Hash<N>) -> Hash<N>;
}

/// The bare SHA-256 compression function over the 64-byte block `left || right`,
/// starting from the standard IV with no padding block.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Compress;

impl Compress<32> for Sha256Compress {
    fn compress(left: &Hash<32>, right: &Hash<32>) -> Hash<32> {
        let mut block = GenericArray::<u8, U64>::default();
        block[..32].copy_from_slice(left.as_bytes());
        block[32..].copy_from_slice(right.as_bytes());

        let mut state = SHA256_IV;
        sha2::compress256(&mut state, std::slice::from_ref(&block));

        let mut out = [0u8; 32];
        for (chunk, word) in out.chunks_exact_mut(4).zip(state.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        Hash::new(out)
    }
}

/// Full SHA-256 of `left || right`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Full;

impl Compress<32> for Sha256Full {
    fn compress(left: &Hash<32>, right: &Hash<32>) -> Hash<32> {
        digest_pair::<Sha256, 32>(left, right)
    }
}

/// Full SHA-384 of `left || right`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha384Full;

impl Compress<48> for Sha384Full {
    fn compress(left: &Hash<48>, right: &Hash<48>) -> Hash<48> {
        digest_pair::<Sha384, 48>(left, right)
    }
}

/// Full SHA-512 of `left || right`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Full;

impl Compress<64> for Sha512Full {
    fn compress(left: &Hash<64>, right: &Hash<64>) -> Hash<64> {
        digest_pair::<Sha512, 64>(left, right)
    }
}

fn digest_pair<D: Digest, const N: usize>(left: &Hash<N>, right: &Hash<N>) -> Hash<N> {
    let mut hasher = D::new();
    hasher.update(left);
    hasher.update(right);
    let digest = hasher.finalize();

    let mut out = [0u8; N];
    out.copy_from_slice(&digest);
    Hash::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h32(val: u8) -> Hash<32> {
        let mut bytes = [0u8; 32];
        bytes[0] = val;
        Hash::new(bytes)
    }

    #[test]
    fn test_compress_matches_single_block_sha256() {
        // "abc" padded to one block: the compression output is SHA-256("abc").
        let mut left = [0u8; 32];
        left[..4].copy_from_slice(&[0x61, 0x62, 0x63, 0x80]);
        let mut right = [0u8; 32];
        right[31] = 0x18;

        let out = Sha256Compress::compress(&Hash::new(left), &Hash::new(right));
        let expected: [u8; 32] = Sha256::digest(b"abc").into();
        assert_eq!(out.to_bytes(), expected);
        assert_eq!(
            out.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_full_sha256_hashes_concatenation() {
        let (l, r) = (h32(1), h32(2));
        let mut concat = Vec::new();
        concat.extend_from_slice(l.as_bytes());
        concat.extend_from_slice(r.as_bytes());
        let expected: [u8; 32] = Sha256::digest(&concat).into();
        assert_eq!(Sha256Full::compress(&l, &r).to_bytes(), expected);
    }

    #[test]
    fn test_compress_is_order_sensitive() {
        let (l, r) = (h32(1), h32(2));
        assert_ne!(Sha256Compress::compress(&l, &r), Sha256Compress::compress(&r, &l));
        assert_ne!(Sha256Full::compress(&l, &r), Sha256Full::compress(&r, &l));
    }

    #[test]
    fn test_compressors_disagree() {
        let (l, r) = (h32(3), h32(4));
        assert_ne!(Sha256Compress::compress(&l, &r), Sha256Full::compress(&l, &r));
    }

    #[test]
    fn test_wide_digests() {
        let l = Hash::<48>::new([1u8; 48]);
        let r = Hash::<48>::new([2u8; 48]);
        let out = Sha384Full::compress(&l, &r);
        assert_eq!(out.as_bytes().len(), 48);
        assert_eq!(out, Sha384Full::compress(&l, &r));

        let l = Hash::<64>::new([1u8; 64]);
        let r = Hash::<64>::new([2u8; 64]);
        assert_eq!(Sha512Full::compress(&l, &r).as_bytes().len(), 64);
    }
}
