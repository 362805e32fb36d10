//! Append-only Merkle trees over fixed-size digests.
//!
//! Trees accept leaves one at a time and answer root and inclusion-proof
//! queries for the current state and for any earlier state that is still
//! retained. Old detail can be flushed to bound memory, recent leaves can be
//! retracted, and whole trees or leaf ranges can be shipped as bytes.

pub mod error;
pub mod constants;
pub mod hash;
pub mod compress;
pub mod merkle;

pub use compress::{Compress, Sha256Compress, Sha256Full, Sha384Full, Sha512Full};
pub use error::{Result, TreeError};
pub use hash::{Hash, Hash256, Hash384, Hash512};
pub use merkle::{
    Direction, Node, Path, Path256Full, Path384, Path512, PathStep, PathT, Statistics, Tree,
    Tree256Full, Tree384, Tree512, TreeT,
};
