//! Append-only Merkle forest with live and historical inclusion proofs,
//! irreversible flushing of old detail and retraction of recent leaves.

pub mod node;
pub mod tree;
pub mod path;
pub mod codec;
pub mod stats;

use crate::compress::{Sha256Compress, Sha256Full, Sha384Full, Sha512Full};

pub use crate::error::{Result, TreeError};
pub use node::Node;
pub use path::{Direction, PathStep, PathT};
pub use stats::Statistics;
pub use tree::TreeT;

/// Default tree: 32-byte digests joined with the bare SHA-256 compression function.
pub type Tree = TreeT<32, Sha256Compress>;
/// 32-byte digests joined with full SHA-256.
pub type Tree256Full = TreeT<32, Sha256Full>;
pub type Tree384 = TreeT<48, Sha384Full>;
pub type Tree512 = TreeT<64, Sha512Full>;

pub type Path = PathT<32, Sha256Compress>;
pub type Path256Full = PathT<32, Sha256Full>;
pub type Path384 = PathT<48, Sha384Full>;
pub type Path512 = PathT<64, Sha512Full>;

