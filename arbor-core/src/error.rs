use thiserror::Error;

/// Errors from tree queries, mutation and decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Tree is empty")]
    EmptyTree,

    #[error("Index {index} outside retained range [{min}, {max}]")]
    IndexOutOfRange { index: u64, min: u64, max: u64 },

    #[error("Invalid range: {from} > {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("Cannot retract to {index}: leaves below {min} are flushed")]
    RetractBelowFlush { index: u64, min: u64 },

    #[error("Detail for leaf {index} was flushed")]
    UnavailableDetail { index: u64 },

    #[error("Malformed data: {0}")]
    MalformedData(String),
}

pub type Result<T> = std::result::Result<T, TreeError>;
