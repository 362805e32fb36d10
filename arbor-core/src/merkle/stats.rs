use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation counters kept by every tree. Observability only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub num_insert: u64,
    pub num_hash: u64,
    pub num_root: u64,
    pub num_past_root: u64,
    pub num_path: u64,
    pub num_past_path: u64,
    pub num_flush: u64,
    pub num_retract: u64,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "num_insert={} num_hash={} num_root={} num_past_root={} num_path={} \
             num_past_path={} num_flush={} num_retract={}",
            self.num_insert,
            self.num_hash,
            self.num_root,
            self.num_past_root,
            self.num_path,
            self.num_past_path,
            self.num_flush,
            self.num_retract,
        )
    }
}
