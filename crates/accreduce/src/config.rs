//! Runtime configuration of a reduction.
//!
//! A configuration can be built in code or parsed from TOML, e.g.
//!
//! ```toml
//! block_len = 32
//! n_pipeline = 4
//! transfer = "threaded"
//! wait_timeout_ms = 500
//! ```

use crate::Error;
use accreduce_nostd_internal::DEFAULT_BLOCK_LEN;
use serde::Deserialize;
use std::time::Duration;

/// Selects how data moves between bulk storage and a rank's scratch buffers
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// every transfer completes inside of the call that starts it
    Immediate,
    /// every rank gets a dedicated copy worker, so that transfers overlap
    /// with the arithmetic
    #[default]
    Threaded,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReduceConfig {
    /// the number of records in a block
    pub block_len: usize,
    /// the number of pipeline ranks. When omitted, we use one rank per
    /// thread in rayon's global pool
    pub n_pipeline: Option<usize>,
    pub transfer: TransferMode,
    /// how long a rank may wait on a single transfer before giving up. When
    /// omitted, ranks wait indefinitely
    pub wait_timeout_ms: Option<u64>,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        ReduceConfig {
            block_len: DEFAULT_BLOCK_LEN,
            n_pipeline: None,
            transfer: TransferMode::default(),
            wait_timeout_ms: None,
        }
    }
}

impl ReduceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        toml::from_str(s).map_err(|e| Error::config(e.to_string()))
    }

    pub fn n_pipeline(&self) -> usize {
        self.n_pipeline.unwrap_or_else(rayon::current_num_threads)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }
}
