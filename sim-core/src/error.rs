//! Error taxonomy for the simulation kernel.
//!
//! Every fallible entry point returns `Result<_, SimError>`. Numeric and bounds
//! errors are meant to bubble out of `Kernel::step` and stop the run; I/O and
//! command errors are the concern of an embedding shell and are only
//! represented here so that it has a single error type to propagate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("agent {agent} has region {region} but only {num_regions} regions exist")]
    AgentRegionOutOfRange {
        agent: u32,
        region: u32,
        num_regions: u32,
    },

    #[error("agent {agent} lists neighbor {neighbor} which is not a valid agent id (table has {table_len})")]
    NeighborOutOfRange {
        agent: u32,
        neighbor: u32,
        table_len: u32,
    },

    #[error("non-finite belief value for agent {agent}, dimension {dim}: {value}")]
    NonFiniteBelief { agent: u32, dim: usize, value: f64 },

    #[error("agent {agent} has negative wealth: {wealth}")]
    NegativeWealth { agent: u32, wealth: f64 },

    #[error("trade for good {good} in region {region} failed to conserve mass: exports={exports}, imports={imports}, loss={loss}")]
    TradeNonConservation {
        region: u32,
        good: usize,
        exports: f64,
        imports: f64,
        loss: f64,
    },

    #[error("checkpoint I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("checkpoint encoding error: {0}")]
    EncodingError(#[from] Box<bincode::ErrorKind>),

    #[error("checkpoint header mismatch: expected magic {expected_magic:#x} version {expected_version}, got magic {found_magic:#x} version {found_version}")]
    CheckpointHeaderMismatch {
        expected_magic: u32,
        expected_version: u32,
        found_magic: u32,
        found_version: u32,
    },

    #[error("unknown command: {0}")]
    CommandError(String),
}

pub type SimResult<T> = Result<T, SimError>;
