//! Civilizational-dynamics agent-based model.
//!
//! Simulates up to ~1M agents distributed across ~200 regions connected by a
//! Watts-Strogatz small-world social graph. Each tick advances belief
//! diffusion, regional economies, cohort demographics, migration, and online
//! belief-space clustering in a fixed, deterministic order (see
//! [`kernel::Kernel::step`]).
//!
//! ## Module Structure
//!
//! - `config`      Tunable kernel parameters and validation
//! - `error`       The `SimError` taxonomy shared by every fallible entry point
//! - `rng`         Deterministic per-worker/per-phase RNG substreams
//! - `types`       Core id/enum types shared across modules
//! - `agent`       The structure-of-arrays agent table
//! - `graph`       Watts-Strogatz small-world graph construction
//! - `belief`      Per-tick opinion dynamics (pairwise and mean-field)
//! - `economy`     Regional production, trade, pricing, and system transitions
//! - `demography`  Cohort-based mortality and fertility
//! - `migration`   Push/pull driven relocation
//! - `clustering`  Online k-means over belief space
//! - `checkpoint`  Binary save/restore of full kernel state
//! - `snapshot`    Read-only JSON/CSV-shaped views for an embedding shell
//! - `kernel`      The `Kernel` orchestrator tying every phase together

pub mod agent;
pub mod belief;
pub mod checkpoint;
pub mod clustering;
pub mod config;
pub mod demography;
pub mod economy;
pub mod error;
pub mod graph;
#[cfg(feature = "instrument")]
pub use instrument;
pub mod kernel;
pub mod migration;
pub mod rng;
pub mod snapshot;
pub mod types;

pub use agent::{AgentTable, AgentTemplate, CompactionRemap};
pub use clustering::{ClusterState, ClusterSummary};
pub use config::KernelConfig;
pub use economy::RegionEconomy;
pub use error::{SimError, SimResult};
pub use kernel::Kernel;
pub use snapshot::{AgentSnapshot, Metrics, RegionEconomySummary, Snapshot};
pub use types::{AgentId, EconomicSystem, NUM_BELIEF_DIMS, NUM_GOODS, RegionId};
