//! Kernel configuration: tunable knobs, validation, and defaults.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// All tunable knobs for a [`crate::kernel::Kernel`].
///
/// Constructed with `KernelConfig::default()` and adjusted with `with_*`
/// builder methods, mirroring the teacher crate's preference for builders
/// over field-by-field struct literals at call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Initial live population.
    pub population: u32,
    /// Number of regions.
    pub regions: u32,
    /// Watts-Strogatz ring-lattice degree (connections on each side).
    pub avg_connections: u32,
    /// Watts-Strogatz rewire probability.
    pub rewire_prob: f64,

    /// Belief-update strength.
    pub step_size: f64,
    /// Lower bound applied to cosine similarity in pairwise mode.
    pub sim_floor: f64,
    /// If true, use the mean-field approximation instead of pairwise neighbor walk.
    pub use_mean_field: bool,
    /// Mean-field nudge strength multiplier, per region (uniform default).
    pub field_strength: f64,
    /// Std-dev of per-tick innovation noise added to internal belief coordinates.
    pub innovation_noise_std: f64,
    /// Base anchoring contribution (resistance to influence).
    pub anchoring_base: f64,
    /// Weight of age/age_max on anchoring.
    pub anchoring_age_weight: f64,
    /// Weight of assertiveness on anchoring.
    pub anchoring_assert_weight: f64,
    /// Hard cap on anchoring.
    pub anchoring_max: f64,

    /// Simulated ticks per calendar year; gates annual->per-tick mortality/fertility conversion.
    pub ticks_per_year: u32,
    /// Maximum agent age in years; agents beyond this are near-certain to die.
    pub max_age_years: u32,
    /// Soft population capacity per region, used in crowding terms.
    pub region_capacity: u32,
    /// Gate for demography (mortality, fertility, migration).
    pub demography_enabled: bool,
    /// Hard cap on total population to bound runaway growth.
    pub max_population: u32,

    /// Number of k-means clusters tracked by the online clustering engine.
    pub num_clusters: u32,
    /// Online k-means learning rate.
    pub cluster_learning_rate: f64,
    /// Ticks between full cluster reassignment passes.
    pub cluster_reassign_period: u64,

    /// Master RNG seed; determinism root.
    pub seed: u64,
    /// Number of data-parallel workers used for the belief/economy hot loops.
    pub worker_count: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            population: 50_000,
            regions: 200,
            avg_connections: 4,
            rewire_prob: 0.05,

            step_size: 0.05,
            sim_floor: 0.05,
            use_mean_field: false,
            field_strength: 1.0,
            innovation_noise_std: 0.03,
            anchoring_base: 0.05,
            anchoring_age_weight: 0.15,
            anchoring_assert_weight: 0.2,
            anchoring_max: 0.8,

            ticks_per_year: 10,
            max_age_years: 100,
            region_capacity: 50_000,
            demography_enabled: true,
            max_population: 2_000_000,

            num_clusters: 6,
            cluster_learning_rate: 0.05,
            cluster_reassign_period: 1_000,

            seed: 0,
            worker_count: 4,
        }
    }
}

impl KernelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_population(mut self, population: u32) -> Self {
        self.population = population;
        self
    }

    pub fn with_regions(mut self, regions: u32) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_graph(mut self, avg_connections: u32, rewire_prob: f64) -> Self {
        self.avg_connections = avg_connections;
        self.rewire_prob = rewire_prob;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_mean_field(mut self, use_mean_field: bool) -> Self {
        self.use_mean_field = use_mean_field;
        self
    }

    pub fn with_demography_enabled(mut self, enabled: bool) -> Self {
        self.demography_enabled = enabled;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Validate per the kernel's `ConfigError` taxonomy. Called by `Kernel::new`
    /// before any table is allocated.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.population == 0 {
            return Err(SimError::ConfigError("population must be > 0".into()));
        }
        if self.regions == 0 {
            return Err(SimError::ConfigError("regions must be > 0".into()));
        }
        if self.ticks_per_year == 0 {
            return Err(SimError::ConfigError("ticks_per_year must be > 0".into()));
        }
        if self.max_age_years == 0 {
            return Err(SimError::ConfigError("max_age_years must be > 0".into()));
        }
        if self.region_capacity == 0 {
            return Err(SimError::ConfigError("region_capacity must be > 0".into()));
        }
        if self.avg_connections == 0 {
            return Err(SimError::ConfigError(
                "avg_connections must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rewire_prob) {
            return Err(SimError::ConfigError(
                "rewire_prob must be within [0, 1]".into(),
            ));
        }
        if self.num_clusters == 0 {
            return Err(SimError::ConfigError("num_clusters must be > 0".into()));
        }
        if self.cluster_reassign_period == 0 {
            return Err(SimError::ConfigError(
                "cluster_reassign_period must be > 0".into(),
            ));
        }
        if self.max_population < self.population {
            return Err(SimError::ConfigError(
                "max_population must be >= population".into(),
            ));
        }
        if self.worker_count == 0 {
            return Err(SimError::ConfigError("worker_count must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(KernelConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_population_rejected() {
        let cfg = KernelConfig::default().with_population(0);
        assert!(matches!(cfg.validate(), Err(SimError::ConfigError(_))));
    }

    #[test]
    fn zero_regions_rejected() {
        let cfg = KernelConfig {
            regions: 0,
            ..KernelConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_cluster_reassign_period_rejected() {
        let cfg = KernelConfig {
            cluster_reassign_period: 0,
            ..KernelConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_rewire_prob_rejected() {
        let cfg = KernelConfig {
            rewire_prob: 1.5,
            ..KernelConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
