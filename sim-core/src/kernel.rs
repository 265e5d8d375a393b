//! The `Kernel`: a value that owns every tick phase and all simulation
//! state. `Kernel::step()` executes the ordered phase list of §2 for one
//! tick; `Kernel::run(n)` calls it `n` times. A tick is a pure, synchronous,
//! in-memory transaction — nothing here blocks on I/O.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "instrument")]
use tracing::info;

use crate::agent::{AgentTable, AgentTemplate};
use crate::belief;
use crate::checkpoint;
use crate::clustering::{ClusterState, ClusterSummary};
use crate::config::KernelConfig;
use crate::demography;
use crate::economy::{self, RegionEconomy};
use crate::error::{SimError, SimResult};
use crate::graph;
use crate::migration;
use crate::rng::phase_rng;
use crate::snapshot::{AgentSnapshot, Metrics, PersonalityTraits, RegionEconomySummary, Snapshot, region_summary};
use crate::types::{NONE_AGENT, NUM_BELIEF_DIMS, RegionId};

const ECONOMY_PERIOD: u64 = 10;
const MIGRATION_PERIOD: u64 = 10;
const CLEANUP_PERIOD: u64 = 5;

pub struct Kernel {
    cfg: KernelConfig,
    table: AgentTable,
    regions: Vec<RegionEconomy>,
    clusters: ClusterState,
    tick: u64,
    ticks_into_year: u32,
    last_checkpoint_timestamp: u64,
    warning_counter: u64,
}

impl Kernel {
    /// Validate `cfg`, then build a fresh population, region set, and
    /// small-world graph. No table is allocated until validation passes.
    pub fn new(cfg: KernelConfig) -> SimResult<Kernel> {
        cfg.validate()?;

        let mut init_rng = ChaCha8Rng::seed_from_u64(cfg.seed);

        let mut regions = Vec::with_capacity(cfg.regions as usize);
        for r in 0..cfg.regions {
            let x = init_rng.random::<f64>();
            let y = init_rng.random::<f64>();
            let latitude = init_rng.random::<f64>() * 2.0 - 1.0;
            regions.push(RegionEconomy::new(x, y, latitude, &mut init_rng));
        }
        let partners = economy::build_trade_partners(&regions, &mut init_rng);
        for (r, region) in regions.iter_mut().enumerate() {
            region.trade_partners = partners[r].clone();
        }

        let mut table = AgentTable::new(cfg.regions);
        for i in 0..cfg.population {
            let region = (i % cfg.regions) as RegionId;
            let female = init_rng.random_bool(0.5);
            let template = AgentTemplate {
                region,
                age: init_rng.random_range(0..cfg.max_age_years),
                female,
                parent_a: NONE_AGENT,
                parent_b: NONE_AGENT,
                lineage_id: table.fresh_lineage_id(),
                primary_lang: init_rng.random_range(0..4),
                dialect: init_rng.random_range(0..=255),
                fluency: 0.3 + 0.7 * init_rng.random::<f64>(),
                openness: init_rng.random(),
                conformity: init_rng.random(),
                assertiveness: init_rng.random(),
                sociality: init_rng.random(),
                x: std::array::from_fn(|_| init_rng.random::<f64>() * 2.0 - 1.0),
                m_comm: 0.3 + 0.9 * init_rng.random::<f64>(),
                m_susceptibility: 0.3 + 0.9 * init_rng.random::<f64>(),
                m_mobility: 0.3 + 0.9 * init_rng.random::<f64>(),
                wealth: 1.0 + init_rng.random::<f64>(),
                sector: init_rng.random_range(0..5),
            };
            table.add_agent(&template);
        }

        graph::build_watts_strogatz(&mut table, cfg.avg_connections, cfg.rewire_prob, &mut init_rng);

        let mut cluster_rng = phase_rng(cfg.seed, Self::CLUSTER_PHASE_TAG, 0);
        let clusters = ClusterState::new(cfg.num_clusters, cfg.cluster_learning_rate, &table, &mut cluster_rng);

        Ok(Kernel {
            cfg,
            table,
            regions,
            clusters,
            tick: 0,
            ticks_into_year: 0,
            last_checkpoint_timestamp: 0,
            warning_counter: 0,
        })
    }

    const DEMOGRAPHY_PHASE_TAG: u64 = 1;
    const MIGRATION_PHASE_TAG: u64 = 2;
    const CLUSTER_PHASE_TAG: u64 = 3;

    pub fn config(&self) -> &KernelConfig {
        &self.cfg
    }

    pub fn table(&self) -> &AgentTable {
        &self.table
    }

    pub fn regions(&self) -> &[RegionEconomy] {
        &self.regions
    }

    pub fn cluster_state(&self) -> &ClusterState {
        &self.clusters
    }

    pub fn generation(&self) -> u64 {
        self.tick
    }

    pub fn last_checkpoint_timestamp(&self) -> u64 {
        self.last_checkpoint_timestamp
    }

    /// Rebuild the kernel in place with a new configuration (the `reset`
    /// shell verb). Equivalent to `*self = Kernel::new(cfg)?`.
    pub fn reseed(&mut self, cfg: KernelConfig) -> SimResult<()> {
        *self = Kernel::new(cfg)?;
        Ok(())
    }

    /// Advance one tick, executing the ordered phase list of §2.
    pub fn step(&mut self) -> SimResult<()> {
        self.tick += 1;

        if self.tick % ECONOMY_PERIOD == 0 {
            let trade_volume = economy::run_economy_tick(&self.cfg, &mut self.regions, &mut self.table);
            #[cfg(feature = "instrument")]
            info!(target: "economy_tick", tick = self.tick, regions = self.regions.len(), trade_volume);
            let _ = trade_volume;
        }

        if self.cfg.demography_enabled {
            self.run_demography_tick()?;
        }

        if self.cfg.demography_enabled && self.tick % MIGRATION_PERIOD == 0 {
            let mut rng = phase_rng(self.cfg.seed, Self::MIGRATION_PHASE_TAG, self.tick);
            let events = migration::run_migration(&self.cfg, &mut self.table, &self.regions, &mut rng);
            #[cfg(feature = "instrument")]
            for e in &events {
                info!(target: "migration", tick = self.tick, agent = e.agent, from = e.from, to = e.to);
            }
            let _ = events;
        }

        belief::update_beliefs(&self.cfg, &mut self.table, &self.regions, self.tick);
        self.validate_beliefs()?;

        self.clusters.update_incremental(&self.table);
        if self.tick % self.cfg.cluster_reassign_period == 0 {
            let mut rng = phase_rng(self.cfg.seed, Self::CLUSTER_PHASE_TAG, self.tick);
            self.clusters.reassign_all(&self.table, &mut rng);
            #[cfg(feature = "instrument")]
            info!(target: "cluster_reassign", tick = self.tick);
        }

        if self.tick % CLEANUP_PERIOD == 0 {
            let remap = self.table.compact();
            self.clusters.remap(&remap.old_to_new, remap.new_len);
        }

        self.ticks_into_year += 1;
        if self.ticks_into_year >= self.cfg.ticks_per_year {
            self.ticks_into_year = 0;
            demography::age_all(&mut self.table, self.cfg.max_age_years);
        }

        self.last_checkpoint_timestamp = self.tick;
        Ok(())
    }

    fn run_demography_tick(&mut self) -> SimResult<()> {
        let cohorts = demography::build_cohorts(&self.table);

        let mut mortality_rng = phase_rng(self.cfg.seed, Self::DEMOGRAPHY_PHASE_TAG, self.tick);
        let deaths = demography::run_mortality(&self.cfg, &mut self.table, &self.regions, &cohorts, &mut mortality_rng);
        #[cfg(feature = "instrument")]
        for e in &deaths {
            info!(target: "death", tick = self.tick, region = e.region, deaths = e.deaths);
        }
        let _ = deaths;

        let mut belief_centroids = std::collections::HashMap::new();
        for r in 0..self.regions.len() as RegionId {
            belief_centroids.insert(r, belief::region_belief_centroid(&self.table, r));
        }

        // Cohorts built before mortality may include now-dead members; that's
        // fine since fertility only needs a per-cohort count estimate and
        // `materialize_birth` checks `alive` on the sampled mother.
        let mut fertility_rng = phase_rng(self.cfg.seed, Self::DEMOGRAPHY_PHASE_TAG + 100, self.tick);
        let births = demography::run_fertility(
            &self.cfg,
            &mut self.table,
            &self.regions,
            &cohorts,
            &belief_centroids,
            &mut fertility_rng,
        );
        #[cfg(feature = "instrument")]
        for e in &births {
            info!(target: "birth", tick = self.tick, child = e.child, mother = e.mother, father = e.father, region = e.region);
        }
        let _ = births;

        self.clusters.grow(&self.table);
        Ok(())
    }

    fn validate_beliefs(&mut self) -> SimResult<()> {
        for i in 0..self.table.len() {
            if !self.table.alive[i] {
                continue;
            }
            for k in 0..NUM_BELIEF_DIMS {
                let v = self.table.b[i][k];
                if !v.is_finite() {
                    if cfg!(debug_assertions) {
                        return Err(SimError::NonFiniteBelief {
                            agent: i as u32,
                            dim: k,
                            value: v,
                        });
                    } else {
                        self.table.b[i][k] = 0.0;
                        self.warning_counter += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Advance `n` ticks.
    pub fn run(&mut self, n: u64) -> SimResult<()> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Scalar metrics for the current generation (`metrics` shell verb).
    pub fn metrics(&self) -> Metrics {
        let live: Vec<usize> = (0..self.table.len()).filter(|&i| self.table.alive[i]).collect();
        let n = live.len().max(1) as f64;

        let polarization_values: Vec<f64> = live
            .iter()
            .map(|&i| self.table.b[i].iter().map(|v| v.abs()).sum::<f64>() / NUM_BELIEF_DIMS as f64)
            .collect();
        let polarization_mean = polarization_values.iter().sum::<f64>() / n;
        let variance = polarization_values
            .iter()
            .map(|v| (v - polarization_mean).powi(2))
            .sum::<f64>()
            / n;

        let avg_openness = live.iter().map(|&i| self.table.openness[i]).sum::<f64>() / n;
        let avg_conformity = live.iter().map(|&i| self.table.conformity[i]).sum::<f64>() / n;

        let welfare = self.regions.iter().map(|r| r.welfare).sum::<f64>() / self.regions.len().max(1) as f64;
        let inequality = self.regions.iter().map(|r| r.inequality).sum::<f64>() / self.regions.len().max(1) as f64;
        let hardship = self.regions.iter().map(|r| r.hardship).sum::<f64>() / self.regions.len().max(1) as f64;
        let trade_volume: f64 = self
            .regions
            .iter()
            .flat_map(|r| r.production.iter().zip(r.demand.iter()))
            .map(|(p, d)| (p - d).abs())
            .sum();

        Metrics {
            generation: self.tick,
            polarization_mean,
            polarization_std: variance.sqrt(),
            avg_openness,
            avg_conformity,
            welfare,
            inequality,
            hardship,
            trade_volume,
            population: live.len() as u64,
        }
    }

    /// JSON-serializable snapshot (`state`/`step` shell verbs).
    pub fn snapshot(&self, include_traits: bool) -> Snapshot {
        let agents = (0..self.table.len())
            .map(|i| AgentSnapshot {
                id: i as u32,
                region: self.table.region[i],
                lang: self.table.primary_lang[i],
                beliefs: self.table.b[i],
                alive: self.table.alive[i],
                age: self.table.age[i],
                female: self.table.female[i],
                traits: include_traits.then(|| PersonalityTraits {
                    openness: self.table.openness[i],
                    conformity: self.table.conformity[i],
                    assertiveness: self.table.assertiveness[i],
                    sociality: self.table.sociality[i],
                }),
            })
            .collect();
        Snapshot {
            generation: self.tick,
            metrics: self.metrics(),
            agents,
        }
    }

    /// Per-region economic summary (`economy` shell verb).
    pub fn economy_summary(&self) -> Vec<RegionEconomySummary> {
        self.regions
            .iter()
            .enumerate()
            .map(|(r, region)| region_summary(r as RegionId, region))
            .collect()
    }

    /// Cluster summaries after an explicit `cluster kmeans K` reassignment.
    pub fn cluster_kmeans(&mut self, k: u32) -> Vec<ClusterSummary> {
        if k != self.clusters.centroids.len() as u32 {
            let mut rng = phase_rng(self.cfg.seed, Self::CLUSTER_PHASE_TAG, self.tick);
            self.clusters = ClusterState::new(k, self.cfg.cluster_learning_rate, &self.table, &mut rng);
        }
        let mut rng = phase_rng(self.cfg.seed, Self::CLUSTER_PHASE_TAG + 1, self.tick);
        self.clusters.reassign_all(&self.table, &mut rng);
        self.clusters.summaries(&self.table)
    }

    pub fn save_checkpoint(&self, writer: impl std::io::Write) -> SimResult<()> {
        checkpoint::save(self, writer)
    }

    pub fn load_checkpoint(reader: impl std::io::Read) -> SimResult<Kernel> {
        let loaded = checkpoint::load(reader)?;
        let mut next_lineage = 0u32;
        for &l in &loaded.table.lineage_id {
            next_lineage = next_lineage.max(l + 1);
        }
        let mut table = loaded.table;
        for _ in 0..next_lineage {
            table.fresh_lineage_id();
        }
        let learning_rate = loaded.config.cluster_learning_rate;
        Ok(Kernel {
            cfg: loaded.config,
            table,
            regions: loaded.regions,
            clusters: ClusterState {
                centroids: loaded.cluster_centroids,
                assignment: loaded.cluster_assignment,
                learning_rate,
            },
            tick: loaded.generation,
            ticks_into_year: 0,
            last_checkpoint_timestamp: loaded.generation,
            warning_counter: 0,
        })
    }
}
