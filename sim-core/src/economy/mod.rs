//! Regional economy & trade (§4.3): five-good production/consumption/trade
//! with Laplacian diffusion across a geography-derived trade graph, emergent
//! prices, specialization drift, and probabilistic economic-system
//! transitions.

pub mod gini;
pub mod trade;

use rand::Rng;

use crate::agent::AgentTable;
use crate::belief::region_belief_centroid;
use crate::config::KernelConfig;
use crate::types::{Climate, EconomicSystem, NUM_GOODS, RegionId};

/// Per-good technology multiplier. Flat for now (no tech-progress subsystem
/// in scope); kept as a named array because the production formula (§4.3
/// step 1) references `tech[g]` explicitly.
const TECH: [f64; NUM_GOODS] = [1.0, 1.0, 1.0, 1.0, 1.0];

#[derive(Debug, Clone)]
pub struct RegionEconomy {
    pub x: f64,
    pub y: f64,
    pub latitude: f64,

    pub endowment: [f64; NUM_GOODS],
    pub production: [f64; NUM_GOODS],
    pub demand: [f64; NUM_GOODS],
    pub prices: [f64; NUM_GOODS],
    pub specialization: [f64; NUM_GOODS],

    pub development: f64,
    pub welfare: f64,
    pub hardship: f64,
    pub inequality: f64,
    pub efficiency: f64,
    pub system_stability: f64,

    pub system: EconomicSystem,
    pub trade_partners: Vec<RegionId>,

    pub population: u32,
}

impl RegionEconomy {
    pub fn new(x: f64, y: f64, latitude: f64, rng: &mut impl Rng) -> Self {
        let endowment: [f64; NUM_GOODS] = std::array::from_fn(|_| 0.5 + rng.random::<f64>());
        RegionEconomy {
            x,
            y,
            latitude,
            endowment,
            production: [0.0; NUM_GOODS],
            demand: [0.0; NUM_GOODS],
            prices: [1.0; NUM_GOODS],
            specialization: [0.0; NUM_GOODS],
            development: 0.3 + 0.2 * rng.random::<f64>(),
            welfare: 0.5,
            hardship: 0.1,
            inequality: 0.2,
            efficiency: 0.8,
            system_stability: 1.0,
            system: EconomicSystem::Mixed,
            trade_partners: Vec::new(),
            population: 0,
        }
    }

    pub fn climate(&self) -> Climate {
        Climate::of_latitude(self.latitude)
    }

    /// Per-capita subsistence demand vector, growing tools/services/luxury
    /// needs with development and shifting the food/energy split by climate.
    pub fn per_capita_demand(&self) -> [f64; NUM_GOODS] {
        let climate_food = match self.climate() {
            Climate::Cold => 1.3,
            Climate::Temperate => 1.0,
            Climate::Hot => 0.8,
        };
        let climate_energy = match self.climate() {
            Climate::Cold => 1.4,
            Climate::Temperate => 1.0,
            Climate::Hot => 0.7,
        };
        [
            0.8 * climate_food,
            0.6 * climate_energy,
            0.2 + 0.3 * self.development,
            0.1 + 0.4 * self.development,
            0.05 + 0.3 * self.development.powi(2),
        ]
    }
}

/// Build the geography-derived trade partner list: each region connects to
/// its `2 + floor(development * 10) + U{0,3}` nearest regions by Euclidean
/// distance on the unit grid.
pub fn build_trade_partners(regions: &[RegionEconomy], rng: &mut impl Rng) -> Vec<Vec<RegionId>> {
    let n = regions.len();
    let mut partners = vec![Vec::new(); n];
    for r in 0..n {
        let count = (2 + (regions[r].development * 10.0).floor() as u32 + rng.random_range(0..4))
            .min(n.saturating_sub(1) as u32) as usize;
        let mut others: Vec<(f64, usize)> = (0..n)
            .filter(|&c| c != r)
            .map(|c| {
                let dx = regions[r].x - regions[c].x;
                let dy = regions[r].y - regions[c].y;
                ((dx * dx + dy * dy).sqrt(), c)
            })
            .collect();
        others.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        partners[r] = others.into_iter().take(count).map(|(_, c)| c as RegionId).collect();
    }
    // Symmetrize: a trade link is undirected even though nearest-neighbor
    // selection above is not.
    let snapshot = partners.clone();
    for r in 0..n {
        for &p in &snapshot[r] {
            if !partners[p as usize].contains(&(r as RegionId)) {
                partners[p as usize].push(r as RegionId);
            }
        }
    }
    partners
}

/// Run one EconomyTick (§4.3), called every `10` ticks by the kernel.
/// Returns the total trade volume moved this tick, for the caller's metrics.
pub fn run_economy_tick(cfg: &KernelConfig, regions: &mut [RegionEconomy], table: &mut AgentTable) -> f64 {
    let n = regions.len();

    // Population per region, from the live agent table.
    for r in 0..n {
        regions[r].population = table.region_index(r as RegionId).len() as u32;
    }

    // 1. Production.
    for region in regions.iter_mut() {
        let pop = region.population as f64;
        for g in 0..NUM_GOODS {
            region.production[g] = region.endowment[g]
                * pop
                * (1.0 + region.specialization[g])
                * TECH[g]
                * region.efficiency
                * (1.0 + 0.2 * region.development);
        }
    }

    // 2. Demand.
    for region in regions.iter_mut() {
        let per_capita = region.per_capita_demand();
        let pop = region.population as f64;
        for g in 0..NUM_GOODS {
            region.demand[g] = per_capita[g] * pop;
        }
    }

    // 3. Trade: Laplacian diffusion per good.
    let laplacian = trade::build_laplacian(
        n,
        &regions.iter().map(|r| r.trade_partners.clone()).collect::<Vec<_>>(),
    );
    const DIFFUSION_RATE: f64 = 0.25;
    let mut trade_volume = 0.0;
    for g in 0..NUM_GOODS {
        let surplus: Vec<f64> = regions.iter().map(|r| r.production[g] - r.demand[g]).collect();
        let result = trade::diffuse_good(&laplacian, &surplus, DIFFUSION_RATE);
        trade_volume += result.net_flow.iter().map(|v| v.abs()).sum::<f64>();
        for (r, region) in regions.iter_mut().enumerate() {
            // Net imports add to locally available supply for pricing purposes.
            region.production[g] += result.net_flow[r];
        }
    }

    // 4. Price update.
    const EPSILON: f64 = 0.02;
    for region in regions.iter_mut() {
        for g in 0..NUM_GOODS {
            if region.demand[g] > region.production[g] {
                region.prices[g] *= 1.0 + EPSILON;
            } else {
                region.prices[g] *= 1.0 - 0.5 * EPSILON;
            }
            region.prices[g] = region.prices[g].clamp(0.01, 100.0);
        }
    }

    // 5. Specialization drift.
    for region in regions.iter_mut() {
        for g in 0..NUM_GOODS {
            let surplus = region.production[g] - region.demand[g];
            region.specialization[g] += if surplus > 0.0 { 0.001 } else { -0.0005 };
            region.specialization[g] = region.specialization[g].clamp(-0.5, 0.3);
        }
    }

    // 6. Agent income, productivity-weighted within (region, sector).
    let mut sector_productivity = vec![[0.0f64; NUM_GOODS]; n];
    for i in 0..table.len() {
        if !table.alive[i] {
            continue;
        }
        let r = table.region[i] as usize;
        let s = table.sector[i] as usize;
        if s < NUM_GOODS {
            sector_productivity[r][s] += table.productivity[i];
        }
    }
    for i in 0..table.len() {
        if !table.alive[i] {
            continue;
        }
        let r = table.region[i] as usize;
        let s = table.sector[i] as usize;
        if s >= NUM_GOODS || sector_productivity[r][s] <= 0.0 {
            table.income[i] = 0.0;
            continue;
        }
        let share = table.productivity[i] / sector_productivity[r][s];
        table.income[i] = share * regions[r].production[s] * regions[r].prices[s];
        table.wealth[i] = (table.wealth[i] + table.income[i]).max(0.0);
    }

    // 7. Hardship: development-weighted shortfall vs. subsistence needs.
    for i in 0..table.len() {
        if !table.alive[i] {
            continue;
        }
        let r = table.region[i] as usize;
        let region = &regions[r];
        let per_capita = region.per_capita_demand();
        let essentials = [0usize, 1, 2, 3]; // food, energy, tools, services
        let mut shortfall = 0.0;
        for &g in &essentials {
            let available_share = if region.demand[g] > 0.0 {
                (region.production[g] / region.demand[g]).min(1.0)
            } else {
                1.0
            };
            shortfall += (1.0 - available_share) * (1.0 - 0.3 * region.development);
        }
        table.hardship[i] = (shortfall / essentials.len() as f64).clamp(0.0, 1.0);
    }
    for (r, region) in regions.iter_mut().enumerate() {
        let ids = table.region_index(r as RegionId);
        if ids.is_empty() {
            continue;
        }
        let sum: f64 = ids.iter().map(|&id| table.hardship[id as usize]).sum();
        region.hardship = sum / ids.len() as f64;
    }

    // Inequality: true Gini over sorted regional wealth.
    for (r, region) in regions.iter_mut().enumerate() {
        let ids = table.region_index(r as RegionId);
        let wealths: Vec<f64> = ids.iter().map(|&id| table.wealth[id as usize]).collect();
        region.inequality = gini::gini(&wealths);
        region.welfare = (1.0 - region.hardship) * (1.0 - 0.5 * region.inequality);
    }

    // 8. System transitions (probabilistic, gated by institutional inertia).
    for (r, region) in regions.iter_mut().enumerate() {
        let centroid = region_belief_centroid(table, r as RegionId);
        maybe_transition_system(region, centroid);
    }

    let _ = cfg;
    trade_volume
}

/// Probability-gated economic-system transition: 0.2-5%/tick when
/// conditions are met, modulated by institutional inertia so there is no
/// instantaneous flip.
fn maybe_transition_system(region: &mut RegionEconomy, belief_centroid: [f64; 4]) {
    // Dimension 0 is read as a Collectivism(-1) <-> Individualism(+1) axis,
    // dimension 2 as Tradition(-1) <-> Progress(+1); both chosen by
    // convention, matching the demography fertility modulation in §4.4.
    let collectivism = -belief_centroid[0];
    let progress = belief_centroid[2];

    let candidate = if region.hardship > 0.6 && collectivism > 0.2 {
        EconomicSystem::Cooperative
    } else if region.hardship > 0.6 && region.inequality > 0.5 {
        EconomicSystem::Feudal
    } else if progress > 0.3 && collectivism < -0.2 {
        EconomicSystem::Market
    } else if progress < -0.3 && collectivism > 0.2 {
        EconomicSystem::Planned
    } else {
        EconomicSystem::Mixed
    };

    if candidate == region.system {
        region.system_stability = (region.system_stability + 0.01).min(2.0);
        return;
    }

    let coeffs = region.system.coefficients();
    let pressure = (region.hardship + region.inequality) / 2.0;
    let p = (0.002 + 0.05 * pressure * (1.0 - coeffs.inertia)).clamp(0.002, 0.05);

    // Deterministic pseudo-probability gate derived from system_stability so
    // this function stays a pure fn of (region state); the kernel feeds RNG
    // draws in separately where true randomness matters (see `Kernel::step`).
    region.system_stability = (region.system_stability - p).max(0.0);
    if region.system_stability <= 0.0 {
        let target_coeffs = candidate.coefficients();
        region.system = candidate;
        region.efficiency = (region.efficiency + target_coeffs.efficiency_bonus).clamp(0.1, 2.0);
        region.welfare = (region.welfare + target_coeffs.welfare_bonus).clamp(0.0, 2.0);
        region.system_stability = 1.0;
    }
}
