//! Read-only views the Kernel exposes for an external shell to print as JSON
//! or CSV (§6). The Kernel never formats or writes these itself.

use serde::Serialize;

use crate::economy::RegionEconomy;
use crate::types::{AgentId, NUM_BELIEF_DIMS, RegionId};

/// Scalar metrics for one generation, in the fixed column order the CSV
/// writer (an external collaborator) must use as its header.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub generation: u64,
    pub polarization_mean: f64,
    pub polarization_std: f64,
    pub avg_openness: f64,
    pub avg_conformity: f64,
    pub welfare: f64,
    pub inequality: f64,
    pub hardship: f64,
    pub trade_volume: f64,
    pub population: u64,
}

pub const METRICS_CSV_HEADER: [&str; 10] = [
    "generation",
    "polarization_mean",
    "polarization_std",
    "avg_openness",
    "avg_conformity",
    "welfare",
    "inequality",
    "hardship",
    "trade_volume",
    "population",
];

#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub region: RegionId,
    pub lang: u8,
    pub beliefs: [f64; NUM_BELIEF_DIMS],
    pub alive: bool,
    pub age: u32,
    pub female: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traits: Option<PersonalityTraits>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalityTraits {
    pub openness: f64,
    pub conformity: f64,
    pub assertiveness: f64,
    pub sociality: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    pub metrics: Metrics,
    pub agents: Vec<AgentSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionEconomySummary {
    pub region: RegionId,
    pub population: u32,
    pub development: f64,
    pub welfare: f64,
    pub hardship: f64,
    pub inequality: f64,
    pub system: &'static str,
    pub prices: [f64; 5],
    pub specialization: [f64; 5],
}

pub fn system_label(system: crate::types::EconomicSystem) -> &'static str {
    use crate::types::EconomicSystem::*;
    match system {
        Mixed => "mixed",
        Cooperative => "cooperative",
        Market => "market",
        Feudal => "feudal",
        Planned => "planned",
    }
}

pub fn region_summary(id: RegionId, region: &RegionEconomy) -> RegionEconomySummary {
    RegionEconomySummary {
        region: id,
        population: region.population,
        development: region.development,
        welfare: region.welfare,
        hardship: region.hardship,
        inequality: region.inequality,
        system: system_label(region.system),
        prices: region.prices,
        specialization: region.specialization,
    }
}
