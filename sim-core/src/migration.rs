//! Migration (§4.5): age- and personality-weighted stochastic relocation
//! driven by regional push/pull attractiveness. Runs every 10 ticks, and
//! must not run concurrently with belief updates (it mutates `region` and
//! neighbor lists).

use rand::Rng;

use crate::agent::AgentTable;
use crate::config::KernelConfig;
use crate::economy::RegionEconomy;
use crate::types::{AgentId, RegionId};

pub struct MigrationEvent {
    pub agent: AgentId,
    pub from: RegionId,
    pub to: RegionId,
}

fn age_mobility_factor(age: u32) -> f64 {
    let d = age as f64 - 25.0;
    (1.0 - (d * d) / 2500.0).max(0.0)
}

fn crowding_penalty(region: &RegionEconomy, capacity: u32) -> f64 {
    let ratio = region.population as f64 / capacity.max(1) as f64;
    -(ratio - 1.0).max(0.0) * 0.5
}

fn attractiveness(region: &RegionEconomy, capacity: u32) -> f64 {
    region.welfare - 2.0 * region.hardship + 0.2 * region.development + crowding_penalty(region, capacity)
}

/// Run one MigrationTick over every live agent.
pub fn run_migration(
    cfg: &KernelConfig,
    table: &mut AgentTable,
    regions: &[RegionEconomy],
    rng: &mut impl Rng,
) -> Vec<MigrationEvent> {
    let n = regions.len() as RegionId;
    if n < 2 {
        return Vec::new();
    }
    let mut events = Vec::new();
    let attractiveness_by_region: Vec<f64> = regions
        .iter()
        .map(|r| attractiveness(r, cfg.region_capacity))
        .collect();

    let candidates: Vec<AgentId> = (0..table.len() as AgentId)
        .filter(|&id| table.alive[id as usize])
        .collect();

    for id in candidates {
        let i = id as usize;
        let age_factor = age_mobility_factor(table.age[i]);
        if age_factor <= 0.0 {
            continue;
        }
        let origin = table.region[i];
        let push = regions[origin as usize].hardship * table.m_mobility[i] * age_factor;
        if rng.random::<f64>() >= 0.01 * push {
            continue;
        }

        let mut destinations: Vec<RegionId> = (0..n).filter(|&r| r != origin).collect();
        {
            use rand::seq::SliceRandom;
            destinations.shuffle(rng);
        }
        destinations.truncate(5);
        if destinations.is_empty() {
            continue;
        }

        let origin_attractiveness = attractiveness_by_region[origin as usize];
        let best = destinations
            .iter()
            .copied()
            .max_by(|&a, &b| {
                attractiveness_by_region[a as usize]
                    .partial_cmp(&attractiveness_by_region[b as usize])
                    .unwrap()
            })
            .unwrap();

        let threshold = 0.15 + 0.3 * (1.0 - table.openness[i]);
        if attractiveness_by_region[best as usize] - origin_attractiveness <= threshold {
            continue;
        }

        relocate_agent(table, id, best, rng);
        events.push(MigrationEvent {
            agent: id,
            from: origin,
            to: best,
        });
    }

    events
}

/// Move an agent to a new region, retaining a `0.2 + 0.4*sociality` fraction
/// of its old neighbor list and symmetrically removing the rest.
fn relocate_agent(table: &mut AgentTable, id: AgentId, destination: RegionId, rng: &mut impl Rng) {
    let i = id as usize;
    let retain_fraction = 0.2 + 0.4 * table.sociality[i];
    let mut old_neighbors = table.neighbors[i].clone();
    {
        use rand::seq::SliceRandom;
        old_neighbors.shuffle(rng);
    }
    let keep_count = ((old_neighbors.len() as f64) * retain_fraction).round() as usize;
    let to_drop: Vec<AgentId> = old_neighbors.into_iter().skip(keep_count).collect();
    for other in to_drop {
        table.disconnect(id, other);
    }
    table.relocate(id, destination);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentTemplate;
    use crate::types::NONE_AGENT;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn template(region: RegionId, age: u32, mobility: f64) -> AgentTemplate {
        AgentTemplate {
            region,
            age,
            female: false,
            parent_a: NONE_AGENT,
            parent_b: NONE_AGENT,
            lineage_id: 0,
            primary_lang: 0,
            dialect: 0,
            fluency: 1.0,
            openness: 0.5,
            conformity: 0.5,
            assertiveness: 0.5,
            sociality: 0.5,
            x: [0.0; 4],
            m_comm: 0.5,
            m_susceptibility: mobility,
            m_mobility: mobility,
            wealth: 1.0,
            sector: 0,
        }
    }

    #[test]
    fn migration_preserves_total_population() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let cfg = KernelConfig::default();
        let mut regions: Vec<RegionEconomy> = (0..4)
            .map(|i| RegionEconomy::new(i as f64, 0.0, 0.0, &mut rng))
            .collect();
        regions[0].hardship = 0.9;
        regions[1].welfare = 1.5;
        for r in regions.iter_mut() {
            r.population = 10;
        }

        let mut table = AgentTable::new(4);
        for _ in 0..10 {
            table.add_agent(&template(0, 30, 1.0));
        }
        let before = table.live_count();
        run_migration(&cfg, &mut table, &regions, &mut rng);
        assert_eq!(table.live_count(), before);
    }

    #[test]
    fn zero_mobility_never_migrates() {
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let cfg = KernelConfig::default();
        let regions: Vec<RegionEconomy> = (0..3)
            .map(|i| RegionEconomy::new(i as f64, 0.0, 0.0, &mut rng))
            .collect();
        let mut table = AgentTable::new(3);
        for _ in 0..20 {
            table.add_agent(&template(0, 30, 0.0));
        }
        let events = run_migration(&cfg, &mut table, &regions, &mut rng);
        assert!(events.is_empty());
    }
}
