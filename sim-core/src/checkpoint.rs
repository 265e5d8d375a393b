//! Binary checkpoint format (§6): magic/version header, then every agent
//! field in §3 order, then region state plus the per-agent economy record.
//! `Kernel` owns this encoding directly because §8 requires a testable
//! round-trip law; an external CLI only chooses *when* to call it and
//! *where* the bytes land on disk.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::agent::AgentTable;
use crate::economy::RegionEconomy;
use crate::error::{SimError, SimResult};
use crate::kernel::Kernel;
use crate::types::{AgentId, EconomicSystem, NUM_BELIEF_DIMS, NUM_GOODS, RegionId};

pub const MAGIC: u32 = 0x4543_5356;
pub const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: u32,
    version: u32,
    generation: u64,
    num_agents: u32,
    num_regions: u32,
    seed: u64,
    timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct AgentRecord {
    region: RegionId,
    alive: bool,
    age: u32,
    female: bool,
    parent_a: AgentId,
    parent_b: AgentId,
    lineage_id: u32,
    primary_lang: u8,
    dialect: u8,
    fluency: f64,
    openness: f64,
    conformity: f64,
    assertiveness: f64,
    sociality: f64,
    x: [f64; NUM_BELIEF_DIMS],
    b: [f64; NUM_BELIEF_DIMS],
    b_norm_sq: f64,
    m_comm: f64,
    m_susceptibility: f64,
    m_mobility: f64,
    wealth: f64,
    income: f64,
    productivity: f64,
    hardship: f64,
    sector: u8,
    neighbors: Vec<AgentId>,
}

fn system_tag(s: EconomicSystem) -> u8 {
    EconomicSystem::ALL.iter().position(|&v| v == s).unwrap() as u8
}

fn system_from_tag(tag: u8) -> SimResult<EconomicSystem> {
    EconomicSystem::ALL
        .get(tag as usize)
        .copied()
        .ok_or_else(|| SimError::ConfigError(format!("invalid economic-system tag {tag}")))
}

#[derive(Debug, Serialize, Deserialize)]
struct RegionRecord {
    x: f64,
    y: f64,
    latitude: f64,
    endowment: [f64; NUM_GOODS],
    production: [f64; NUM_GOODS],
    demand: [f64; NUM_GOODS],
    prices: [f64; NUM_GOODS],
    specialization: [f64; NUM_GOODS],
    development: f64,
    welfare: f64,
    hardship: f64,
    inequality: f64,
    efficiency: f64,
    system_stability: f64,
    system: u8,
    trade_partners: Vec<RegionId>,
    population: u32,
}

fn to_record(id: usize, t: &AgentTable) -> AgentRecord {
    AgentRecord {
        region: t.region[id],
        alive: t.alive[id],
        age: t.age[id],
        female: t.female[id],
        parent_a: t.parent_a[id],
        parent_b: t.parent_b[id],
        lineage_id: t.lineage_id[id],
        primary_lang: t.primary_lang[id],
        dialect: t.dialect[id],
        fluency: t.fluency[id],
        openness: t.openness[id],
        conformity: t.conformity[id],
        assertiveness: t.assertiveness[id],
        sociality: t.sociality[id],
        x: t.x[id],
        b: t.b[id],
        b_norm_sq: t.b_norm_sq[id],
        m_comm: t.m_comm[id],
        m_susceptibility: t.m_susceptibility[id],
        m_mobility: t.m_mobility[id],
        wealth: t.wealth[id],
        income: t.income[id],
        productivity: t.productivity[id],
        hardship: t.hardship[id],
        sector: t.sector[id],
        neighbors: t.neighbors[id].clone(),
    }
}

fn region_to_record(r: &RegionEconomy) -> RegionRecord {
    RegionRecord {
        x: r.x,
        y: r.y,
        latitude: r.latitude,
        endowment: r.endowment,
        production: r.production,
        demand: r.demand,
        prices: r.prices,
        specialization: r.specialization,
        development: r.development,
        welfare: r.welfare,
        hardship: r.hardship,
        inequality: r.inequality,
        efficiency: r.efficiency,
        system_stability: r.system_stability,
        system: system_tag(r.system),
        trade_partners: r.trade_partners.clone(),
        population: r.population,
    }
}

/// Serialize the full kernel state (agents, regions, clustering, RNG root,
/// and tick counter) to `writer`. Returns an `IoError`/`EncodingError` on
/// failure; never panics.
pub fn save(kernel: &Kernel, mut writer: impl Write) -> SimResult<()> {
    let header = Header {
        magic: MAGIC,
        version: VERSION,
        generation: kernel.generation(),
        num_agents: kernel.table().len() as u32,
        num_regions: kernel.regions().len() as u32,
        seed: kernel.config().seed,
        timestamp: kernel.last_checkpoint_timestamp(),
    };
    bincode::serialize_into(&mut writer, &header)?;

    let agent_records: Vec<AgentRecord> = (0..kernel.table().len())
        .map(|i| to_record(i, kernel.table()))
        .collect();
    bincode::serialize_into(&mut writer, &agent_records)?;

    let region_records: Vec<RegionRecord> = kernel.regions().iter().map(region_to_record).collect();
    bincode::serialize_into(&mut writer, &region_records)?;

    bincode::serialize_into(&mut writer, kernel.config())?;
    bincode::serialize_into(&mut writer, &kernel.cluster_state().centroids)?;
    bincode::serialize_into(&mut writer, &kernel.cluster_state().assignment)?;

    Ok(())
}

/// Decoded checkpoint contents, assembled back into agent/region tables by
/// `Kernel::load`. Kept separate from `Kernel` itself so loading can be
/// validated (magic/version) before any table is allocated.
pub struct Loaded {
    pub generation: u64,
    pub seed: u64,
    pub config: crate::config::KernelConfig,
    pub table: AgentTable,
    pub regions: Vec<RegionEconomy>,
    pub cluster_centroids: Vec<[f64; NUM_BELIEF_DIMS]>,
    pub cluster_assignment: Vec<u32>,
}

/// Deserialize and validate a checkpoint. Refuses to load on magic or
/// version mismatch, per §6. A full restore (including economy state) is
/// REQUIRED; there is no partial-restore path.
pub fn load(mut reader: impl Read) -> SimResult<Loaded> {
    let header: Header = bincode::deserialize_from(&mut reader)?;
    if header.magic != MAGIC || header.version != VERSION {
        return Err(SimError::CheckpointHeaderMismatch {
            expected_magic: MAGIC,
            expected_version: VERSION,
            found_magic: header.magic,
            found_version: header.version,
        });
    }

    let agent_records: Vec<AgentRecord> = bincode::deserialize_from(&mut reader)?;
    let region_records: Vec<RegionRecord> = bincode::deserialize_from(&mut reader)?;
    let config: crate::config::KernelConfig = bincode::deserialize_from(&mut reader)?;
    let cluster_centroids: Vec<[f64; NUM_BELIEF_DIMS]> = bincode::deserialize_from(&mut reader)?;
    let cluster_assignment: Vec<u32> = bincode::deserialize_from(&mut reader)?;

    let mut table = AgentTable::new(header.num_regions);
    for rec in &agent_records {
        table.region.push(rec.region);
        table.alive.push(rec.alive);
        table.age.push(rec.age);
        table.female.push(rec.female);
        table.parent_a.push(rec.parent_a);
        table.parent_b.push(rec.parent_b);
        table.lineage_id.push(rec.lineage_id);
        table.primary_lang.push(rec.primary_lang);
        table.dialect.push(rec.dialect);
        table.fluency.push(rec.fluency);
        table.openness.push(rec.openness);
        table.conformity.push(rec.conformity);
        table.assertiveness.push(rec.assertiveness);
        table.sociality.push(rec.sociality);
        table.x.push(rec.x);
        table.b.push(rec.b);
        table.b_norm_sq.push(rec.b_norm_sq);
        table.m_comm.push(rec.m_comm);
        table.m_susceptibility.push(rec.m_susceptibility);
        table.m_mobility.push(rec.m_mobility);
        table.wealth.push(rec.wealth);
        table.income.push(rec.income);
        table.productivity.push(rec.productivity);
        table.hardship.push(rec.hardship);
        table.sector.push(rec.sector);
        table.neighbors.push(rec.neighbors.clone());
    }
    for (id, rec) in agent_records.iter().enumerate() {
        if rec.alive {
            table.rebuild_region_index_entry(rec.region, id as AgentId);
        }
    }

    let mut regions = Vec::with_capacity(region_records.len());
    for rec in &region_records {
        regions.push(RegionEconomy {
            x: rec.x,
            y: rec.y,
            latitude: rec.latitude,
            endowment: rec.endowment,
            production: rec.production,
            demand: rec.demand,
            prices: rec.prices,
            specialization: rec.specialization,
            development: rec.development,
            welfare: rec.welfare,
            hardship: rec.hardship,
            inequality: rec.inequality,
            efficiency: rec.efficiency,
            system_stability: rec.system_stability,
            system: system_from_tag(rec.system)?,
            trade_partners: rec.trade_partners.clone(),
            population: rec.population,
        });
    }

    Ok(Loaded {
        generation: header.generation,
        seed: header.seed,
        config,
        table,
        regions,
        cluster_centroids,
        cluster_assignment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;

    #[test]
    fn round_trip_preserves_population_and_beliefs() {
        let cfg = KernelConfig::default()
            .with_population(200)
            .with_regions(5)
            .with_seed(99);
        let mut kernel = Kernel::new(cfg).unwrap();
        kernel.run(5).unwrap();

        let mut buf = Vec::new();
        save(&kernel, &mut buf).unwrap();
        let loaded = load(&buf[..]).unwrap();

        assert_eq!(loaded.generation, kernel.generation());
        assert_eq!(loaded.table.len(), kernel.table().len());
        for i in 0..loaded.table.len() {
            assert_eq!(loaded.table.b[i], kernel.table().b[i]);
            assert_eq!(loaded.table.alive[i], kernel.table().alive[i]);
        }
        assert_eq!(loaded.regions.len(), kernel.regions().len());
    }

    #[test]
    fn bad_magic_is_refused() {
        let cfg = KernelConfig::default().with_population(10).with_regions(2);
        let kernel = Kernel::new(cfg).unwrap();
        let mut buf = Vec::new();
        save(&kernel, &mut buf).unwrap();
        buf[0] = buf[0].wrapping_add(1);
        assert!(load(&buf[..]).is_err());
    }
}
