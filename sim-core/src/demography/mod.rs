//! Cohort demographics (§4.4): aggregate birth/death accounting over
//! `(region, age_band, sex)` cohorts, coupled to individual agents at
//! reproduction and death sampling points. RNG draws are `O(cohorts)`, not
//! `O(N)`: exact sampled counts replace per-agent coin flips.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::agent::{AgentTable, AgentTemplate};
use crate::config::KernelConfig;
use crate::economy::RegionEconomy;
use crate::rng;
use crate::types::{AgeBand, AgentId, NONE_AGENT, NUM_BELIEF_DIMS, RegionId};

fn gaussian(prng: &mut impl Rng, std: f64) -> f64 {
    rng::gaussian(prng, 0.0, std)
}

/// A `(region, age_band, sex)` bucket and the live agent ids currently in it.
#[derive(Debug)]
pub struct Cohort {
    pub region: RegionId,
    pub age_band: AgeBand,
    pub female: bool,
    pub members: Vec<AgentId>,
}

/// Bucket every live agent into its cohort. `O(N)` to build, but every
/// subsequent sampling decision is `O(cohorts)`.
pub fn build_cohorts(table: &AgentTable) -> Vec<Cohort> {
    let mut map: HashMap<(RegionId, usize, bool), Vec<AgentId>> = HashMap::new();
    for i in 0..table.len() {
        if !table.alive[i] {
            continue;
        }
        let band = AgeBand::of_age(table.age[i]);
        let key = (table.region[i], band.index(), table.female[i]);
        map.entry(key).or_default().push(i as AgentId);
    }
    map.into_iter()
        .map(|((region, band_idx, female), members)| Cohort {
            region,
            age_band: AgeBand::ALL[band_idx],
            female,
            members,
        })
        .collect()
}

/// Increment every live agent's age by one year. Called once per
/// `ticks_per_year` ticks so all agents share synchronized birthdays.
pub fn age_all(table: &mut AgentTable, max_age_years: u32) {
    for i in 0..table.len() {
        if table.alive[i] {
            table.age[i] = (table.age[i] + 1).min(max_age_years);
        }
    }
}

/// Binomial(n, p) sample. Exact via Bernoulli summation for small `n`;
/// normal-approximated (rounded, clamped) for large `n`, since `p` here is
/// always small and `n` can be in the tens of thousands per cohort.
fn binomial_sample(rng: &mut impl Rng, n: u32, p: f64) -> u32 {
    if n == 0 || p <= 0.0 {
        return 0;
    }
    if p >= 1.0 {
        return n;
    }
    if n <= 2_000 {
        let mut count = 0;
        for _ in 0..n {
            if rng.random::<f64>() < p {
                count += 1;
            }
        }
        return count;
    }
    let mean = n as f64 * p;
    let std = (n as f64 * p * (1.0 - p)).sqrt();
    let u1 = rng.random::<f64>().max(1e-12);
    let u2 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    ((mean + std * z).round().clamp(0.0, n as f64)) as u32
}

/// Mortality outcome for bookkeeping/logging.
pub struct MortalityEvent {
    pub region: RegionId,
    pub deaths: u32,
}

/// Sample and realize cohort mortality: deaths per cohort via `Binomial`,
/// realized by flagging that many uniformly-sampled member ids as dead.
pub fn run_mortality(
    cfg: &KernelConfig,
    table: &mut AgentTable,
    regions: &[RegionEconomy],
    cohorts: &[Cohort],
    rng: &mut impl Rng,
) -> Vec<MortalityEvent> {
    let mut events = Vec::new();
    for cohort in cohorts {
        if cohort.members.is_empty() {
            continue;
        }
        let annual = cohort.age_band.annual_mortality();
        let region = &regions[cohort.region as usize];
        // Development and welfare reduce mortality; hardship raises it.
        let modulated = (annual * (1.0 - 0.3 * region.development) * (1.0 - 0.2 * region.welfare)
            * (1.0 + 0.5 * region.hardship))
            .clamp(0.0, 1.0);
        let p_tick = 1.0 - (1.0 - modulated).powf(1.0 / cfg.ticks_per_year as f64);
        let deaths = binomial_sample(rng, cohort.members.len() as u32, p_tick);
        if deaths == 0 {
            continue;
        }
        let mut members = cohort.members.clone();
        {
            use rand::seq::SliceRandom;
            members.shuffle(rng);
        }
        for &id in members.iter().take(deaths as usize) {
            table.mark_dead(id);
        }
        events.push(MortalityEvent {
            region: cohort.region,
            deaths,
        });
    }
    events
}

/// A materialized birth, for logging.
pub struct BirthEvent {
    pub region: RegionId,
    pub child: AgentId,
    pub mother: AgentId,
    pub father: AgentId,
}

/// Sample and realize cohort fertility: births per female cohort via
/// `Binomial`, modulated by the region's Tradition/Progress belief centroid,
/// development, relative maternal wealth, and crowding against
/// `region_capacity`. Each birth materializes a new agent (§3 lifecycle,
/// §4.4).
pub fn run_fertility(
    cfg: &KernelConfig,
    table: &mut AgentTable,
    regions: &[RegionEconomy],
    cohorts: &[Cohort],
    belief_centroids: &HashMap<RegionId, [f64; NUM_BELIEF_DIMS]>,
    rng: &mut impl Rng,
) -> Vec<BirthEvent> {
    const FERTILE_BAND: usize = 2; // Age15To50
    let mut events = Vec::new();

    if table.len() as u32 >= cfg.max_population {
        return events;
    }

    for cohort in cohorts {
        if !cohort.female || cohort.age_band.index() != FERTILE_BAND || cohort.members.is_empty() {
            continue;
        }
        let region = &regions[cohort.region as usize];
        let progress = belief_centroids
            .get(&cohort.region)
            .map(|c| c[2])
            .unwrap_or(0.0);
        // Progress-leaning regions have lower baseline fertility; Tradition-
        // leaning regions higher, matching the "Tradition <-> Progress" axis
        // named by the spec.
        let base_rate = 0.02 * (1.0 - 0.4 * progress);
        let crowding = (region.population as f64 / cfg.region_capacity.max(1) as f64).min(2.0);
        let crowding_penalty = (1.0 - 0.5 * (crowding - 1.0).max(0.0)).clamp(0.1, 1.0);
        let dev_penalty = (1.0 - 0.2 * region.development).clamp(0.3, 1.0);
        let annual_rate = (base_rate * crowding_penalty * dev_penalty).clamp(0.0, 0.3);
        let p_tick = 1.0 - (1.0 - annual_rate).powf(1.0 / cfg.ticks_per_year as f64);

        let births = binomial_sample(rng, cohort.members.len() as u32, p_tick)
            .min(cfg.max_population.saturating_sub(table.len() as u32));
        if births == 0 {
            continue;
        }
        let mut mothers = cohort.members.clone();
        {
            use rand::seq::SliceRandom;
            mothers.shuffle(rng);
        }
        for &mother in mothers.iter().take(births as usize) {
            if let Some(event) = materialize_birth(table, mother, cohort.region, rng) {
                events.push(event);
            }
        }
    }
    events
}

fn materialize_birth(
    table: &mut AgentTable,
    mother: AgentId,
    region: RegionId,
    rng: &mut impl Rng,
) -> Option<BirthEvent> {
    let mother_i = mother as usize;
    if !table.alive[mother_i] {
        return None;
    }

    let father = table.neighbors[mother_i]
        .iter()
        .copied()
        .filter(|&j| table.alive[j as usize] && !table.female[j as usize])
        .collect::<Vec<_>>()
        .choose(rng)
        .copied();

    let mut x = [0.0; NUM_BELIEF_DIMS];
    let mut openness = table.openness[mother_i];
    let mut conformity = table.conformity[mother_i];
    let mut assertiveness = table.assertiveness[mother_i];
    let mut sociality = table.sociality[mother_i];

    if let Some(father_id) = father {
        let f = father_id as usize;
        for k in 0..NUM_BELIEF_DIMS {
            x[k] = 0.5 * (table.x[mother_i][k] + table.x[f][k]) + gaussian(rng, 0.2);
        }
        openness = 0.5 * (openness + table.openness[f]) + gaussian(rng, 0.05);
        conformity = 0.5 * (conformity + table.conformity[f]) + gaussian(rng, 0.05);
        assertiveness = 0.5 * (assertiveness + table.assertiveness[f]) + gaussian(rng, 0.05);
        sociality = 0.5 * (sociality + table.sociality[f]) + gaussian(rng, 0.05);
    } else {
        for k in 0..NUM_BELIEF_DIMS {
            x[k] = table.x[mother_i][k] + gaussian(rng, 0.2);
        }
        openness += gaussian(rng, 0.05);
        conformity += gaussian(rng, 0.05);
        assertiveness += gaussian(rng, 0.05);
        sociality += gaussian(rng, 0.05);
    }

    let lineage_id = table.lineage_id[mother_i];
    let template = AgentTemplate {
        region,
        age: 0,
        female: rng.random_bool(0.5),
        parent_a: mother,
        parent_b: father.unwrap_or(NONE_AGENT),
        lineage_id,
        primary_lang: table.primary_lang[mother_i],
        dialect: table.dialect[mother_i],
        fluency: 0.5,
        openness: openness.clamp(0.0, 1.0),
        conformity: conformity.clamp(0.0, 1.0),
        assertiveness: assertiveness.clamp(0.0, 1.0),
        sociality: sociality.clamp(0.0, 1.0),
        x,
        m_comm: table.m_comm[mother_i],
        m_susceptibility: table.m_susceptibility[mother_i],
        m_mobility: table.m_mobility[mother_i],
        wealth: 0.0,
        sector: table.sector[mother_i],
    };
    let child = table.add_agent(&template);
    table.connect(child, mother);

    let mother_neighbors: Vec<AgentId> = table.neighbors[mother_i]
        .iter()
        .copied()
        .filter(|&j| j != child && table.alive[j as usize])
        .collect();
    let mut candidates = mother_neighbors;
    {
        use rand::seq::SliceRandom;
        candidates.shuffle(rng);
    }
    for &n in candidates.iter().take(3) {
        table.connect(child, n);
    }

    Some(BirthEvent {
        region,
        child,
        mother,
        father: father.unwrap_or(NONE_AGENT),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn template(region: RegionId, age: u32, female: bool) -> AgentTemplate {
        AgentTemplate {
            region,
            age,
            female,
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
            m_susceptibility: 0.5,
            m_mobility: 0.5,
            wealth: 1.0,
            sector: 0,
        }
    }

    #[test]
    fn cohorts_partition_every_live_agent_exactly_once() {
        let mut table = AgentTable::new(2);
        for r in 0..2u32 {
            for age in [2, 20, 60, 95] {
                table.add_agent(&template(r, age, age % 40 == 0));
            }
        }
        let cohorts = build_cohorts(&table);
        let total: usize = cohorts.iter().map(|c| c.members.len()).sum();
        assert_eq!(total, table.live_count());
    }

    #[test]
    fn mortality_never_exceeds_cohort_size() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut table = AgentTable::new(1);
        for _ in 0..100 {
            table.add_agent(&template(0, 92, false));
        }
        let regions = vec![RegionEconomy::new(0.0, 0.0, 0.0, &mut rng)];
        let cohorts = build_cohorts(&table);
        let cfg = KernelConfig::default();
        let events = run_mortality(&cfg, &mut table, &regions, &cohorts, &mut rng);
        let deaths: u32 = events.iter().map(|e| e.deaths).sum();
        assert!(deaths <= 100);
        assert_eq!(table.live_count(), 100 - deaths as usize);
    }

    #[test]
    fn birth_inherits_blended_belief_and_connects_to_mother() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut table = AgentTable::new(1);
        let mother = table.add_agent(&template(0, 25, true));
        table.x[mother as usize] = [0.4, 0.4, 0.4, 0.4];
        table.refresh_belief(mother);
        let event = materialize_birth(&mut table, mother, 0, &mut rng).unwrap();
        assert!(table.neighbors[mother as usize].contains(&event.child));
        assert!(table.neighbors[event.child as usize].contains(&mother));
        assert_eq!(table.age[event.child as usize], 0);
    }
}
