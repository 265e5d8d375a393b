//! The agent table: a structure-of-arrays store for every agent field in
//! §3, plus the small-world neighbor graph and per-region index.
//!
//! The table uniquely owns all agents. Neighbor lists, parent links, and the
//! per-region index all refer to agents by `AgentId` (a plain index into the
//! parallel field vectors) rather than by any owning pointer — there is no
//! cyclic ownership.

use rand::Rng;

use crate::types::{AgentId, NONE_AGENT, NUM_BELIEF_DIMS, RegionId, Sector};

/// Template used to materialize a new agent, at init or at birth.
#[derive(Debug, Clone)]
pub struct AgentTemplate {
    pub region: RegionId,
    pub age: u32,
    pub female: bool,
    pub parent_a: AgentId,
    pub parent_b: AgentId,
    pub lineage_id: u32,
    pub primary_lang: u8,
    pub dialect: u8,
    pub fluency: f64,
    pub openness: f64,
    pub conformity: f64,
    pub assertiveness: f64,
    pub sociality: f64,
    pub x: [f64; NUM_BELIEF_DIMS],
    pub m_comm: f64,
    pub m_susceptibility: f64,
    pub m_mobility: f64,
    pub wealth: f64,
    pub sector: Sector,
}

fn tanh_clamped(v: f64) -> f64 {
    v.tanh().clamp(-1.0, 1.0)
}

/// Structure-of-arrays agent table. Index `i` into every vector refers to the
/// same agent; `alive[i] == false` marks a dead agent retained until
/// `compact()` physically removes it.
#[derive(Debug, Clone)]
pub struct AgentTable {
    pub region: Vec<RegionId>,
    pub alive: Vec<bool>,
    pub age: Vec<u32>,
    pub female: Vec<bool>,
    pub parent_a: Vec<AgentId>,
    pub parent_b: Vec<AgentId>,
    pub lineage_id: Vec<u32>,
    pub primary_lang: Vec<u8>,
    pub dialect: Vec<u8>,
    pub fluency: Vec<f64>,
    pub openness: Vec<f64>,
    pub conformity: Vec<f64>,
    pub assertiveness: Vec<f64>,
    pub sociality: Vec<f64>,
    pub x: Vec<[f64; NUM_BELIEF_DIMS]>,
    pub b: Vec<[f64; NUM_BELIEF_DIMS]>,
    pub b_norm_sq: Vec<f64>,
    pub m_comm: Vec<f64>,
    pub m_susceptibility: Vec<f64>,
    pub m_mobility: Vec<f64>,
    pub wealth: Vec<f64>,
    pub income: Vec<f64>,
    pub productivity: Vec<f64>,
    pub hardship: Vec<f64>,
    pub sector: Vec<Sector>,
    pub neighbors: Vec<Vec<AgentId>>,

    /// Per-region list of live agent ids, maintained incrementally by
    /// `add_agent`/migration and rebuilt wholesale by `compact()`.
    region_index: Vec<Vec<AgentId>>,
    next_lineage_id: u32,
}

/// Describes how agent ids changed across a `compact()` call so that other
/// subsystems holding per-agent side tables (cluster assignments, etc.) can
/// remap themselves.
#[derive(Debug, Clone)]
pub struct CompactionRemap {
    /// `old_to_new[old_id as usize]` is `Some(new_id)` if the agent survived
    /// compaction, `None` if it was a dead agent that got dropped.
    pub old_to_new: Vec<Option<AgentId>>,
    pub new_len: usize,
}

impl AgentTable {
    pub fn new(num_regions: u32) -> Self {
        AgentTable {
            region: Vec::new(),
            alive: Vec::new(),
            age: Vec::new(),
            female: Vec::new(),
            parent_a: Vec::new(),
            parent_b: Vec::new(),
            lineage_id: Vec::new(),
            primary_lang: Vec::new(),
            dialect: Vec::new(),
            fluency: Vec::new(),
            openness: Vec::new(),
            conformity: Vec::new(),
            assertiveness: Vec::new(),
            sociality: Vec::new(),
            x: Vec::new(),
            b: Vec::new(),
            b_norm_sq: Vec::new(),
            m_comm: Vec::new(),
            m_susceptibility: Vec::new(),
            m_mobility: Vec::new(),
            wealth: Vec::new(),
            income: Vec::new(),
            productivity: Vec::new(),
            hardship: Vec::new(),
            sector: Vec::new(),
            neighbors: Vec::new(),
            region_index: vec![Vec::new(); num_regions as usize],
            next_lineage_id: 0,
        }
    }

    /// Total table length, including dead-but-not-yet-compacted agents.
    pub fn len(&self) -> usize {
        self.region.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    pub fn region_index(&self, r: RegionId) -> &[AgentId] {
        &self.region_index[r as usize]
    }

    /// Append an id to a region's index directly, bypassing `add_agent`.
    /// Used only by checkpoint loading, which pushes raw field vectors
    /// before the region index exists.
    pub fn rebuild_region_index_entry(&mut self, r: RegionId, id: AgentId) {
        self.region_index[r as usize].push(id);
    }

    pub fn num_regions(&self) -> u32 {
        self.region_index.len() as u32
    }

    pub fn fresh_lineage_id(&mut self) -> u32 {
        let id = self.next_lineage_id;
        self.next_lineage_id += 1;
        id
    }

    /// Append a new agent from a template, updating the region index.
    /// Returns the new agent's id.
    pub fn add_agent(&mut self, t: &AgentTemplate) -> AgentId {
        let id = self.len() as AgentId;
        self.region.push(t.region);
        self.alive.push(true);
        self.age.push(t.age);
        self.female.push(t.female);
        self.parent_a.push(t.parent_a);
        self.parent_b.push(t.parent_b);
        self.lineage_id.push(t.lineage_id);
        self.primary_lang.push(t.primary_lang);
        self.dialect.push(t.dialect);
        self.fluency.push(t.fluency.clamp(0.3, 1.0));
        self.openness.push(t.openness.clamp(0.0, 1.0));
        self.conformity.push(t.conformity.clamp(0.0, 1.0));
        self.assertiveness.push(t.assertiveness.clamp(0.0, 1.0));
        self.sociality.push(t.sociality.clamp(0.0, 1.0));
        self.x.push(t.x);
        let b: [f64; NUM_BELIEF_DIMS] = std::array::from_fn(|k| tanh_clamped(t.x[k]));
        let norm_sq = b.iter().map(|v| v * v).sum();
        self.b.push(b);
        self.b_norm_sq.push(norm_sq);
        self.m_comm.push(t.m_comm.clamp(0.0, 1.2));
        self.m_susceptibility.push(t.m_susceptibility.clamp(0.0, 1.2));
        self.m_mobility.push(t.m_mobility.clamp(0.0, 1.2));
        self.wealth.push(t.wealth.max(0.0));
        self.income.push(0.0);
        self.productivity.push(1.0);
        self.hardship.push(0.0);
        self.sector.push(t.sector);
        self.neighbors.push(Vec::new());
        self.region_index[t.region as usize].push(id);
        id
    }

    pub fn mark_dead(&mut self, id: AgentId) {
        self.alive[id as usize] = false;
    }

    /// Recompute `b[k] = tanh(x[k])` and the cached norm. Called after any
    /// write to `x`.
    pub fn refresh_belief(&mut self, id: AgentId) {
        let i = id as usize;
        let b: [f64; NUM_BELIEF_DIMS] = std::array::from_fn(|k| tanh_clamped(self.x[i][k]));
        self.b_norm_sq[i] = b.iter().map(|v| v * v).sum();
        self.b[i] = b;
    }

    /// Symmetric edge insert: adds `b` to `a`'s list and `a` to `b`'s list if
    /// not already present.
    pub fn connect(&mut self, a: AgentId, b: AgentId) {
        if a == b {
            return;
        }
        if !self.neighbors[a as usize].contains(&b) {
            self.neighbors[a as usize].push(b);
        }
        if !self.neighbors[b as usize].contains(&a) {
            self.neighbors[b as usize].push(a);
        }
    }

    /// Symmetric edge removal.
    pub fn disconnect(&mut self, a: AgentId, b: AgentId) {
        self.neighbors[a as usize].retain(|&x| x != b);
        self.neighbors[b as usize].retain(|&x| x != a);
    }

    /// Move an agent to a new region, updating the per-region index.
    pub fn relocate(&mut self, id: AgentId, new_region: RegionId) {
        let old_region = self.region[id as usize];
        if old_region == new_region {
            return;
        }
        self.region_index[old_region as usize].retain(|&x| x != id);
        self.region_index[new_region as usize].push(id);
        self.region[id as usize] = new_region;
    }

    /// Drop dead agents from every live agent's neighbor list, then
    /// physically remove dead agents from the table, remapping every index
    /// that refers to an agent id (neighbor lists, parent links, region
    /// index). Returns the old->new remap so sibling subsystems (clustering
    /// assignments) can follow along.
    pub fn compact(&mut self) -> CompactionRemap {
        let n = self.len();
        let alive = self.alive.clone();

        for nbrs in self.neighbors.iter_mut() {
            nbrs.retain(|&j| alive[j as usize]);
        }

        let mut old_to_new = vec![None; n];
        let mut new_len = 0u32;
        for i in 0..n {
            if alive[i] {
                old_to_new[i] = Some(new_len);
                new_len += 1;
            }
        }

        macro_rules! compact_vec {
            ($field:ident) => {{
                let mut out = Vec::with_capacity(new_len as usize);
                for i in 0..n {
                    if alive[i] {
                        out.push(self.$field[i].clone());
                    }
                }
                self.$field = out;
            }};
        }

        compact_vec!(region);
        compact_vec!(alive);
        compact_vec!(age);
        compact_vec!(female);
        compact_vec!(parent_a);
        compact_vec!(parent_b);
        compact_vec!(lineage_id);
        compact_vec!(primary_lang);
        compact_vec!(dialect);
        compact_vec!(fluency);
        compact_vec!(openness);
        compact_vec!(conformity);
        compact_vec!(assertiveness);
        compact_vec!(sociality);
        compact_vec!(x);
        compact_vec!(b);
        compact_vec!(b_norm_sq);
        compact_vec!(m_comm);
        compact_vec!(m_susceptibility);
        compact_vec!(m_mobility);
        compact_vec!(wealth);
        compact_vec!(income);
        compact_vec!(productivity);
        compact_vec!(hardship);
        compact_vec!(sector);
        compact_vec!(neighbors);

        for nbrs in self.neighbors.iter_mut() {
            for j in nbrs.iter_mut() {
                *j = old_to_new[*j as usize].expect("dead neighbors were pruned above");
            }
        }
        for pa in self.parent_a.iter_mut() {
            if *pa != NONE_AGENT {
                *pa = old_to_new[*pa as usize].unwrap_or(NONE_AGENT);
            }
        }
        for pb in self.parent_b.iter_mut() {
            if *pb != NONE_AGENT {
                *pb = old_to_new[*pb as usize].unwrap_or(NONE_AGENT);
            }
        }

        for region_list in self.region_index.iter_mut() {
            region_list.clear();
        }
        for (new_id, &r) in self.region.iter().enumerate() {
            self.region_index[r as usize].push(new_id as AgentId);
        }

        CompactionRemap {
            old_to_new,
            new_len: new_len as usize,
        }
    }

    /// Sample `count` distinct alive agent ids from the given region, if
    /// available (used by mortality/migration death/departure sampling).
    pub fn sample_region_agents<R: Rng>(
        &self,
        region: RegionId,
        count: usize,
        rng: &mut R,
    ) -> Vec<AgentId> {
        use rand::seq::SliceRandom;
        let mut pool: Vec<AgentId> = self.region_index[region as usize]
            .iter()
            .copied()
            .filter(|&id| self.alive[id as usize])
            .collect();
        pool.shuffle(rng);
        pool.truncate(count);
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(region: RegionId) -> AgentTemplate {
        AgentTemplate {
            region,
            age: 20,
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
            m_susceptibility: 0.5,
            m_mobility: 0.5,
            wealth: 1.0,
            sector: 0,
        }
    }

    #[test]
    fn add_agent_updates_region_index() {
        let mut t = AgentTable::new(2);
        let a = t.add_agent(&template(0));
        let b = t.add_agent(&template(1));
        assert_eq!(t.region_index(0), &[a]);
        assert_eq!(t.region_index(1), &[b]);
    }

    #[test]
    fn connect_is_symmetric() {
        let mut t = AgentTable::new(1);
        let a = t.add_agent(&template(0));
        let b = t.add_agent(&template(0));
        t.connect(a, b);
        assert!(t.neighbors[a as usize].contains(&b));
        assert!(t.neighbors[b as usize].contains(&a));
    }

    #[test]
    fn compact_drops_dead_and_remaps_neighbors() {
        let mut t = AgentTable::new(1);
        let a = t.add_agent(&template(0));
        let b = t.add_agent(&template(0));
        let c = t.add_agent(&template(0));
        t.connect(a, b);
        t.connect(b, c);
        t.mark_dead(b);

        let remap = t.compact();
        assert_eq!(remap.new_len, 2);
        assert_eq!(t.len(), 2);

        let new_a = remap.old_to_new[a as usize].unwrap();
        let new_c = remap.old_to_new[c as usize].unwrap();
        assert!(remap.old_to_new[b as usize].is_none());
        // b's edges to a and c are gone since b died.
        assert!(t.neighbors[new_a as usize].is_empty());
        assert!(t.neighbors[new_c as usize].is_empty());
    }

    #[test]
    fn belief_is_tanh_clamped() {
        let mut tmpl = template(0);
        tmpl.x = [10.0, -10.0, 0.0, 3.0];
        let mut t = AgentTable::new(1);
        let id = t.add_agent(&tmpl);
        for k in 0..4 {
            assert!(t.b[id as usize][k] >= -1.0 && t.b[id as usize][k] <= 1.0);
            assert!(t.b[id as usize][k].is_finite());
        }
    }
}
