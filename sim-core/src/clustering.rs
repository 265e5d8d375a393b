//! Online k-means clustering in 4-D belief space (§4.6), used to detect
//! cultures and seed political movements.

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::agent::AgentTable;
use crate::types::{AgentId, NUM_BELIEF_DIMS};

#[derive(Debug, Clone)]
pub struct ClusterState {
    pub centroids: Vec<[f64; NUM_BELIEF_DIMS]>,
    pub assignment: Vec<u32>,
    pub learning_rate: f64,
}

#[derive(Debug, Clone)]
pub struct ClusterSummary {
    pub cluster_id: u32,
    pub size: usize,
    pub centroid: [f64; NUM_BELIEF_DIMS],
    pub coherence: f64,
    pub charisma_density: f64,
}

fn sq_dist(a: &[f64; NUM_BELIEF_DIMS], b: &[f64; NUM_BELIEF_DIMS]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest_centroid(centroids: &[[f64; NUM_BELIEF_DIMS]], point: &[f64; NUM_BELIEF_DIMS]) -> u32 {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| sq_dist(a, point).partial_cmp(&sq_dist(b, point)).unwrap())
        .map(|(i, _)| i as u32)
        .unwrap_or(0)
}

impl ClusterState {
    /// Seed `k` centroids at random live agents' beliefs.
    pub fn new(k: u32, learning_rate: f64, table: &AgentTable, rng: &mut impl Rng) -> Self {
        let live: Vec<AgentId> = (0..table.len() as AgentId)
            .filter(|&id| table.alive[id as usize])
            .collect();
        let mut centroids = Vec::with_capacity(k as usize);
        for _ in 0..k {
            let seed = live.choose(rng).copied();
            centroids.push(match seed {
                Some(id) => table.b[id as usize],
                None => [0.0; NUM_BELIEF_DIMS],
            });
        }
        ClusterState {
            centroids,
            assignment: vec![0; table.len()],
            learning_rate,
        }
    }

    /// Remap assignments after a `compact()` call, matching
    /// `CompactionRemap::old_to_new`.
    pub fn remap(&mut self, old_to_new: &[Option<AgentId>], new_len: usize) {
        let mut new_assignment = vec![0u32; new_len];
        for (old_id, mapped) in old_to_new.iter().enumerate() {
            if let Some(new_id) = mapped {
                new_assignment[*new_id as usize] = self.assignment[old_id];
            }
        }
        self.assignment = new_assignment;
    }

    /// Grow the assignment vector to match newly-added agents (births).
    pub fn grow(&mut self, table: &AgentTable) {
        if self.assignment.len() < table.len() {
            self.assignment.resize(table.len(), 0);
        }
    }

    /// Per-agent incremental update: assign to nearest centroid, nudge that
    /// centroid toward the agent's belief by `learning_rate`.
    pub fn update_incremental(&mut self, table: &AgentTable) {
        self.grow(table);
        for i in 0..table.len() {
            if !table.alive[i] {
                continue;
            }
            let c = nearest_centroid(&self.centroids, &table.b[i]);
            self.assignment[i] = c;
            for k in 0..NUM_BELIEF_DIMS {
                self.centroids[c as usize][k] +=
                    self.learning_rate * (table.b[i][k] - self.centroids[c as usize][k]);
            }
        }
    }

    /// Full reassignment pass: every live agent is matched to its nearest
    /// centroid in one read-only pass; empty clusters are re-seeded to a
    /// random live agent.
    pub fn reassign_all(&mut self, table: &AgentTable, rng: &mut impl Rng) {
        self.grow(table);
        let mut sizes = vec![0u32; self.centroids.len()];
        for i in 0..table.len() {
            if !table.alive[i] {
                continue;
            }
            let c = nearest_centroid(&self.centroids, &table.b[i]);
            self.assignment[i] = c;
            sizes[c as usize] += 1;
        }

        let live: Vec<AgentId> = (0..table.len() as AgentId)
            .filter(|&id| table.alive[id as usize])
            .collect();
        for (c, &size) in sizes.iter().enumerate() {
            if size == 0 {
                if let Some(&seed) = live.choose(rng) {
                    self.centroids[c] = table.b[seed as usize];
                    self.assignment[seed as usize] = c as u32;
                }
            }
        }
    }

    pub fn summaries(&self, table: &AgentTable) -> Vec<ClusterSummary> {
        let k = self.centroids.len();
        let mut members: Vec<Vec<AgentId>> = vec![Vec::new(); k];
        for i in 0..table.len() {
            if table.alive[i] {
                members[self.assignment[i] as usize].push(i as AgentId);
            }
        }
        members
            .into_iter()
            .enumerate()
            .map(|(c, ids)| {
                let size = ids.len();
                let coherence = if size > 1 {
                    let mut sum = 0.0;
                    let mut pairs = 0u64;
                    for a in 0..ids.len() {
                        for b in (a + 1)..ids.len() {
                            let bi = table.b[ids[a] as usize];
                            let bj = table.b[ids[b] as usize];
                            let dot: f64 = bi.iter().zip(bj.iter()).map(|(x, y)| x * y).sum();
                            let ni = bi.iter().map(|v| v * v).sum::<f64>().sqrt().max(1e-9);
                            let nj = bj.iter().map(|v| v * v).sum::<f64>().sqrt().max(1e-9);
                            sum += 0.5 * (1.0 + dot / (ni * nj));
                            pairs += 1;
                        }
                    }
                    if pairs > 0 { sum / pairs as f64 } else { 0.0 }
                } else {
                    1.0
                };
                let charisma_density = if size > 0 {
                    ids.iter()
                        .filter(|&&id| table.assertiveness[id as usize] > 0.7)
                        .count() as f64
                        / size as f64
                } else {
                    0.0
                };
                ClusterSummary {
                    cluster_id: c as u32,
                    size,
                    centroid: self.centroids[c],
                    coherence,
                    charisma_density,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentTemplate;
    use crate::types::NONE_AGENT;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn template(x: [f64; 4]) -> AgentTemplate {
        AgentTemplate {
            region: 0,
            age: 30,
            female: false,
            parent_a: NONE_AGENT,
            parent_b: NONE_AGENT,
            lineage_id: 0,
            primary_lang: 0,
            dialect: 0,
            fluency: 1.0,
            openness: 0.5,
            conformity: 0.5,
            assertiveness: 0.9,
            sociality: 0.5,
            x,
            m_comm: 0.5,
            m_susceptibility: 0.5,
            m_mobility: 0.5,
            wealth: 1.0,
            sector: 0,
        }
    }

    #[test]
    fn every_live_agent_is_assigned_exactly_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut table = AgentTable::new(1);
        for i in 0..40 {
            table.add_agent(&template([i as f64 * 0.05 - 1.0, 0.0, 0.0, 0.0]));
        }
        let mut clusters = ClusterState::new(4, 0.1, &table, &mut rng);
        clusters.reassign_all(&table, &mut rng);
        let summaries = clusters.summaries(&table);
        let total: usize = summaries.iter().map(|s| s.size).sum();
        assert_eq!(total, table.live_count());
        for i in 0..table.len() {
            assert!(clusters.assignment[i] < 4);
        }
    }

    #[test]
    fn remap_follows_compaction() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut table = AgentTable::new(1);
        let a = table.add_agent(&template([0.1, 0.0, 0.0, 0.0]));
        let b = table.add_agent(&template([-0.1, 0.0, 0.0, 0.0]));
        let mut clusters = ClusterState::new(2, 0.1, &table, &mut rng);
        clusters.update_incremental(&table);
        clusters.assignment[a as usize] = 1;
        clusters.assignment[b as usize] = 0;
        table.mark_dead(a);
        let remap = table.compact();
        clusters.remap(&remap.old_to_new, remap.new_len);
        let new_b = remap.old_to_new[b as usize].unwrap();
        assert_eq!(clusters.assignment[new_b as usize], 0);
    }
}
