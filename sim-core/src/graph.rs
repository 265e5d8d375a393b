//! Watts-Strogatz small-world graph construction (§4.1).
//!
//! Builds a ring lattice with `k` nearest connections on each side, then
//! independently rewires each edge with probability `p` to a uniformly
//! chosen non-self, non-duplicate target. Lists are de-duplicated and
//! self-loops removed after construction.

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::agent::AgentTable;
use crate::types::AgentId;

/// Build the initial small-world graph over all currently-alive agents in
/// `table`, connecting `k` nearest ring neighbors on each side before
/// rewiring with probability `p`.
pub fn build_watts_strogatz<R: Rng>(table: &mut AgentTable, k: u32, p: f64, rng: &mut R) {
    let ids: Vec<AgentId> = (0..table.len() as AgentId)
        .filter(|&id| table.alive[id as usize])
        .collect();
    let n = ids.len();
    if n < 2 {
        return;
    }
    let k = (k as usize).min(n - 1).max(1);

    // Ring lattice: connect each node to its k nearest neighbors on each side.
    for (pos, &id) in ids.iter().enumerate() {
        for step in 1..=k {
            let other = ids[(pos + step) % n];
            table.connect(id, other);
        }
    }

    // Rewiring: for each original ring edge (pos, pos+step), with probability
    // p replace the forward endpoint with a uniformly chosen non-self,
    // non-duplicate target.
    for (pos, &id) in ids.iter().enumerate() {
        for step in 1..=k {
            if rng.random::<f64>() >= p {
                continue;
            }
            let old_target = ids[(pos + step) % n];
            if let Some(&new_target) = ids.choose(rng) {
                if new_target != id && !table.neighbors[id as usize].contains(&new_target) {
                    table.disconnect(id, old_target);
                    table.connect(id, new_target);
                }
            }
        }
    }

    // De-duplicate and drop self-loops (connect()/disconnect() already avoid
    // both in the common path, but defensively normalize once more).
    for &id in &ids {
        let i = id as usize;
        table.neighbors[i].retain(|&j| j != id);
        table.neighbors[i].sort_unstable();
        table.neighbors[i].dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentTemplate;
    use crate::types::NONE_AGENT;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn template(region: u32) -> AgentTemplate {
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
    fn graph_is_symmetric_and_loopless() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut table = AgentTable::new(1);
        for _ in 0..50 {
            table.add_agent(&template(0));
        }
        build_watts_strogatz(&mut table, 4, 0.1, &mut rng);

        for id in 0..table.len() as AgentId {
            assert!(!table.neighbors[id as usize].contains(&id));
            for &j in &table.neighbors[id as usize].clone() {
                assert!(
                    table.neighbors[j as usize].contains(&id),
                    "edge {id}->{j} not symmetric"
                );
            }
        }
    }

    #[test]
    fn every_agent_has_neighbors() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut table = AgentTable::new(1);
        for _ in 0..30 {
            table.add_agent(&template(0));
        }
        build_watts_strogatz(&mut table, 3, 0.05, &mut rng);
        for id in 0..table.len() {
            assert!(!table.neighbors[id].is_empty());
        }
    }
}
