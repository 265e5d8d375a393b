//! The belief engine: per-tick opinion update over the neighbor graph, or its
//! mean-field approximation (§4.2). This is the hot inner loop, and the only
//! place accuracy/performance tradeoffs (rational tanh approximation,
//! data-parallel delta pass) are explicitly sanctioned by the spec.

use rayon::prelude::*;

use crate::agent::AgentTable;
use crate::config::KernelConfig;
use crate::economy::RegionEconomy;
use crate::rng::{gaussian, worker_rng};
use crate::types::{AgentId, NUM_BELIEF_DIMS, RegionId};

/// Fast rational approximation of tanh, accurate to within ~1e-3 on [-3, 3]
/// and monotone everywhere; the caller still clamps the result.
pub fn fast_tanh(v: f64) -> f64 {
    let v2 = v * v;
    (v * (27.0 + v2) / (27.0 + 9.0 * v2)).clamp(-1.0, 1.0)
}

fn cosine_similarity(a: &[f64; NUM_BELIEF_DIMS], an2: f64, b: &[f64; NUM_BELIEF_DIMS], bn2: f64) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let denom = (an2.sqrt() * bn2.sqrt()).max(1e-9);
    (dot / denom).clamp(-1.0, 1.0)
}

/// Anchoring resistance: `base + age/age_max * age_weight + assertiveness * assert_weight`, capped.
fn anchoring(cfg: &KernelConfig, age: u32, assertiveness: f64) -> f64 {
    let age_term = (age as f64 / cfg.max_age_years.max(1) as f64) * cfg.anchoring_age_weight;
    let assert_term = assertiveness * cfg.anchoring_assert_weight;
    (cfg.anchoring_base + age_term + assert_term).min(cfg.anchoring_max)
}

/// Per-agent computed delta for the write phase, kept in a disjoint buffer so
/// that reads during the compute phase never observe a partially-updated
/// neighbor (the two-phase split mandated by §4.2/§9).
struct Delta {
    dx: [f64; NUM_BELIEF_DIMS],
}

fn compute_region_centroids(table: &AgentTable, num_regions: u32) -> Vec<[f64; NUM_BELIEF_DIMS]> {
    let mut sums = vec![[0.0f64; NUM_BELIEF_DIMS]; num_regions as usize];
    let mut counts = vec![0u32; num_regions as usize];
    for id in 0..table.len() {
        if !table.alive[id] {
            continue;
        }
        let r = table.region[id] as usize;
        for k in 0..NUM_BELIEF_DIMS {
            sums[r][k] += table.b[id][k];
        }
        counts[r] += 1;
    }
    for r in 0..sums.len() {
        if counts[r] > 0 {
            for k in 0..NUM_BELIEF_DIMS {
                sums[r][k] /= counts[r] as f64;
            }
        }
    }
    sums
}

/// Run one belief-update tick: compute all deltas in a read-only parallel
/// pass, then apply them (and innovation noise, and the tanh clamp) in a
/// second pass. `update_beliefs` never writes `x`/`b` during the compute
/// phase.
pub fn update_beliefs(
    cfg: &KernelConfig,
    table: &mut AgentTable,
    econ: &[RegionEconomy],
    tick: u64,
) {
    let n = table.len();
    if n == 0 {
        return;
    }

    let deltas: Vec<Delta> = if cfg.use_mean_field {
        let centroids = compute_region_centroids(table, table.num_regions());
        (0..n)
            .into_par_iter()
            .map(|i| {
                if !table.alive[i] {
                    return Delta { dx: [0.0; NUM_BELIEF_DIMS] };
                }
                let r = table.region[i] as usize;
                let anchor = anchoring(cfg, table.age[i], table.assertiveness[i]);
                let w = cfg.step_size * table.m_susceptibility[i] * cfg.field_strength * (1.0 - anchor);
                let mut dx = [0.0; NUM_BELIEF_DIMS];
                for k in 0..NUM_BELIEF_DIMS {
                    dx[k] = w * fast_tanh(centroids[r][k] - table.b[i][k]);
                }
                Delta { dx }
            })
            .collect()
    } else {
        (0..n)
            .into_par_iter()
            .map(|i| {
                if !table.alive[i] {
                    return Delta { dx: [0.0; NUM_BELIEF_DIMS] };
                }
                let anchor = anchoring(cfg, table.age[i], table.assertiveness[i]);
                let mut dx = [0.0; NUM_BELIEF_DIMS];
                for &j in &table.neighbors[i] {
                    let j = j as usize;
                    if !table.alive[j] {
                        continue;
                    }
                    let sim = (0.5 * (1.0 + cosine_similarity(
                        &table.b[i],
                        table.b_norm_sq[i],
                        &table.b[j],
                        table.b_norm_sq[j],
                    )))
                    .max(cfg.sim_floor);
                    let lang_q = if table.primary_lang[i] == table.primary_lang[j] {
                        table.fluency[i].min(table.fluency[j])
                    } else {
                        0.25 * table.fluency[i].min(table.fluency[j])
                    };
                    let w = cfg.step_size
                        * sim
                        * lang_q
                        * 0.5
                        * (table.m_comm[i] + table.m_comm[j])
                        * table.m_susceptibility[i]
                        * (1.0 - anchor);
                    for k in 0..NUM_BELIEF_DIMS {
                        dx[k] += w * fast_tanh(table.b[j][k] - table.b[i][k]);
                    }
                }
                Delta { dx }
            })
            .collect()
    };

    let regional_mean_wealth = mean_wealth_by_region(table, table.num_regions());

    // Write phase: apply deltas, innovation noise, economic feedback, then
    // recompute B = tanh(x).
    let worker_count = cfg.worker_count.max(1);
    let chunk = n.div_ceil(worker_count).max(1);
    let seed = cfg.seed;
    let noise_std = cfg.innovation_noise_std;
    let alive = table.alive.clone();

    table
        .x
        .par_chunks_mut(chunk)
        .enumerate()
        .for_each(|(worker_id, xs)| {
            let mut rng = worker_rng(seed, worker_id as u64, tick);
            let base = worker_id * chunk;
            for (offset, x) in xs.iter_mut().enumerate() {
                let i = base + offset;
                if !alive[i] {
                    continue;
                }
                for k in 0..NUM_BELIEF_DIMS {
                    let noise = gaussian(&mut rng, 0.0, noise_std);
                    x[k] += deltas[i].dx[k] + noise;
                }
            }
        });

    for i in 0..n {
        if !table.alive[i] {
            continue;
        }
        let r = table.region[i] as usize;
        let hardship = table.hardship[i];
        if hardship > 0.5 {
            table.x[i][0] -= 0.001 * hardship;
            table.x[i][2] -= 0.001 * hardship;
        }
        let mean_wealth = regional_mean_wealth[r];
        if mean_wealth > 0.0 && table.wealth[i] > 1.5 * mean_wealth {
            let rel_wealth = table.wealth[i] / mean_wealth - 1.0;
            let shift = (1.0 - table.openness[i]) * 0.5 * (1.0 + rel_wealth).ln() * 0.001;
            table.x[i][0] += shift;
            table.x[i][2] += shift;
        }
        table.refresh_belief(i as AgentId);
        debug_assert!(table.b[i].iter().all(|v| v.is_finite()));
    }

    let _ = econ;
}

fn mean_wealth_by_region(table: &AgentTable, num_regions: u32) -> Vec<f64> {
    let mut sums = vec![0.0f64; num_regions as usize];
    let mut counts = vec![0u32; num_regions as usize];
    for i in 0..table.len() {
        if !table.alive[i] {
            continue;
        }
        let r = table.region[i] as usize;
        sums[r] += table.wealth[i];
        counts[r] += 1;
    }
    for r in 0..sums.len() {
        if counts[r] > 0 {
            sums[r] /= counts[r] as f64;
        }
    }
    sums
}

/// Region-scoped belief centroid, used by clustering/migration attractiveness
/// terms as well as the mean-field mode above.
pub fn region_belief_centroid(table: &AgentTable, region: RegionId) -> [f64; NUM_BELIEF_DIMS] {
    let mut sum = [0.0; NUM_BELIEF_DIMS];
    let mut count = 0u32;
    for &id in table.region_index(region) {
        if table.alive[id as usize] {
            for k in 0..NUM_BELIEF_DIMS {
                sum[k] += table.b[id as usize][k];
            }
            count += 1;
        }
    }
    if count > 0 {
        for v in sum.iter_mut() {
            *v /= count as f64;
        }
    }
    sum
}
