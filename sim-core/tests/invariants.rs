//! Quantified invariants that must hold at every tick, regardless of the
//! specific scenario configuration.

use sim_core::{EconomicSystem, Kernel, KernelConfig};

fn small_kernel(seed: u64) -> Kernel {
    let cfg = KernelConfig::default()
        .with_population(300)
        .with_regions(6)
        .with_graph(4, 0.05)
        .with_seed(seed);
    Kernel::new(cfg).unwrap()
}

#[test]
fn invariant_beliefs_stay_bounded_and_finite_across_ticks() {
    let mut kernel = small_kernel(1);
    for _ in 0..40 {
        kernel.step().unwrap();
        for i in 0..kernel.table().len() {
            if !kernel.table().alive[i] {
                continue;
            }
            for k in 0..sim_core::NUM_BELIEF_DIMS {
                let v = kernel.table().b[i][k];
                assert!(v.is_finite(), "belief {i}/{k} is not finite: {v}");
                assert!((-1.0..=1.0).contains(&v), "belief {i}/{k} out of range: {v}");
            }
        }
    }
}

#[test]
fn invariant_region_population_matches_region_index() {
    let mut kernel = small_kernel(2);
    kernel.run(25).unwrap();
    for r in 0..kernel.config().regions {
        let indexed = kernel.table().region_index(r).len();
        let counted = (0..kernel.table().len())
            .filter(|&i| kernel.table().alive[i] && kernel.table().region[i] == r)
            .count();
        assert_eq!(indexed, counted, "region {r} index disagrees with a direct scan");
    }
}

#[test]
fn invariant_neighbor_graph_stays_symmetric() {
    let mut kernel = small_kernel(3);
    for _ in 0..15 {
        kernel.step().unwrap();
        let table = kernel.table();
        for i in 0..table.len() {
            for &j in &table.neighbors[i] {
                assert!(
                    table.neighbors[j as usize].contains(&(i as u32)),
                    "edge {i}->{j} is not symmetric"
                );
            }
        }
    }
}

#[test]
fn invariant_prices_and_hardship_stay_in_bounds() {
    let mut kernel = small_kernel(4);
    kernel.run(60).unwrap();
    for region in kernel.regions() {
        for p in region.prices {
            assert!(p > 0.0 && p <= 100.0 && p.is_finite());
        }
        assert!(region.hardship >= 0.0 && region.hardship <= 1.0);
        assert!(region.inequality >= 0.0 && region.inequality <= 1.0);
    }
}

#[test]
fn invariant_population_conserved_when_demography_disabled() {
    let cfg = KernelConfig::default()
        .with_population(1_000)
        .with_regions(5)
        .with_demography_enabled(false)
        .with_seed(7);
    let mut kernel = Kernel::new(cfg).unwrap();
    let before = kernel.table().live_count();
    kernel.run(1_000).unwrap();
    assert_eq!(kernel.table().live_count(), before);
    assert_eq!(kernel.table().live_count(), 1_000);
}

#[test]
fn invariant_determinism_two_kernels_same_seed_match() {
    let cfg = KernelConfig::default()
        .with_population(200)
        .with_regions(4)
        .with_mean_field(true)
        .with_worker_count(1)
        .with_seed(12345);
    let mut a = Kernel::new(cfg.clone()).unwrap();
    let mut b = Kernel::new(cfg).unwrap();
    a.run(10).unwrap();
    b.run(10).unwrap();
    for i in 0..a.table().len() {
        assert_eq!(a.table().b[i], b.table().b[i], "agent {i} beliefs diverged");
    }
}

#[test]
fn invariant_every_economic_system_variant_has_coefficients() {
    for system in EconomicSystem::ALL {
        let c = system.coefficients();
        assert!(c.inertia > 0.0 && c.inertia <= 1.0);
    }
}
