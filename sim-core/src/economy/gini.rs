//! True Gini coefficient over sorted wealth, computed in O(n log n). Never
//! derived from the economic-system tag.

/// Gini coefficient of a wealth distribution. Returns 0.0 for fewer than two
/// values or when total wealth is zero (perfectly equal by convention).
pub fn gini(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len() as f64;
    let total: f64 = sorted.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let weighted_sum: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64 + 1.0) * v)
        .sum();
    ((2.0 * weighted_sum) / (n * total) - (n + 1.0) / n).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfectly_equal_wealth_has_zero_gini() {
        let v = vec![10.0; 20];
        assert!(gini(&v) < 1e-9);
    }

    #[test]
    fn fully_concentrated_wealth_approaches_one() {
        let mut v = vec![0.0; 99];
        v.push(990.0);
        assert!(gini(&v) > 0.9);
    }

    #[test]
    fn gini_is_bounded() {
        let v = vec![5.0, 1.0, 100.0, 0.0, 42.0, 7.0];
        let g = gini(&v);
        assert!((0.0..=1.0).contains(&g));
    }
}
