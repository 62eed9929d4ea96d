//! Closed-form sample budget solver.
//!
//! Given a target leakage resolution ε and a confidence δ, these
//! functions choose the histogram sample count `u` (used for both
//! H(F|D=d) and H(F|D=d,S=s) estimation) and the number of outer data
//! draws `N_d`. Both are `const fn` so the CLI defaults are fixed at
//! compile time.

use crate::apx;

/// Number of outer data draws needed for resolution `epsilon` at
/// confidence `delta`, given `u_hist` histogram samples per draw.
///
/// Uses the estimator variance with a single secret draw per data
/// value; the logarithmic bias `log2(1 + 1/u)` is subtracted from ε
/// before the concentration bound is inverted.
pub const fn data_samples(epsilon: f64, delta: f64, u_hist: u64) -> u64 {
    let eps_part_log = apx::log2(1.0 + 1.0 / (u_hist as f64));
    let eps_part_sqrt = epsilon - eps_part_log;

    let l2_u = apx::log2(u_hist as f64);
    let sigma_div_n = (2.0 * (0.25 * (u_hist as f64)) + 2.0 * (l2_u * l2_u)) / (u_hist as f64);
    ((sigma_div_n * (-2.0 * apx::log(delta))) / (eps_part_sqrt * eps_part_sqrt)) as u64
}

/// Histogram sample count for resolution `epsilon` at confidence
/// `delta`, rounded to a multiple of the lane count.
///
/// Seeds `u` at `1/(2^{ε/3} − 1)` clipped to a `lanes` multiple, then
/// increases it by `lanes` as long as that strictly reduces the total
/// work `u · N_d(ε, δ, u)`.
pub const fn hist_samples(epsilon: f64, delta: f64, lanes: u64) -> u64 {
    let eps_part_log = epsilon / 3.0;
    let d_hist = 1.0 / (apx::pow(2.0, eps_part_log) - 1.0);
    let mut u_hist = d_hist as u64;
    u_hist /= lanes;
    if u_hist == 0 {
        u_hist = 1;
    }
    u_hist *= lanes;
    while u_hist * data_samples(epsilon, delta, u_hist)
        > (u_hist + lanes) * data_samples(epsilon, delta, u_hist + lanes)
    {
        u_hist += lanes;
    }
    u_hist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LANES;

    const EPS: f64 = 0.001;
    const DELTA: f64 = 0.00001;

    #[test]
    fn const_evaluable_defaults() {
        const U: u64 = hist_samples(EPS, DELTA, LANES as u64);
        const ND: u64 = data_samples(EPS, DELTA, U);
        assert!(U > 0);
        assert!(ND > 0);
    }

    #[test]
    fn hist_samples_is_lane_multiple() {
        let u = hist_samples(EPS, DELTA, LANES as u64);
        assert_eq!(u % LANES as u64, 0);
    }

    #[test]
    fn chosen_budget_is_local_minimum() {
        let w = LANES as u64;
        let u = hist_samples(EPS, DELTA, w);
        let cost = |u: u64| u * data_samples(EPS, DELTA, u);
        assert!(cost(u) <= cost(u + w));
        if u > w {
            assert!(cost(u) <= cost(u - w));
        }
    }

    #[test]
    fn tighter_epsilon_needs_more_data() {
        let u = hist_samples(0.01, DELTA, 64);
        let loose = data_samples(0.01, DELTA, u);
        let u2 = hist_samples(0.005, DELTA, 64);
        let tight = data_samples(0.005, DELTA, u2);
        assert!(tight > loose);
    }
}
