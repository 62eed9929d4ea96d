//! Const-evaluable approximations of log, exp, pow and log2.
//!
//! The sample budget must be computable at configuration time (the CLI
//! defaults are compile-time constants), so these avoid `std::f64`
//! intrinsics in favor of series that `const fn` can evaluate.
//!
//! `log` uses the identity `ln x = 2·Σ y^(2k+1)/(2k+1)` with
//! `y = (x−1)/(x+1)`, after range reduction by the natural base;
//! `exp` halves the argument until it is at most one, sums the Taylor
//! series, then squares the result back up.

/// Euler's number.
pub const E: f64 = 2.718_281_828_459_045_235_360_287_471_352_662_497_757;

/// Natural logarithm of a positive argument.
pub const fn log(x: f64) -> f64 {
    assert!(x > 0.0);
    let mut x = x;
    let mut sign = 1.0;
    if x < 1.0 {
        sign = -1.0;
        x = 1.0 / x;
    }
    let mut n = 0u32;
    while x / E >= 1.0 {
        n += 1;
        x /= E;
    }
    let y = (x - 1.0) / (x + 1.0);

    let mut res = 0.0;
    let mut k = 0u32;
    let mut y_pow_k = 1.0;
    loop {
        let numerator = y_pow_k * y_pow_k * y;
        let denominator = (k + k + 1) as f64;
        let increase = numerator / denominator;
        if increase == 0.0 {
            break;
        }
        res += increase;
        k += 1;
        y_pow_k *= y;
    }

    sign * (n as f64 + 2.0 * res)
}

/// Exponential function.
pub const fn exp(x: f64) -> f64 {
    let negative = x < 0.0;
    let mut x = if negative { -x } else { x };
    let mut n = 0u32;
    while x > 1.0 {
        n += 1;
        x /= 2.0;
    }

    let mut res = 0.0;
    let mut k = 0u32;
    let mut numerator = 1.0;
    let mut denominator = 1.0;
    loop {
        let increase = numerator / denominator;
        if increase == 0.0 {
            break;
        }
        res += increase;
        k += 1;
        denominator *= k as f64;
        numerator *= x;
    }

    let mut i = 0u32;
    while i < n {
        res *= res;
        i += 1;
    }
    if negative {
        1.0 / res
    } else {
        res
    }
}

/// `base` raised to an arbitrary real exponent, for positive `base`.
pub const fn pow(base: f64, x: f64) -> f64 {
    assert!(base > 0.0);
    exp(x * log(base))
}

/// Base-2 logarithm.
pub const fn log2(x: f64) -> f64 {
    log(x) / log(2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12 * b.abs().max(1.0)
    }

    #[test]
    fn log_matches_std() {
        for x in [0.001, 0.5, 1.0, 2.0, std::f64::consts::E, 10.0, 1e6] {
            assert!(close(log(x), x.ln()), "log({x})");
        }
    }

    #[test]
    fn exp_matches_std() {
        for x in [-10.0, -1.0, 0.0, 0.5, 1.0, 3.0, 20.0] {
            assert!(close(exp(x), x.exp()), "exp({x})");
        }
    }

    #[test]
    fn pow_matches_std() {
        for (b, x) in [(2.0, 0.001), (2.0, 10.0), (10.0, -3.0), (1.5, 2.5)] {
            assert!(close(pow(b, x), b.powf(x)), "pow({b}, {x})");
        }
    }

    #[test]
    fn log2_matches_std() {
        for x in [0.25, 1.0, 2.0, 1024.0, 3.0] {
            assert!(close(log2(x), x.log2()), "log2({x})");
        }
    }

    #[test]
    fn const_evaluable() {
        const L: f64 = log(10.0);
        const X: f64 = exp(1.0);
        assert!(L > 2.302 && L < 2.303);
        assert!(X > 2.718 && X < 2.719);
    }
}
