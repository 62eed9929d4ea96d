//! Error bars and the suspicious-slot report.

use std::io::Write;

use veil_sim::RunProgram;

use crate::error::MiError;
use crate::options::MiConfig;

/// The three error components of the plug-in estimator.
#[derive(Clone, Copy, Debug)]
pub struct ErrorBars {
    /// Upward logarithmic bias bound, `log2(1 + 1/N_fd)`.
    pub err_log_up: f64,
    /// Downward logarithmic bias bound, `log2(1 + 1/N_fds)`.
    pub err_log_down: f64,
    /// Concentration term, `sqrt(2 σ² ln(1/δ))`.
    pub err_sqrt: f64,
}

impl ErrorBars {
    /// Margin added above the estimate.
    pub fn up_add(&self) -> f64 {
        self.err_log_up + self.err_sqrt
    }

    /// Margin subtracted below the estimate. A slot is suspicious
    /// when its estimate exceeds this.
    pub fn down_sub(&self) -> f64 {
        self.err_log_down + self.err_sqrt
    }
}

/// Computes the estimator's error components.
///
/// The variance combines the outer averaging over `nd` data draws,
/// the inner averaging over `ns` secret draws, and the histogram
/// noise of both entropy estimates:
///
/// ```text
/// σ² = 1/(4 N_d) + (log2 N_fd)²/(N_d N_fd)
///    + (log2 N_fds)²/(N_d N_s N_fds) + 1/(4 N_d N_s)
/// ```
pub fn compute_errors(nd: u64, ns: u64, nfd: u64, nfds: u64, delta: f64) -> ErrorBars {
    let nd = nd as f64;
    let ns = ns as f64;
    let nfd = nfd as f64;
    let nfds = nfds as f64;

    let sigma_2_t1 = 1.0 / (4.0 * nd);
    let log2_fd = nfd.log2();
    let sigma_2_t2 = (log2_fd * log2_fd) / (nd * nfd);
    let log2_fds = nfds.log2();
    let sigma_2_t3 = (log2_fds * log2_fds) / (nd * ns * nfds);
    let sigma_2_t4 = 1.0 / (4.0 * nd * ns);

    let sigma_2 = (sigma_2_t1 + sigma_2_t4) + (sigma_2_t2 + sigma_2_t3);

    ErrorBars {
        err_log_up: (1.0 + 1.0 / nfd).log2(),
        err_log_down: (1.0 + 1.0 / nfds).log2(),
        err_sqrt: (2.0 * sigma_2 * (-delta.ln())).sqrt(),
    }
}

/// How much of the ranking a report shows.
#[derive(Clone, Copy, Debug)]
pub enum ReportDepth {
    /// Only the `n` highest suspicious slots.
    Top(u32),
    /// Every suspicious slot.
    All,
}

fn show_info<W: Write>(
    out: &mut W,
    color: bool,
    mi: f64,
    n: u64,
    down_sub: f64,
    name: &str,
) -> std::io::Result<()> {
    if color {
        write!(out, "\x1b[1m\x1b[31m")?;
    }
    write!(out, "{mi:19.16} (N={n}) (DS={down_sub:19.16})")?;
    if color {
        write!(out, "\x1b[0m")?;
    }
    writeln!(out, " {name} ")
}

/// Writes the suspicious-slot report and returns whether the
/// early-stop rule fired.
///
/// `sums` holds the aggregated per-slot MI sums over `num_runs`
/// completed outer runs. Slots labelled as unmasked secrets are
/// excluded from the ranking — they leak by construction. With
/// early stopping enabled, a maximal estimate above ten times the
/// subtractive bound reports true and the caller raises the stop
/// flag.
pub(crate) fn report<W: Write>(
    out: &mut W,
    color: bool,
    cfg: &MiConfig,
    program: &RunProgram,
    sums: &[f64],
    num_runs: u64,
    depth: ReportDepth,
) -> Result<bool, MiError> {
    if let ReportDepth::Top(0) = depth {
        return Ok(false);
    }
    if num_runs == 0 {
        writeln!(out, "no completed runs yet")?;
        return Ok(false);
    }

    let bars = compute_errors(
        num_runs,
        cfg.num_secrets,
        cfg.num_samples_f_given_d,
        cfg.num_samples_f_given_ds,
        cfg.delta,
    );
    let down_sub = bars.down_sub();

    let final_bars = compute_errors(
        cfg.num_data,
        cfg.num_secrets,
        cfg.num_samples_f_given_d,
        cfg.num_samples_f_given_ds,
        cfg.delta,
    );

    writeln!(out, "N:        {num_runs}")?;
    writeln!(out, "log_up:   {:19.16}", bars.err_log_up)?;
    writeln!(out, "log_down: {:19.16}", bars.err_log_down)?;
    writeln!(out, "sqrt:     {:19.16}", bars.err_sqrt)?;
    writeln!(out, "up_add:   {:19.16}", bars.up_add())?;
    writeln!(out, "down_sub: {:19.16}", down_sub)?;
    writeln!(out, "final sqrt:     {:19.16}", final_bars.err_sqrt)?;
    writeln!(out, "final up_add:   {:19.16}", final_bars.up_add())?;
    writeln!(out, "final down_sub: {:19.16}", final_bars.down_sub())?;

    let mut max_mi = -2.0f64;
    let mut best: Vec<(f64, usize)> = Vec::new();
    let mut num_suspicious = 0u32;

    for (pos, &sum) in sums.iter().enumerate() {
        let info = &program.debug_info()[pos];
        if info.contains("unmasked") && info.contains("secret") {
            continue;
        }
        let mi = sum / num_runs as f64;
        if mi > max_mi {
            max_mi = mi;
        }
        if mi - down_sub <= 0.0 {
            continue;
        }
        num_suspicious += 1;
        match depth {
            ReportDepth::Top(k) => {
                best.push((mi, pos));
                best.sort_by(|a, b| b.0.total_cmp(&a.0));
                best.truncate(k as usize);
            }
            ReportDepth::All => {
                show_info(out, color, mi, num_runs, down_sub, info)?;
            }
        }
    }

    match depth {
        ReportDepth::Top(_) if num_suspicious != 0 => {
            writeln!(out, "Best MI:")?;
            for (mi, pos) in &best {
                show_info(out, color, *mi, num_runs, down_sub, &program.debug_info()[*pos])?;
            }
        }
        _ => {
            writeln!(out, "max_mi:   {max_mi:19.16}")?;
        }
    }

    let stop = cfg.early_stop && max_mi > 10.0 * down_sub;
    if stop {
        if color {
            write!(out, "\x1b[1m\x1b[31m")?;
        }
        write!(out, "Max MI substantially exceeds threshold, stopping ...")?;
        if color {
            write!(out, "\x1b[0m")?;
        }
    }
    writeln!(out)?;
    out.flush()?;
    Ok(stop)
}
