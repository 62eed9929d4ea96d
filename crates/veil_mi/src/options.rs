//! Sampling configuration and its validation rules.

use std::path::PathBuf;

use log::warn;
use veil_common::budget::{data_samples, hist_samples};
use veil_common::LANES;

use crate::error::MiError;

/// Default target resolution ε.
pub const DEFAULT_EPSILON: f64 = 0.001;
/// Default confidence parameter δ (99.999% certainty).
pub const DEFAULT_DELTA: f64 = 0.00001;
/// Default histogram sample count, solved from (ε, δ) at compile time.
pub const DEFAULT_HIST_SAMPLES: u64 = hist_samples(DEFAULT_EPSILON, DEFAULT_DELTA, LANES as u64);
/// Default number of outer data draws, solved from (ε, δ) at compile
/// time.
pub const DEFAULT_NUM_DATA: u64 =
    data_samples(DEFAULT_EPSILON, DEFAULT_DELTA, DEFAULT_HIST_SAMPLES);

/// Raw option values as they arrive from the command line.
///
/// `None` means "not given"; [`MiConfig::resolve`] applies defaults,
/// the (ε, δ) sample plan, lane-multiple rounding and the file
/// collision rules.
#[derive(Clone, Debug, Default)]
pub struct RawOpts {
    /// `--cycles`.
    pub cycles: Option<u32>,
    /// `--epsilon`.
    pub epsilon: Option<f64>,
    /// `--delta`.
    pub delta: Option<f64>,
    /// `--early-stop`.
    pub early_stop: bool,
    /// `--no-early-stop`.
    pub no_early_stop: bool,
    /// `--num-samples-f-given-d`.
    pub num_samples_f_given_d: Option<u64>,
    /// `--num-samples-f-given-ds`.
    pub num_samples_f_given_ds: Option<u64>,
    /// `--num-secrets`.
    pub num_secrets: Option<u64>,
    /// `--num-data`.
    pub num_data: Option<u64>,
    /// `--num-samples`.
    pub num_samples: Option<u64>,
    /// `--num-threads`.
    pub num_threads: Option<u32>,
    /// `--timeout`, in seconds; 0 disables.
    pub timeout: Option<u32>,
    /// `--print-best`.
    pub print_best: Option<u32>,
    /// `--print-interval`, in seconds; 0 waits for completion.
    pub print_interval: Option<u32>,
    /// `--load-file`.
    pub load_file: Option<PathBuf>,
    /// `--store-file`.
    pub store_file: Option<PathBuf>,
    /// `--report-file`.
    pub report_file: Option<PathBuf>,
}

/// The fully resolved sampling configuration.
#[derive(Clone, Debug)]
pub struct MiConfig {
    /// Cycles to run per kernel invocation.
    pub cycles: u32,
    /// Confidence parameter δ.
    pub delta: f64,
    /// Whether the early-stopping rule is armed.
    pub early_stop: bool,
    /// Samples per H(F|D=d) histogram.
    pub num_samples_f_given_d: u64,
    /// Samples per H(F|D=d,S=s) histogram.
    pub num_samples_f_given_ds: u64,
    /// Secret draws averaged per data draw.
    pub num_secrets: u64,
    /// Outer data draws.
    pub num_data: u64,
    /// Total sample budget.
    pub num_samples: u64,
    /// Worker thread count.
    pub num_threads: u32,
    /// Wall-clock timeout in seconds; 0 disables.
    pub timeout: u32,
    /// How many top slots the periodic report shows.
    pub print_best: u32,
    /// Seconds between periodic reports; 0 waits for completion.
    pub print_interval: u32,
    /// Checkpoint to resume from.
    pub load_file: Option<PathBuf>,
    /// Checkpoint to write on completion.
    pub store_file: Option<PathBuf>,
    /// File receiving the final report instead of stdout.
    pub report_file: Option<PathBuf>,
}

fn round_up_to_lanes(name: &str, value: u64) -> u64 {
    let rem = value % LANES as u64;
    if rem != 0 {
        let rounded = value - rem + LANES as u64;
        warn!("overriding {name} from {value} to {rounded}");
        rounded
    } else {
        value
    }
}

impl MiConfig {
    /// Validates raw options against a program running
    /// `default_cycles` cycles.
    pub fn resolve(raw: RawOpts, default_cycles: u32) -> Result<MiConfig, MiError> {
        if raw.early_stop && raw.no_early_stop {
            return Err(MiError::Options("contradicting early-stop flags".into()));
        }
        let early_stop = !raw.no_early_stop;
        let delta = raw.delta.unwrap_or(DEFAULT_DELTA);
        let cycles = raw.cycles.unwrap_or(default_cycles);

        let num_samples_f_given_d;
        let num_samples_f_given_ds;
        let num_secrets;
        let num_data;
        let num_samples;

        if let Some(epsilon) = raw.epsilon {
            if epsilon <= 0.0 {
                return Err(MiError::Options("epsilon must be positive".into()));
            }
            let u_hist = hist_samples(epsilon, delta, LANES as u64);
            num_samples_f_given_d = u_hist;
            num_samples_f_given_ds = u_hist;
            num_secrets = 1;
            num_data = data_samples(epsilon, delta, u_hist);
            num_samples = num_data * (num_samples_f_given_d + num_secrets * num_samples_f_given_ds);
        } else {
            let nfd = raw.num_samples_f_given_d.unwrap_or(DEFAULT_HIST_SAMPLES);
            let nfds = raw.num_samples_f_given_ds.unwrap_or(DEFAULT_HIST_SAMPLES);
            num_secrets = raw.num_secrets.unwrap_or(1);
            if nfd == 0 || nfds == 0 || num_secrets == 0 {
                return Err(MiError::Options("sampling number cannot be zero".into()));
            }
            num_samples_f_given_d = round_up_to_lanes("num-samples-f-given-d", nfd);
            num_samples_f_given_ds = round_up_to_lanes("num-samples-f-given-ds", nfds);

            let factor = num_samples_f_given_d + num_secrets * num_samples_f_given_ds;
            match (raw.num_data, raw.num_samples) {
                (Some(nd), Some(ns)) => {
                    let computed = nd * factor;
                    if ns != computed {
                        return Err(MiError::Options(format!(
                            "specified number of samples ({ns}) mismatches derived number of samples ({computed})"
                        )));
                    }
                    num_data = nd;
                    num_samples = ns;
                }
                (Some(nd), None) => {
                    num_data = nd;
                    num_samples = nd * factor;
                }
                (None, Some(ns)) => {
                    num_data = ns / factor + u64::from(ns % factor != 0);
                    num_samples = ns;
                }
                (None, None) => {
                    num_data = DEFAULT_NUM_DATA;
                    num_samples = num_data * factor;
                }
            }
            if num_samples == 0 || num_data == 0 {
                return Err(MiError::Options("sampling number cannot be zero".into()));
            }
        }

        let num_threads = raw.num_threads.unwrap_or(1);
        if num_threads == 0 {
            return Err(MiError::Options("number of threads cannot be zero".into()));
        }

        let load_file = match raw.load_file {
            Some(path) if !path.exists() => {
                warn!("load file {} does not exist", path.display());
                None
            }
            other => other,
        };

        let store_file = raw.store_file;
        if let Some(store) = &store_file {
            if Some(store) != load_file.as_ref() && store.exists() {
                return Err(MiError::Options(
                    "store file exists and would be overwritten".into(),
                ));
            }
        }

        let report_file = raw.report_file;
        if let Some(report) = &report_file {
            if Some(report) == load_file.as_ref() || Some(report) == store_file.as_ref() {
                return Err(MiError::Options(
                    "report would overwrite either store or load file".into(),
                ));
            }
            if report.exists() {
                warn!("overwriting report file {}", report.display());
            }
        }

        Ok(MiConfig {
            cycles,
            delta,
            early_stop,
            num_samples_f_given_d,
            num_samples_f_given_ds,
            num_secrets,
            num_data,
            num_samples,
            num_threads,
            timeout: raw.timeout.unwrap_or(0),
            print_best: raw.print_best.unwrap_or(10),
            print_interval: raw.print_interval.unwrap_or(60),
            load_file,
            store_file,
            report_file,
        })
    }

    /// Samples consumed by one outer run (one data draw).
    pub fn samples_per_data(&self) -> u64 {
        self.num_samples_f_given_d + self.num_secrets * self.num_samples_f_given_ds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawOpts {
        RawOpts::default()
    }

    #[test]
    fn defaults_follow_the_budget_solver() {
        let cfg = MiConfig::resolve(raw(), 3).unwrap();
        assert_eq!(cfg.cycles, 3);
        assert_eq!(cfg.num_samples_f_given_d, DEFAULT_HIST_SAMPLES);
        assert_eq!(cfg.num_samples_f_given_ds, DEFAULT_HIST_SAMPLES);
        assert_eq!(cfg.num_secrets, 1);
        assert_eq!(cfg.num_data, DEFAULT_NUM_DATA);
        assert_eq!(cfg.num_samples, cfg.num_data * cfg.samples_per_data());
        assert!(cfg.early_stop);
    }

    #[test]
    fn epsilon_derives_the_sample_plan() {
        let cfg = MiConfig::resolve(
            RawOpts { epsilon: Some(0.01), ..raw() },
            1,
        )
        .unwrap();
        assert_eq!(cfg.num_samples_f_given_d % LANES as u64, 0);
        assert_eq!(cfg.num_secrets, 1);
        assert_eq!(cfg.num_samples, cfg.num_data * cfg.samples_per_data());
    }

    #[test]
    fn nonpositive_epsilon_is_rejected() {
        let err = MiConfig::resolve(RawOpts { epsilon: Some(0.0), ..raw() }, 1).unwrap_err();
        assert!(err.to_string().contains("epsilon"));
    }

    #[test]
    fn zero_sample_counts_are_rejected() {
        let err = MiConfig::resolve(
            RawOpts { num_samples_f_given_d: Some(0), ..raw() },
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot be zero"));
    }

    #[test]
    fn counts_round_up_to_lane_multiples() {
        let cfg = MiConfig::resolve(
            RawOpts {
                num_samples_f_given_d: Some(LANES as u64 + 1),
                num_samples_f_given_ds: Some(1),
                num_data: Some(2),
                ..raw()
            },
            1,
        )
        .unwrap();
        assert_eq!(cfg.num_samples_f_given_d, 2 * LANES as u64);
        assert_eq!(cfg.num_samples_f_given_ds, LANES as u64);
        assert_eq!(cfg.num_samples, 2 * cfg.samples_per_data());
    }

    #[test]
    fn inconsistent_data_and_samples_are_rejected() {
        let err = MiConfig::resolve(
            RawOpts {
                num_samples_f_given_d: Some(64),
                num_samples_f_given_ds: Some(64),
                num_data: Some(2),
                num_samples: Some(3),
                ..raw()
            },
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mismatches"));
    }

    #[test]
    fn num_samples_alone_derives_num_data() {
        let cfg = MiConfig::resolve(
            RawOpts {
                num_samples_f_given_d: Some(64),
                num_samples_f_given_ds: Some(64),
                num_samples: Some(129),
                ..raw()
            },
            1,
        )
        .unwrap();
        // 129 samples over a 128-sample factor needs two data draws.
        assert_eq!(cfg.num_data, 2);
    }

    #[test]
    fn contradicting_early_stop_flags_are_rejected() {
        let err = MiConfig::resolve(
            RawOpts { early_stop: true, no_early_stop: true, ..raw() },
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("early-stop"));
    }

    #[test]
    fn zero_threads_are_rejected() {
        let err = MiConfig::resolve(RawOpts { num_threads: Some(0), ..raw() }, 1).unwrap_err();
        assert!(err.to_string().contains("threads"));
    }

    #[test]
    fn missing_load_file_degrades_to_none() {
        let cfg = MiConfig::resolve(
            RawOpts { load_file: Some("/nonexistent/veil.ckpt".into()), ..raw() },
            1,
        )
        .unwrap();
        assert!(cfg.load_file.is_none());
    }

    #[test]
    fn existing_store_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = MiConfig::resolve(
            RawOpts { store_file: Some(file.path().to_path_buf()), ..raw() },
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("store file exists"));
    }

    #[test]
    fn store_file_may_equal_load_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let cfg = MiConfig::resolve(
            RawOpts {
                load_file: Some(file.path().to_path_buf()),
                store_file: Some(file.path().to_path_buf()),
                ..raw()
            },
            1,
        )
        .unwrap();
        assert_eq!(cfg.load_file, cfg.store_file);
    }

    #[test]
    fn report_file_must_differ_from_checkpoints() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = MiConfig::resolve(
            RawOpts {
                load_file: Some(file.path().to_path_buf()),
                store_file: Some(file.path().to_path_buf()),
                report_file: Some(file.path().to_path_buf()),
                ..raw()
            },
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("report"));
    }
}
