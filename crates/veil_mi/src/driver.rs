//! The multi-threaded analysis driver.
//!
//! Spawns `T` shared-nothing samplers over one immutable
//! [`RunProgram`], wakes up every print interval to rank suspicious
//! slots, and persists the accumulated statistics when done. Workers
//! synchronize with the driver only through the stop flag, a done
//! counter and a condition variable; cancellation (signals, timeout,
//! early stop) is cooperative — the flag is checked between outer
//! runs and partial runs are discarded.

use std::fs::File;
use std::io::{self, BufWriter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use veil_sim::RunProgram;

use crate::error::{MiError, SaveDataError};
use crate::options::MiConfig;
use crate::report::{report, ReportDepth};
use crate::sampler::Sampler;
use crate::savedata::SaveData;

/// The outcome of one analysis run.
#[derive(Clone, Debug)]
pub struct AnalysisResult {
    /// Completed outer runs across all workers, loaded state included.
    pub num_runs: u64,
    /// Wall-clock sampling time, loaded state included.
    pub duration_ms: u64,
    /// Aggregated per-slot MI sums.
    pub sumof_mi: Vec<f64>,
    /// Whether sampling ended on the stop flag rather than the quota.
    pub stopped: bool,
}

struct Progress {
    done: Mutex<u32>,
    cond: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn snapshot(samplers: &[Mutex<Sampler<'_>>], run_length: usize) -> (Vec<f64>, u64) {
    let mut sums = vec![0.0; run_length];
    let mut runs = 0;
    for cell in samplers {
        let sampler = lock(cell);
        for (acc, &value) in sums.iter_mut().zip(&sampler.sumof_mi) {
            *acc += value;
        }
        runs += sampler.run_id;
    }
    (sums, runs)
}

fn worker(
    cell: &Mutex<Sampler<'_>>,
    cycles: u32,
    quota: u64,
    stop: &AtomicBool,
    progress: &Progress,
) {
    let end = lock(cell).run_id + quota;
    while !stop.load(Ordering::Relaxed) {
        let mut sampler = lock(cell);
        if sampler.run_id == end {
            break;
        }
        sampler.run_once(cycles);
    }
    let mut done = lock(&progress.done);
    *done += 1;
    drop(done);
    progress.cond.notify_one();
}

/// Runs the full Monte-Carlo analysis over an emitted program.
///
/// Installs INT/TERM/HUP handlers that raise the stop flag, spawns
/// the configured worker threads, reports periodically, and on
/// completion writes the checkpoint and the final report. A
/// signal-driven stop is not an error: the result carries whatever
/// statistics the completed runs produced.
pub fn analyze(
    program: &RunProgram,
    cfg: &MiConfig,
    loaded: Option<SaveData>,
) -> Result<AnalysisResult, MiError> {
    let start = Instant::now();
    let run_length = program.run_length() as usize;

    let stop = Arc::new(AtomicBool::new(false));
    let mut signal_ids = Vec::new();
    for sig in [SIGINT, SIGTERM, SIGHUP] {
        signal_ids.push(signal_hook::flag::register(sig, Arc::clone(&stop))?);
    }

    let samples_per_data = cfg.samples_per_data();
    let samples_at_once = samples_per_data * u64::from(cfg.num_threads);
    let runs_per_thread = cfg.num_samples / samples_at_once
        + u64::from(cfg.num_samples % samples_at_once != 0);

    info!("delta: {:.16}", cfg.delta);
    info!("num_samples: {}", cfg.num_samples);
    info!("samples_per_data: {samples_per_data}");
    info!("samples_at_once: {samples_at_once}");
    info!("runs_per_thread: {runs_per_thread}");

    let mut samplers = Vec::with_capacity(cfg.num_threads as usize);
    for _ in 0..cfg.num_threads {
        samplers.push(Mutex::new(Sampler::new(program, cfg, StdRng::from_entropy())));
    }

    let loaded_duration = loaded.as_ref().map_or(0, |data| data.duration_ms);
    if let Some(data) = loaded {
        let mut first = lock(&samplers[0]);
        first.run_id = data.num_runs;
        first.sumof_mi.copy_from_slice(&data.sumof_mi);
    }

    let progress = Progress { done: Mutex::new(0), cond: Condvar::new() };
    let deadline = (cfg.timeout != 0).then(|| start + Duration::from_secs(u64::from(cfg.timeout)));

    std::thread::scope(|scope| {
        for cell in &samplers {
            let stop = &stop;
            let progress = &progress;
            scope.spawn(move || worker(cell, cfg.cycles, runs_per_thread, stop, progress));
        }

        let mut done = lock(&progress.done);
        while *done != cfg.num_threads {
            // Once the deadline has passed, the flag is already set and
            // workers wind down between runs; keep polling gently.
            let floor = Duration::from_millis(100);
            let wait = match (cfg.print_interval, deadline) {
                (0, None) => None,
                (0, Some(at)) => Some(at.saturating_duration_since(Instant::now()).max(floor)),
                (secs, None) => Some(Duration::from_secs(u64::from(secs))),
                (secs, Some(at)) => Some(
                    Duration::from_secs(u64::from(secs))
                        .min(at.saturating_duration_since(Instant::now()))
                        .max(floor),
                ),
            };
            done = match wait {
                Some(duration) => {
                    progress
                        .cond
                        .wait_timeout(done, duration)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => progress.cond.wait(done).unwrap_or_else(PoisonError::into_inner),
            };
            if *done == cfg.num_threads {
                break;
            }
            drop(done);

            if let Some(at) = deadline {
                if Instant::now() >= at {
                    stop.store(true, Ordering::Relaxed);
                }
            }
            if cfg.print_interval != 0 {
                let (sums, runs) = snapshot(&samplers, run_length);
                let stdout = io::stdout();
                let mut out = stdout.lock();
                if let Ok(fired) = report(
                    &mut out,
                    true,
                    cfg,
                    program,
                    &sums,
                    runs,
                    ReportDepth::Top(cfg.print_best),
                ) {
                    if fired {
                        stop.store(true, Ordering::Relaxed);
                    }
                }
            }

            done = lock(&progress.done);
        }
    });

    for id in signal_ids {
        signal_hook::low_level::unregister(id);
    }

    let duration_ms = start.elapsed().as_millis() as u64 + loaded_duration;
    let (sumof_mi, num_runs) = snapshot(&samplers, run_length);

    info!("finished analysis, writing results");
    if let Some(path) = &cfg.store_file {
        let data = SaveData {
            hash: program.build_hash(),
            cycles: cfg.cycles,
            num_samples_f_given_d: cfg.num_samples_f_given_d,
            num_samples_f_given_ds: cfg.num_samples_f_given_ds,
            num_secrets: cfg.num_secrets,
            num_runs,
            duration_ms,
            sumof_mi: sumof_mi.clone(),
        };
        let file = File::create(path)?;
        data.write(BufWriter::new(file)).map_err(|err| match err {
            SaveDataError::Io(io_err) => MiError::Io(io_err),
            other => MiError::SaveData(other),
        })?;
    }

    match &cfg.report_file {
        Some(path) => {
            let file = File::create(path)?;
            let mut out = BufWriter::new(file);
            report(&mut out, false, cfg, program, &sumof_mi, num_runs, ReportDepth::All)?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            report(&mut out, true, cfg, program, &sumof_mi, num_runs, ReportDepth::All)?;
        }
    }

    Ok(AnalysisResult {
        num_runs,
        duration_ms,
        sumof_mi,
        stopped: stop.load(Ordering::Relaxed),
    })
}
