//! The per-worker Monte-Carlo sampler.

use rand::rngs::StdRng;
use veil_common::LANES;
use veil_sim::{RunBuffers, RunProgram};

use crate::options::MiConfig;

/// Binary entropy lookup table over counts out of `n` samples.
///
/// `table[count] = Hbin(count / n)`; the endpoints are exactly zero.
fn hbin_table(n: u64) -> Vec<f64> {
    let mut table = vec![0.0; n as usize + 1];
    for (count, entry) in table.iter_mut().enumerate().skip(1).take(n as usize - 1) {
        let p = count as f64 / n as f64;
        *entry = -(p * p.log2() + (1.0 - p) * (1.0 - p).log2());
    }
    table
}

/// One worker's sampling state: private buffers, private PRNG, and
/// the per-slot accumulator of MI estimates.
///
/// A sampler never shares mutable state with other workers; the
/// driver snapshots [`sumof_mi`](Sampler::sumof_mi) and
/// [`run_id`](Sampler::run_id) to aggregate.
pub struct Sampler<'p> {
    program: &'p RunProgram,
    num_samples_f_given_d: u64,
    num_samples_f_given_ds: u64,
    num_secrets: u64,
    lookup_f_given_d: Vec<f64>,
    lookup_f_given_ds: Vec<f64>,
    rng: StdRng,
    bufs: RunBuffers,
    value_count: Vec<u64>,
    entropy_f_given_d: Vec<f64>,
    entropy_f_given_ds: Vec<f64>,
    /// Per-slot sum of the per-run MI(S;F|D=d) estimates.
    pub sumof_mi: Vec<f64>,
    /// Completed outer runs.
    pub run_id: u64,
}

impl<'p> Sampler<'p> {
    /// Creates a sampler with its own buffers and generator.
    ///
    /// The configured histogram sample counts must be multiples of
    /// the lane count; option resolution guarantees this.
    pub fn new(program: &'p RunProgram, cfg: &MiConfig, rng: StdRng) -> Sampler<'p> {
        assert!(cfg.num_samples_f_given_d % LANES as u64 == 0);
        assert!(cfg.num_samples_f_given_ds % LANES as u64 == 0);
        let run_length = program.run_length() as usize;
        Sampler {
            program,
            num_samples_f_given_d: cfg.num_samples_f_given_d,
            num_samples_f_given_ds: cfg.num_samples_f_given_ds,
            num_secrets: cfg.num_secrets,
            lookup_f_given_d: hbin_table(cfg.num_samples_f_given_d),
            lookup_f_given_ds: hbin_table(cfg.num_samples_f_given_ds),
            rng,
            bufs: program.new_buffers(),
            value_count: vec![0; run_length],
            entropy_f_given_d: vec![0.0; run_length],
            entropy_f_given_ds: vec![0.0; run_length],
            sumof_mi: vec![0.0; run_length],
            run_id: 0,
        }
    }

    /// Performs one outer run: a fresh data draw, an H(F|D=d)
    /// estimate, and `num_secrets` H(F|D=d,S=s) estimates.
    pub fn run_once(&mut self, cycles: u32) {
        let program = self.program;

        // Fix the data for this outer run.
        program.fix_random_data(&mut self.bufs, cycles, &mut self.rng);

        // Estimate H(F|D=d) from fresh (secret, mask) draws.
        self.value_count.fill(0);
        let mut i = 0;
        while i < self.num_samples_f_given_d {
            program.randomize_secrets(&mut self.bufs, cycles, &mut self.rng);
            program.randomize_masks(&mut self.bufs, cycles, &mut self.rng);
            program.run_circuit(&mut self.bufs, cycles);
            program.count_run(&self.bufs, &mut self.value_count, cycles);
            i += LANES as u64;
        }
        for (entropy, &count) in self.entropy_f_given_d.iter_mut().zip(&self.value_count) {
            *entropy = self.lookup_f_given_d[count as usize];
        }

        // Estimate the average over s of H(F|D=d,S=s).
        self.entropy_f_given_ds.fill(0.0);
        for _ in 0..self.num_secrets {
            program.fix_random_secrets(&mut self.bufs, cycles, &mut self.rng);
            self.value_count.fill(0);
            let mut i = 0;
            while i < self.num_samples_f_given_ds {
                program.randomize_masks(&mut self.bufs, cycles, &mut self.rng);
                program.run_and_count_circuit(&mut self.bufs, &mut self.value_count, cycles);
                i += LANES as u64;
            }
            for (entropy, &count) in self.entropy_f_given_ds.iter_mut().zip(&self.value_count) {
                *entropy += self.lookup_f_given_ds[count as usize];
            }
        }
        if self.num_secrets != 1 {
            for entropy in &mut self.entropy_f_given_ds {
                *entropy /= self.num_secrets as f64;
            }
        }

        for ((sum, &fd), &fds) in self
            .sumof_mi
            .iter_mut()
            .zip(&self.entropy_f_given_d)
            .zip(&self.entropy_f_given_ds)
        {
            *sum += fd - fds;
        }

        self.run_id += 1;
    }
}
