//! Bit-sliced execution of finalized run programs.
//!
//! Each worker owns one set of [`RunBuffers`], sized once from the
//! program and never grown. The kernel functions mirror the emitted
//! text helper for helper, including the cycle gating: running `k`
//! cycles touches exactly the slots the first `k` per-cycle functions
//! write, and the ledger helpers only fill ranges that are live by
//! cycle `k`.

use rand::Rng;
use veil_common::Word;

use crate::program::{Arg, RunOp, RunOpKind, RunProgram};

/// Per-worker storage for executing a [`RunProgram`].
pub struct RunBuffers {
    /// The run-storage array (`RUN_LENGTH` words).
    pub storage: Vec<Word>,
    /// Scratch space for transient expression values.
    temps: Vec<Word>,
}

impl RunProgram {
    /// Allocates buffers sized for this program.
    pub fn new_buffers(&self) -> RunBuffers {
        RunBuffers {
            storage: vec![Word::ZEROS; self.run_length() as usize],
            temps: vec![Word::ZEROS; self.num_temps as usize],
        }
    }

    fn load(bufs: &RunBuffers, arg: Arg) -> Word {
        match arg {
            Arg::Slot(i) => bufs.storage[i as usize],
            Arg::Temp(i) => bufs.temps[i as usize],
        }
    }

    fn exec(bufs: &mut RunBuffers, op: &RunOp) {
        let value = match op.kind {
            RunOpKind::Not(a) => !Self::load(bufs, a),
            RunOpKind::And(a, b) => Self::load(bufs, a) & Self::load(bufs, b),
            RunOpKind::Or(a, b) => Self::load(bufs, a) | Self::load(bufs, b),
            RunOpKind::Xor(a, b) => Self::load(bufs, a) ^ Self::load(bufs, b),
            RunOpKind::Mux { s, t, e } => {
                Word::mux(Self::load(bufs, s), Self::load(bufs, e), Self::load(bufs, t))
            }
        };
        match op.dst {
            Arg::Slot(i) => bufs.storage[i as usize] = value,
            Arg::Temp(i) => bufs.temps[i as usize] = value,
        }
    }

    fn exec_cycle(&self, bufs: &mut RunBuffers, k: usize) {
        for op in &self.ops[self.cycle_ops(k)] {
            Self::exec(bufs, op);
        }
    }

    /// Runs the first `cycles` per-cycle functions.
    pub fn run_circuit(&self, bufs: &mut RunBuffers, cycles: u32) {
        for k in 0..self.cycle_emits.len() {
            if cycles == k as u32 {
                return;
            }
            self.exec_cycle(bufs, k);
        }
    }

    /// `count[i] += popcount(storage[i])` over `[from, to)`.
    pub fn count_run_range(storage: &[Word], count: &mut [u64], from: u32, to: u32) {
        for i in from..to {
            count[i as usize] += storage[i as usize].popcount();
        }
    }

    /// Accumulates popcounts for every slot emitted within `cycles`.
    pub fn count_run(&self, bufs: &RunBuffers, count: &mut [u64], cycles: u32) {
        let mut start = 0;
        for ce in &self.cycle_emits {
            if cycles == ce.cycle - 1 {
                return;
            }
            Self::count_run_range(&bufs.storage, count, start, ce.end);
            start = ce.end;
        }
    }

    /// Interleaved run and popcount accumulation.
    pub fn run_and_count_circuit(&self, bufs: &mut RunBuffers, count: &mut [u64], cycles: u32) {
        let mut start = 0;
        for (k, ce) in self.cycle_emits.iter().enumerate() {
            if cycles == ce.cycle - 1 {
                return;
            }
            self.exec_cycle(bufs, k);
            Self::count_run_range(&bufs.storage, count, start, ce.end);
            start = ce.end;
        }
    }

    /// `result[i] ^= other[i]` over every slot emitted within `cycles`.
    pub fn xor_runs(&self, result: &mut [Word], other: &[Word], cycles: u32) {
        let mut start = 0;
        for ce in &self.cycle_emits {
            if cycles < ce.cycle {
                return;
            }
            for i in start..ce.end {
                result[i as usize] = result[i as usize] ^ other[i as usize];
            }
            start = ce.end;
        }
    }

    /// Fills every live secret slot with fresh random lanes.
    pub fn randomize_secrets<R: Rng + ?Sized>(&self, bufs: &mut RunBuffers, cycles: u32, rng: &mut R) {
        Self::randomize(&self.secret_ranges, bufs, cycles, rng);
    }

    /// Fills every live data slot with fresh random lanes.
    pub fn randomize_data<R: Rng + ?Sized>(&self, bufs: &mut RunBuffers, cycles: u32, rng: &mut R) {
        Self::randomize(&self.data_ranges, bufs, cycles, rng);
    }

    /// Fills every live mask slot with fresh random lanes.
    pub fn randomize_masks<R: Rng + ?Sized>(&self, bufs: &mut RunBuffers, cycles: u32, rng: &mut R) {
        Self::randomize(&self.mask_ranges, bufs, cycles, rng);
    }

    fn randomize<R: Rng + ?Sized>(
        ranges: &[crate::program::GatedRange],
        bufs: &mut RunBuffers,
        cycles: u32,
        rng: &mut R,
    ) {
        for g in ranges {
            if cycles < g.cycle {
                return;
            }
            for i in g.range.low()..=g.range.high() {
                bufs.storage[i as usize] = Word::random(rng);
            }
        }
    }

    /// Fixes every live secret slot to all-zeros or all-ones, one
    /// random bit per slot.
    pub fn fix_random_secrets<R: Rng + ?Sized>(&self, bufs: &mut RunBuffers, cycles: u32, rng: &mut R) {
        Self::fix_random(&self.secret_ranges, bufs, cycles, rng);
    }

    /// Fixes every live data slot to all-zeros or all-ones, one random
    /// bit per slot.
    pub fn fix_random_data<R: Rng + ?Sized>(&self, bufs: &mut RunBuffers, cycles: u32, rng: &mut R) {
        Self::fix_random(&self.data_ranges, bufs, cycles, rng);
    }

    fn fix_random<R: Rng + ?Sized>(
        ranges: &[crate::program::GatedRange],
        bufs: &mut RunBuffers,
        cycles: u32,
        rng: &mut R,
    ) {
        let mut rand_bits: u64 = rng.gen();
        let mut rand_pos: u32 = 63;
        for g in ranges {
            if cycles < g.cycle {
                return;
            }
            for i in g.range.low()..=g.range.high() {
                bufs.storage[i as usize] = Word::splat((rand_bits >> rand_pos) & 1 == 1);
                if rand_pos == 0 {
                    rand_bits = rng.gen();
                    rand_pos = 63;
                } else {
                    rand_pos -= 1;
                }
            }
        }
    }

    /// Copies live secret slots between storage arrays.
    pub fn copy_secrets(&self, dst: &mut [Word], src: &[Word], cycles: u32) {
        Self::copy(&self.secret_ranges, dst, src, cycles);
    }

    /// Copies live data slots between storage arrays.
    pub fn copy_data(&self, dst: &mut [Word], src: &[Word], cycles: u32) {
        Self::copy(&self.data_ranges, dst, src, cycles);
    }

    fn copy(ranges: &[crate::program::GatedRange], dst: &mut [Word], src: &[Word], cycles: u32) {
        for g in ranges {
            if cycles < g.cycle {
                return;
            }
            for i in g.range.low()..=g.range.high() {
                dst[i as usize] = src[i as usize];
            }
        }
    }
}
