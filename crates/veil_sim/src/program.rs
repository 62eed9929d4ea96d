//! The finalized run program.
//!
//! A [`RunProgram`] is the executable twin of the emitted program
//! text: the op tape with every operand resolved to a storage slot or
//! a dense temporary, the per-cycle boundaries, and the allocation
//! ledgers that gate the randomize/fix/copy helpers.

use std::collections::HashMap;

use veil_common::{BuildHash, SlotRange};
use veil_expr::{ExprManager, OpKind, VarId, INVALID_POS};

/// Operand or destination of a run operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Arg {
    /// An index into the run-storage array.
    Slot(u32),
    /// An index into the scratch temporary array.
    Temp(u32),
}

/// Operation kinds of the executable program.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunOpKind {
    /// Lane-wise complement.
    Not(Arg),
    /// Lane-wise conjunction.
    And(Arg, Arg),
    /// Lane-wise disjunction.
    Or(Arg, Arg),
    /// Lane-wise exclusive or.
    Xor(Arg, Arg),
    /// Lane-wise select.
    Mux {
        /// Selector.
        s: Arg,
        /// Value when the selector is 1.
        t: Arg,
        /// Value when the selector is 0.
        e: Arg,
    },
}

/// One executable operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RunOp {
    /// Where the result is written.
    pub dst: Arg,
    /// The operation.
    pub kind: RunOpKind,
}

/// A slot range that becomes live once enough cycles run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GatedRange {
    /// The covered storage slots, both endpoints inclusive.
    pub range: SlotRange,
    /// The 1-based cycle at which the range becomes live.
    pub cycle: u32,
}

/// Emission bookkeeping for one simulated cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct CycleEmit {
    /// Slot count when the cycle's combinational step began.
    #[allow(dead_code)]
    pub start: u32,
    /// Slot count after the cycle completed (exclusive bound).
    pub end: u32,
    /// The 1-based cycle index.
    pub cycle: u32,
}

/// The finalized straight-line bit-sliced program.
///
/// Produced by [`Simulator::finish`](crate::Simulator::finish) before
/// any sampling starts and immutable afterwards; worker threads share
/// one program and execute it against private
/// [`RunBuffers`](crate::RunBuffers).
pub struct RunProgram {
    pub(crate) ops: Vec<RunOp>,
    pub(crate) cycle_op_ends: Vec<usize>,
    pub(crate) cycle_emits: Vec<CycleEmit>,
    pub(crate) secret_ranges: Vec<GatedRange>,
    pub(crate) data_ranges: Vec<GatedRange>,
    pub(crate) mask_ranges: Vec<GatedRange>,
    run_length: u32,
    pub(crate) num_temps: u32,
    debug_info: Vec<String>,
    text: String,
    build_hash: BuildHash,
}

impl RunProgram {
    /// Number of storage slots the program writes.
    pub fn run_length(&self) -> u32 {
        self.run_length
    }

    /// Number of simulated cycles.
    pub fn num_cycles(&self) -> u32 {
        self.cycle_emits.len() as u32
    }

    /// Human-readable description per storage slot; the length equals
    /// [`run_length`](RunProgram::run_length).
    pub fn debug_info(&self) -> &[String] {
        &self.debug_info
    }

    /// The emitted program text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hash binding checkpoints to this program.
    pub fn build_hash(&self) -> BuildHash {
        self.build_hash
    }

    /// The secret allocation ledger.
    pub fn secret_ranges(&self) -> &[GatedRange] {
        &self.secret_ranges
    }

    /// The data allocation ledger.
    pub fn data_ranges(&self) -> &[GatedRange] {
        &self.data_ranges
    }

    /// The mask allocation ledger.
    pub fn mask_ranges(&self) -> &[GatedRange] {
        &self.mask_ranges
    }

    /// Finalizes the manager's op tape into an executable program.
    ///
    /// Variables that ever received a storage slot resolve to that
    /// slot — their defining op stores straight into it — while
    /// transient variables get dense temporary indices.
    pub(crate) fn build(
        mgr: &ExprManager,
        cycle_op_ends: Vec<usize>,
        cycle_emits: Vec<CycleEmit>,
        secret_ranges: Vec<GatedRange>,
        data_ranges: Vec<GatedRange>,
        mask_ranges: Vec<GatedRange>,
        mut debug_info: Vec<String>,
    ) -> RunProgram {
        let run_length = mgr.num_emitted();
        debug_info.resize(run_length as usize, String::new());

        let mut temp_of: HashMap<VarId, u32> = HashMap::new();
        let mut num_temps = 0u32;
        let mut ops = Vec::with_capacity(mgr.ops().len());

        for node in mgr.ops() {
            let kind = match node.kind {
                OpKind::Not(a) => RunOpKind::Not(resolve(mgr, &temp_of, a)),
                OpKind::And(a, b) => {
                    RunOpKind::And(resolve(mgr, &temp_of, a), resolve(mgr, &temp_of, b))
                }
                OpKind::Or(a, b) => {
                    RunOpKind::Or(resolve(mgr, &temp_of, a), resolve(mgr, &temp_of, b))
                }
                OpKind::Xor(a, b) => {
                    RunOpKind::Xor(resolve(mgr, &temp_of, a), resolve(mgr, &temp_of, b))
                }
                OpKind::Mux { s, t, e } => RunOpKind::Mux {
                    s: resolve(mgr, &temp_of, s),
                    t: resolve(mgr, &temp_of, t),
                    e: resolve(mgr, &temp_of, e),
                },
            };
            let slot = mgr.emission_slot(node.dst);
            let dst = if slot != INVALID_POS {
                Arg::Slot(slot)
            } else {
                let idx = num_temps;
                num_temps += 1;
                temp_of.insert(node.dst, idx);
                Arg::Temp(idx)
            };
            ops.push(RunOp { dst, kind });
        }

        let text = mgr.text().unwrap_or_default().to_string();
        let build_hash = BuildHash::of_text(&text);

        RunProgram {
            ops,
            cycle_op_ends,
            cycle_emits,
            secret_ranges,
            data_ranges,
            mask_ranges,
            run_length,
            num_temps,
            debug_info,
            text,
            build_hash,
        }
    }

    /// The op index range belonging to cycle `k`.
    pub(crate) fn cycle_ops(&self, k: usize) -> std::ops::Range<usize> {
        let start = if k == 0 { 0 } else { self.cycle_op_ends[k - 1] };
        start..self.cycle_op_ends[k]
    }
}

/// Resolves an operand: emitted variables reload from their slot,
/// transient variables read their temporary.
fn resolve(mgr: &ExprManager, temp_of: &HashMap<VarId, u32>, var: VarId) -> Arg {
    let slot = mgr.emission_slot(var);
    if slot != INVALID_POS {
        Arg::Slot(slot)
    } else {
        let idx = temp_of
            .get(&var)
            .copied()
            .expect("operand defined before use in the straight-line program");
        Arg::Temp(idx)
    }
}
