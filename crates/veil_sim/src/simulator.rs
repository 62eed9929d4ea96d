//! The symbolic cycle-unrolling simulator.

use std::collections::HashMap;

use log::debug;
use veil_common::{BitRange, SlotRange};
use veil_expr::{ExprManager, Symbol, INVALID_POS};
use veil_netlist::{Netlist, SigId};

use crate::error::SimError;
use crate::eval::{eval_cell, CycleMap};
use crate::program::{CycleEmit, GatedRange, RunProgram};

/// Unrolls a netlist across clock cycles, building the straight-line
/// run program.
///
/// The simulator borrows the netlist and owns the expression manager
/// and the trace — one `SigId → Symbol` map per simulated cycle, plus
/// a dummy pre-cycle evaluated with all-zero inputs and register
/// outputs. A cycle is driven in two phases: [`prepare_cycle`]
/// carries inputs and register outputs forward (the testbench may then
/// overwrite inputs and allocate secrets, data and masks), and
/// [`step_cycle`] evaluates the combinational logic, emitting every
/// newly observable wire to a storage slot.
///
/// [`prepare_cycle`]: Simulator::prepare_cycle
/// [`step_cycle`]: Simulator::step_cycle
pub struct Simulator<'n> {
    pub(crate) netlist: &'n Netlist,
    pub(crate) mgr: ExprManager,
    pub(crate) trace: Vec<CycleMap>,
    prepared: bool,
    pub(crate) secret_ranges: Vec<GatedRange>,
    pub(crate) data_ranges: Vec<GatedRange>,
    pub(crate) mask_ranges: Vec<GatedRange>,
    pub(crate) cycle_emits: Vec<CycleEmit>,
    cycle_op_ends: Vec<usize>,
    pub(crate) debug_info: Vec<String>,
    secrets: HashMap<u32, Vec<Symbol>>,
    data: HashMap<u32, Vec<Symbol>>,
    masks: HashMap<u32, Symbol>,
}

fn insert_consts(map: &mut CycleMap) {
    map.insert(SigId::S0, Symbol::from_bool(false));
    map.insert(SigId::S1, Symbol::from_bool(true));
    map.insert(SigId::SX, Symbol::from_bool(false));
    map.insert(SigId::SZ, Symbol::from_bool(false));
}

fn set_debug_info(debug_info: &mut Vec<String>, pos: u32, info: String) {
    let pos = pos as usize;
    if debug_info.len() <= pos {
        debug_info.resize(pos + 1, String::new());
    }
    debug_info[pos] = info;
}

impl<'n> Simulator<'n> {
    /// Creates a simulator over a loaded netlist.
    ///
    /// Computes the dummy pre-cycle: inputs and register outputs are
    /// all zero and every combinational cell is folded against them.
    /// The program prologue (license comment plus the circuit
    /// utilities include) is written immediately.
    pub fn new(netlist: &'n Netlist) -> Simulator<'n> {
        let mut mgr = ExprManager::with_text();

        mgr.push_text(&netlist.license_lines("// "));
        mgr.push_text("\n#include \"veil/circuit_utils.h\"\n");

        let mut first = CycleMap::new();
        insert_consts(&mut first);
        for &sig in netlist.in_ports() {
            first.insert(sig, Symbol::from_bool(false));
        }
        for &sig in netlist.reg_outs() {
            first.insert(sig, Symbol::from_bool(false));
        }
        for cell in netlist.cells() {
            if cell.is_register() {
                continue;
            }
            let sym = eval_cell(&mut mgr, cell, &first, &first);
            first.insert(cell.output(), sym);
        }

        Simulator {
            netlist,
            mgr,
            trace: vec![first],
            prepared: false,
            secret_ranges: Vec::new(),
            data_ranges: Vec::new(),
            mask_ranges: Vec::new(),
            cycle_emits: Vec::new(),
            cycle_op_ends: Vec::new(),
            debug_info: Vec::new(),
            secrets: HashMap::new(),
            data: HashMap::new(),
            masks: HashMap::new(),
        }
    }

    /// The borrowed netlist.
    pub fn netlist(&self) -> &'n Netlist {
        self.netlist
    }

    /// Number of cycles stepped so far.
    pub fn cycles(&self) -> u32 {
        self.cycle_emits.len() as u32
    }

    /// Total number of expression variables allocated so far.
    pub fn num_vars(&self) -> u32 {
        self.mgr.num_vars()
    }

    /// Number of storage slots emitted so far.
    pub fn num_emitted(&self) -> u32 {
        self.mgr.num_emitted()
    }

    /// Width of a named bus.
    pub fn bus_width(&self, name: &str) -> Result<usize, SimError> {
        self.netlist
            .bits(name)
            .map(<[SigId]>::len)
            .ok_or_else(|| SimError::UnknownBus { name: name.to_string() })
    }

    /// Opens the next cycle: copies constants and primary inputs from
    /// the previous cycle and clocks every register, placing its new
    /// output value into the new cycle map.
    pub fn prepare_cycle(&mut self) {
        let mut next = CycleMap::new();
        insert_consts(&mut next);
        if let Some(prev) = self.trace.last() {
            for &sig in self.netlist.in_ports() {
                if let Some(&sym) = prev.get(&sig) {
                    next.insert(sig, sym);
                }
            }
        }
        self.trace.push(next);

        if let Some((curr, rest)) = self.trace.split_last_mut() {
            if let Some(prev) = rest.last() {
                for cell in self.netlist.cells() {
                    if !cell.is_register() {
                        continue;
                    }
                    let sym = eval_cell(&mut self.mgr, cell, prev, curr);
                    curr.insert(cell.output(), sym);
                }
            }
        }

        self.prepared = true;
        let k = self.trace.len() - 2;
        self.mgr.push_text(&format!(
            "\ninline __attribute__ ((always_inline)) void run_circuit_cycle_{k}(wtype_t* s) \n{{\n"
        ));
    }

    /// Closes the current cycle: evaluates every combinational cell in
    /// topological order and emits each newly observable output to a
    /// storage slot, recording its debug description.
    pub fn step_cycle(&mut self) -> Result<(), SimError> {
        if !self.prepared {
            return Err(SimError::UnpreparedCycle);
        }

        let emit_start = self.mgr.num_emitted();
        let cycle_str = (self.trace.len() - 2).to_string();

        let (curr, rest) = match self.trace.split_last_mut() {
            Some(split) => split,
            None => return Err(SimError::UnpreparedCycle),
        };
        let prev = match rest.last() {
            Some(prev) => prev,
            None => return Err(SimError::UnpreparedCycle),
        };

        for cell in self.netlist.cells() {
            if cell.is_register() {
                continue;
            }
            let sym = eval_cell(&mut self.mgr, cell, prev, curr);
            let sig = cell.output();

            let info = match self.netlist.display_name(sig) {
                Some(name) => format!("{name} @{cycle_str}"),
                None => format!("{sig} @{cycle_str}"),
            };
            let fresh = !sym.is_const() && sym.pos() == INVALID_POS;
            if fresh {
                self.mgr.push_text(&format!("\t// Saving {info}\n"));
            }
            let emitted = self.mgr.emit_symbol(sym, true);
            curr.insert(sig, emitted);
            if fresh {
                set_debug_info(&mut self.debug_info, emitted.pos(), info);
            }
        }
        self.mgr.push_text("}\n");

        self.cycle_emits.push(CycleEmit {
            start: emit_start,
            end: self.mgr.num_emitted(),
            cycle: (self.trace.len() - 1) as u32,
        });
        self.cycle_op_ends.push(self.mgr.ops().len());
        self.prepared = false;
        debug!("there are {} variables", self.mgr.num_vars());
        Ok(())
    }

    /// Prepares and steps one cycle.
    pub fn step(&mut self) -> Result<(), SimError> {
        self.prepare_cycle();
        self.step_cycle()
    }

    /// Allocates secret bits over `range`, `shares` shares each.
    pub fn allocate_secrets(&mut self, range: BitRange, shares: usize) -> Result<(), SimError> {
        self.allocate_shared(range, shares, true)
    }

    /// Allocates public data bits over `range`, `shares` shares each.
    pub fn allocate_data(&mut self, range: BitRange, shares: usize) -> Result<(), SimError> {
        self.allocate_shared(range, shares, false)
    }

    /// Allocates fresh random mask bits over `range`.
    pub fn allocate_masks(&mut self, range: BitRange) -> Result<(), SimError> {
        if !self.prepared {
            return Err(SimError::AllocateUnprepared);
        }
        let cycle = (self.trace.len() - 1) as u32;
        for i in range.low()..=range.high() {
            if self.masks.contains_key(&i) {
                return Err(SimError::Redefined { kind: "mask", index: i });
            }
            let sym = self.mgr.fresh_symbol();
            let sym = self.mgr.emit_symbol(sym, false);
            set_debug_info(&mut self.debug_info, sym.pos(), format!("mask {i}"));
            self.masks.insert(i, sym);
        }
        let mask_range = SlotRange::new(
            self.masks[&range.low()].pos(),
            self.masks[&range.high()].pos(),
        );
        self.mask_ranges.push(GatedRange { range: mask_range, cycle });
        Ok(())
    }

    /// Allocates shared secret or data bits.
    ///
    /// Each bit first receives `shares` fresh variables; share 0 is
    /// then rewritten to the XOR of all of them, so the plaintext bit
    /// is recoverable as the XOR over the shares while shares 1..k
    /// stay uniformly random.
    fn allocate_shared(
        &mut self,
        range: BitRange,
        shares: usize,
        is_secret: bool,
    ) -> Result<(), SimError> {
        if !self.prepared {
            return Err(SimError::AllocateUnprepared);
        }
        if shares == 0 {
            return Err(SimError::NoShares);
        }
        let kind = if is_secret { "secret" } else { "data" };
        let cycle = (self.trace.len() - 1) as u32;
        let (low, high) = (range.low(), range.high());

        let dest = if is_secret { &mut self.secrets } else { &mut self.data };
        for i in low..=high {
            if dest.contains_key(&i) {
                return Err(SimError::Redefined { kind, index: i });
            }
            let sym = self.mgr.fresh_symbol();
            let sym = self.mgr.emit_symbol(sym, false);
            set_debug_info(&mut self.debug_info, sym.pos(), format!("{kind} {i} unmasked"));
            dest.insert(i, vec![sym]);
        }

        let dest_range = SlotRange::new(dest[&low][0].pos(), dest[&high][0].pos());
        let dest_ranges = if is_secret { &mut self.secret_ranges } else { &mut self.data_ranges };
        dest_ranges.push(GatedRange { range: dest_range, cycle });

        for sh in 1..shares {
            for i in low..=high {
                let sym = self.mgr.fresh_symbol();
                let sym = self.mgr.emit_symbol(sym, false);
                set_debug_info(&mut self.debug_info, sym.pos(), format!("{kind} {i} share {sh}"));
                if let Some(entry) = dest.get_mut(&i) {
                    entry.push(sym);
                }
            }
        }

        if shares > 1 {
            let mask_range = SlotRange::new(dest[&low][1].pos(), dest[&high][shares - 1].pos());
            self.mask_ranges.push(GatedRange { range: mask_range, cycle });

            for i in low..=high {
                for sh in 1..shares {
                    let share_0 = dest[&i][0].var();
                    let share_sh = dest[&i][sh].var();
                    let xored = self.mgr.make_xor(share_0, share_sh);
                    let sym = self.mgr.symbol_of(xored);
                    let sym = self.mgr.emit_symbol(sym, true);
                    if let Some(entry) = dest.get_mut(&i) {
                        entry[0] = sym;
                    }
                    let info = if sh != shares - 1 {
                        format!("intern {kind} {i} share xor")
                    } else {
                        format!("{kind} {i} share 0")
                    };
                    set_debug_info(&mut self.debug_info, sym.pos(), info);
                }
            }
        }
        Ok(())
    }

    /// Share `which` of the secret bits in `range`, in bit-list order.
    pub fn secrets_share(&self, range: BitRange, which: usize) -> Result<Vec<Symbol>, SimError> {
        Self::get_share(&self.secrets, range, which, "secret")
    }

    /// Share `which` of the data bits in `range`, in bit-list order.
    pub fn data_share(&self, range: BitRange, which: usize) -> Result<Vec<Symbol>, SimError> {
        Self::get_share(&self.data, range, which, "data")
    }

    /// The mask bits in `range`, in bit-list order.
    pub fn masks(&self, range: BitRange) -> Result<Vec<Symbol>, SimError> {
        range
            .iter()
            .map(|i| {
                self.masks
                    .get(&i)
                    .copied()
                    .ok_or(SimError::Unallocated { kind: "mask", index: i })
            })
            .collect()
    }

    fn get_share(
        map: &HashMap<u32, Vec<Symbol>>,
        range: BitRange,
        which: usize,
        kind: &'static str,
    ) -> Result<Vec<Symbol>, SimError> {
        range
            .iter()
            .map(|i| {
                map.get(&i)
                    .and_then(|shares| shares.get(which))
                    .copied()
                    .ok_or(SimError::Unallocated { kind, index: i })
            })
            .collect()
    }

    /// Assigns symbols to a named bus in the current cycle, LSB first.
    pub fn assign(&mut self, name: &str, values: &[Symbol]) -> Result<(), SimError> {
        let bits = self
            .netlist
            .bits(name)
            .ok_or_else(|| SimError::UnknownBus { name: name.to_string() })?;
        if bits.len() != values.len() {
            return Err(SimError::WidthMismatch {
                name: name.to_string(),
                expected: bits.len(),
                got: values.len(),
            });
        }
        if let Some(curr) = self.trace.last_mut() {
            for (&sig, &sym) in bits.iter().zip(values) {
                curr.insert(sig, sym);
            }
        }
        Ok(())
    }

    /// Assigns one bit of a named bus in the current cycle.
    pub fn assign_bit(&mut self, name: &str, bit: usize, value: Symbol) -> Result<(), SimError> {
        let bits = self
            .netlist
            .bits(name)
            .ok_or_else(|| SimError::UnknownBus { name: name.to_string() })?;
        let sig = *bits.get(bit).ok_or_else(|| SimError::WidthMismatch {
            name: name.to_string(),
            expected: bits.len(),
            got: bit + 1,
        })?;
        if let Some(curr) = self.trace.last_mut() {
            curr.insert(sig, value);
        }
        Ok(())
    }

    /// Reads the symbols of a named bus in the current cycle, LSB
    /// first. Signals without a value read as the unknown (zero)
    /// symbol.
    pub fn read(&self, name: &str) -> Result<Vec<Symbol>, SimError> {
        let bits = self
            .netlist
            .bits(name)
            .ok_or_else(|| SimError::UnknownBus { name: name.to_string() })?;
        let curr = match self.trace.last() {
            Some(map) => map,
            None => return Ok(vec![Symbol::from_bool(false); bits.len()]),
        };
        Ok(bits
            .iter()
            .map(|sig| curr.get(sig).copied().unwrap_or(Symbol::from_bool(false)))
            .collect())
    }

    /// Reads a bus as an unsigned integer; fails when any bit is
    /// symbolic.
    pub fn read_u64(&self, name: &str) -> Result<u64, SimError> {
        let values = self.read(name)?;
        let mut out = 0u64;
        for (i, sym) in values.iter().enumerate().take(64) {
            if sym.var() == veil_expr::VarId::ONE {
                out |= 1u64 << i;
            } else if sym.var() != veil_expr::VarId::ZERO {
                return Err(SimError::ValueNotConst { name: name.to_string() });
            }
        }
        Ok(out)
    }

    /// `¬a`.
    pub fn not(&mut self, a: Symbol) -> Symbol {
        let var = self.mgr.make_not(a.var());
        self.mgr.symbol_of(var)
    }

    /// `a ∧ b`.
    pub fn and(&mut self, a: Symbol, b: Symbol) -> Symbol {
        let var = self.mgr.make_and(a.var(), b.var());
        self.mgr.symbol_of(var)
    }

    /// `a ∨ b`.
    pub fn or(&mut self, a: Symbol, b: Symbol) -> Symbol {
        let var = self.mgr.make_or(a.var(), b.var());
        self.mgr.symbol_of(var)
    }

    /// `a ⊕ b`.
    pub fn xor(&mut self, a: Symbol, b: Symbol) -> Symbol {
        let var = self.mgr.make_xor(a.var(), b.var());
        self.mgr.symbol_of(var)
    }

    /// `s ? t : e`.
    pub fn mux(&mut self, s: Symbol, t: Symbol, e: Symbol) -> Symbol {
        let var = self.mgr.make_mux(s.var(), t.var(), e.var());
        self.mgr.symbol_of(var)
    }

    /// Closes the program: writes the epilogue (run chain, bulk
    /// helpers, `RUN_LENGTH` and `DEBUG_INFO`) and finalizes the op
    /// tape into an executable [`RunProgram`].
    pub fn finish(mut self) -> RunProgram {
        self.pad_debug_info();
        self.emit_epilogue();
        RunProgram::build(
            &self.mgr,
            self.cycle_op_ends,
            self.cycle_emits,
            self.secret_ranges,
            self.data_ranges,
            self.mask_ranges,
            self.debug_info,
        )
    }

    fn pad_debug_info(&mut self) {
        let run_length = self.mgr.num_emitted() as usize;
        if self.debug_info.len() < run_length {
            self.debug_info.resize(run_length, String::new());
        }
    }
}
