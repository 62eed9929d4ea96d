//! The netlist container and its queries.

use std::collections::{HashMap, HashSet};

use crate::cell::{Cell, ClockEdge};
use crate::net_name::NetName;
use crate::signal::SigId;

/// A loaded synchronous circuit.
///
/// Owns all cells in topological order (registers first, then
/// combinational cells such that every cell's non-register inputs are
/// produced earlier). Signals are identified by [`SigId`]; named buses
/// map to their bit lists and every non-constant signal carries a
/// canonical display name.
#[derive(Debug)]
pub struct Netlist {
    pub(crate) module_name: String,
    pub(crate) license: String,
    pub(crate) in_ports: HashSet<SigId>,
    pub(crate) out_ports: HashSet<SigId>,
    pub(crate) reg_outs: HashSet<SigId>,
    pub(crate) signals: HashSet<SigId>,
    pub(crate) cells: Vec<Cell>,
    pub(crate) name_bits: HashMap<String, Vec<SigId>>,
    pub(crate) bit_name: HashMap<SigId, NetName>,
    pub(crate) clock: Option<SigId>,
    pub(crate) clock_edge: Option<ClockEdge>,
}

impl Netlist {
    /// The top module's name.
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// The license text carried by the netlist JSON.
    pub fn license(&self) -> &str {
        &self.license
    }

    /// True when a bus of this name exists.
    pub fn has(&self, name: &str) -> bool {
        self.name_bits.contains_key(name)
    }

    /// The bit list of a named bus, LSB first.
    pub fn bits(&self, name: &str) -> Option<&[SigId]> {
        self.name_bits.get(name).map(Vec::as_slice)
    }

    /// The canonical display name of a signal.
    pub fn display_name(&self, sig: SigId) -> Option<&NetName> {
        self.bit_name.get(&sig)
    }

    /// All cells in topological order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Primary input signals.
    pub fn in_ports(&self) -> &HashSet<SigId> {
        &self.in_ports
    }

    /// Primary output signals.
    pub fn out_ports(&self) -> &HashSet<SigId> {
        &self.out_ports
    }

    /// Register output signals.
    pub fn reg_outs(&self) -> &HashSet<SigId> {
        &self.reg_outs
    }

    /// The full signal universe, constants included.
    pub fn signals(&self) -> &HashSet<SigId> {
        &self.signals
    }

    /// The unique clock signal, when the circuit has registers.
    pub fn clock(&self) -> Option<SigId> {
        self.clock
    }

    /// The uniform clock edge of all registers.
    pub fn clock_edge(&self) -> Option<ClockEdge> {
        self.clock_edge
    }

    /// All named buses, in deterministic (sorted) order.
    pub fn bus_names(&self) -> impl Iterator<Item = (&String, &Vec<SigId>)> {
        let mut entries: Vec<_> = self.name_bits.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    /// The license text with every line prefixed, for comment blocks
    /// in emitted files.
    pub fn license_lines(&self, prefix: &str) -> String {
        let mut out = String::new();
        for line in self.license.lines() {
            out.push_str(prefix);
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
