//! Yosys JSON netlist ingestion.
//!
//! The loader walks a Yosys-style document
//! `{"modules": {name: {"ports", "cells", "netnames"}}, "license"?}`
//! for one selected top module, validating the invariants of the
//! netlist model as it goes: unique drivers, a single uniform clock,
//! acyclic combinational logic, and a producer for every output port.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::{debug, info};
use serde_json::Value;

use crate::cell::{BinaryOp, Cell, CellKind, ClockEdge, Ports, UnaryOp};
use crate::error::NetlistError;
use crate::net_name::NetName;
use crate::netlist::Netlist;
use crate::signal::SigId;

impl Netlist {
    /// Loads the given top module from a netlist JSON file.
    pub fn from_file(path: &Path, top_module: &str) -> Result<Netlist, NetlistError> {
        let data = std::fs::read_to_string(path)?;
        Netlist::from_json_str(&data, top_module)
    }

    /// Loads the given top module from a netlist JSON string.
    pub fn from_json_str(data: &str, top_module: &str) -> Result<Netlist, NetlistError> {
        let root: Value = serde_json::from_str(data)?;
        let module = root
            .get("modules")
            .and_then(|m| m.get(top_module))
            .ok_or_else(|| NetlistError::UnknownModule(top_module.to_string()))?;

        let license = root
            .get("license")
            .and_then(Value::as_str)
            .unwrap_or("No license provided in JSON netlist")
            .to_string();

        let mut loader = Loader {
            netlist: Netlist {
                module_name: top_module.to_string(),
                license,
                in_ports: HashSet::new(),
                out_ports: HashSet::new(),
                reg_outs: HashSet::new(),
                signals: HashSet::new(),
                cells: Vec::new(),
                name_bits: HashMap::new(),
                bit_name: HashMap::new(),
                clock: None,
                clock_edge: None,
            },
            missing: HashSet::new(),
        };

        loader.netlist.signals.insert(SigId::S0);
        loader.netlist.signals.insert(SigId::S1);
        loader.netlist.signals.insert(SigId::SX);
        loader.netlist.signals.insert(SigId::SZ);

        loader.register_ports(module)?;
        loader.register_cells(module)?;
        loader.check_completeness()?;
        loader.discover_clock()?;
        loader.order_cells()?;
        loader.register_netnames(module)?;

        for sig in [SigId::S0, SigId::S1, SigId::SX, SigId::SZ] {
            loader.netlist.bit_name.remove(&sig);
        }

        info!(
            "loaded module `{top_module}`: {} cells, {} signals, {} inputs, {} outputs",
            loader.netlist.cells.len(),
            loader.netlist.signals.len(),
            loader.netlist.in_ports.len(),
            loader.netlist.out_ports.len(),
        );

        Ok(loader.netlist)
    }
}

struct Loader {
    netlist: Netlist,
    missing: HashSet<SigId>,
}

impl Loader {
    fn register_ports(&mut self, module: &Value) -> Result<(), NetlistError> {
        let ports = match module.get("ports").and_then(Value::as_object) {
            Some(p) => p,
            None => return Ok(()),
        };

        for (name, port) in ports {
            let direction = port
                .get("direction")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if direction != "input" && direction != "output" {
                return Err(NetlistError::IllegalPortDirection {
                    port: name.clone(),
                    direction: direction.to_string(),
                });
            }

            let bits = signal_list(name, port.get("bits"))?;
            if self.netlist.name_bits.contains_key(name) {
                return Err(NetlistError::IllegalNameRedeclaration { name: name.clone() });
            }
            self.add_bit_names(name, &bits);
            self.netlist.name_bits.insert(name.clone(), bits.clone());

            for sig in bits {
                if direction == "input" {
                    self.netlist.in_ports.insert(sig);
                    self.netlist.signals.insert(sig);
                } else {
                    self.netlist.out_ports.insert(sig);
                }
            }
        }
        Ok(())
    }

    fn register_cells(&mut self, module: &Value) -> Result<(), NetlistError> {
        let cells = match module.get("cells").and_then(Value::as_object) {
            Some(c) => c,
            None => return Ok(()),
        };

        for (name, cell) in cells {
            let ty = cell.get("type").and_then(Value::as_str).unwrap_or_default();
            if ty == "$assert" {
                continue;
            }
            let kind = parse_cell_kind(ty).ok_or_else(|| NetlistError::IllegalCellType {
                cell: name.clone(),
                ty: ty.to_string(),
            })?;

            let conns = Connections { cell: name, value: cell.get("connections") };
            let ports = match kind {
                CellKind::Unary(_) => Ports::Unary { a: conns.pin("A")?, y: conns.pin("Y")? },
                CellKind::Binary(_) => Ports::Binary {
                    a: conns.pin("A")?,
                    b: conns.pin("B")?,
                    y: conns.pin("Y")?,
                },
                CellKind::Mux => Ports::Mux {
                    a: conns.pin("A")?,
                    b: conns.pin("B")?,
                    s: conns.pin("S")?,
                    y: conns.pin("Y")?,
                },
                CellKind::Dff(_) => Ports::Dff {
                    c: conns.pin("C")?,
                    d: conns.pin("D")?,
                    q: conns.pin("Q")?,
                },
                CellKind::Dffr(_) => Ports::Dffr {
                    c: conns.pin("C")?,
                    d: conns.pin("D")?,
                    q: conns.pin("Q")?,
                    r: conns.pin("R")?,
                },
                CellKind::Dffe(_) => Ports::Dffe {
                    c: conns.pin("C")?,
                    d: conns.pin("D")?,
                    q: conns.pin("Q")?,
                    e: conns.pin("E")?,
                },
                CellKind::Dffer(_) => Ports::Dffer {
                    c: conns.pin("C")?,
                    d: conns.pin("D")?,
                    q: conns.pin("Q")?,
                    r: conns.pin("R")?,
                    e: conns.pin("E")?,
                },
            };

            let cell = Cell::new(name.clone(), kind, ports);
            let y = cell.output();

            for input in cell.inputs() {
                if input == y {
                    return Err(NetlistError::IllegalCellCycle { cell: name.clone() });
                }
                if !self.netlist.signals.contains(&input) {
                    self.missing.insert(input);
                }
            }
            if self.netlist.signals.contains(&y) {
                return Err(NetlistError::IllegalNameRedeclaration { name: name.clone() });
            }
            self.netlist.signals.insert(y);
            self.missing.remove(&y);
            if cell.is_register() {
                self.netlist.reg_outs.insert(y);
            }
            self.netlist.cells.push(cell);
        }
        Ok(())
    }

    fn check_completeness(&self) -> Result<(), NetlistError> {
        if !self.missing.is_empty() {
            return Err(NetlistError::IllegalMissingSignals { count: self.missing.len() });
        }
        let undriven = self
            .netlist
            .out_ports
            .iter()
            .filter(|sig| !self.netlist.signals.contains(sig))
            .count();
        if undriven != 0 {
            return Err(NetlistError::IllegalMissingSignals { count: undriven });
        }
        Ok(())
    }

    fn discover_clock(&mut self) -> Result<(), NetlistError> {
        for cell in &self.netlist.cells {
            let clock = match cell.clock() {
                Some(c) => c,
                None => continue,
            };
            let edge = cell.kind().clock_edge().unwrap_or(ClockEdge::Pos);

            match self.netlist.clock {
                None => {
                    if clock.is_const() {
                        return Err(NetlistError::IllegalClockSignal {
                            cell: cell.name().to_string(),
                        });
                    }
                    self.netlist.clock = Some(clock);
                }
                Some(existing) => {
                    if clock != existing {
                        return Err(NetlistError::IllegalMultipleClocks {
                            cell: cell.name().to_string(),
                        });
                    }
                }
            }
            match self.netlist.clock_edge {
                None => self.netlist.clock_edge = Some(edge),
                Some(existing) => {
                    if edge != existing {
                        return Err(NetlistError::IllegalClockEdge);
                    }
                }
            }
        }
        Ok(())
    }

    /// Orders cells topologically: registers first, then combinational
    /// cells admitted once all their inputs are produced. A full pass
    /// that admits nothing while cells remain means the combinational
    /// logic is cyclic.
    fn order_cells(&mut self) -> Result<(), NetlistError> {
        let mut produced: HashSet<SigId> = self.netlist.in_ports.iter().copied().collect();
        produced.insert(SigId::S0);
        produced.insert(SigId::S1);
        produced.insert(SigId::SX);
        produced.insert(SigId::SZ);

        let mut order = Vec::with_capacity(self.netlist.cells.len());
        let mut remaining = Vec::new();
        for cell in self.netlist.cells.drain(..) {
            if cell.is_register() {
                produced.insert(cell.output());
                order.push(cell);
            } else {
                remaining.push(cell);
            }
        }

        while !remaining.is_empty() {
            let before = remaining.len();
            remaining.retain(|cell| {
                if cell.comb_inputs().iter().all(|sig| produced.contains(sig)) {
                    produced.insert(cell.output());
                    order.push(cell.clone());
                    false
                } else {
                    true
                }
            });
            debug!("ordered {} of {} cells", order.len(), order.len() + remaining.len());
            if remaining.len() == before {
                return Err(NetlistError::IllegalCellCycle {
                    cell: remaining[0].name().to_string(),
                });
            }
        }

        self.netlist.cells = order;
        Ok(())
    }

    fn register_netnames(&mut self, module: &Value) -> Result<(), NetlistError> {
        let netnames = match module.get("netnames").and_then(Value::as_object) {
            Some(n) => n,
            None => return Ok(()),
        };

        for (name, net) in netnames {
            let bits = signal_list(name, net.get("bits"))?;
            match self.netlist.name_bits.get(name) {
                Some(existing) => {
                    if existing != &bits {
                        return Err(NetlistError::IllegalNameRedeclaration {
                            name: name.clone(),
                        });
                    }
                }
                None => {
                    self.add_bit_names(name, &bits);
                    self.netlist.name_bits.insert(name.clone(), bits);
                }
            }
        }
        Ok(())
    }

    /// Records (name, bit) references, keeping the minimal one per
    /// signal as its display name.
    fn add_bit_names(&mut self, name: &str, bits: &[SigId]) {
        for (pos, &sig) in bits.iter().enumerate() {
            let candidate = NetName::new(name.to_string(), pos as u32);
            match self.netlist.bit_name.get(&sig) {
                Some(existing) if !candidate.precedes(existing) => {}
                _ => {
                    self.netlist.bit_name.insert(sig, candidate);
                }
            }
        }
    }
}

/// Accessor for a cell's `connections` object.
struct Connections<'a> {
    cell: &'a str,
    value: Option<&'a Value>,
}

impl Connections<'_> {
    /// The first bit connected to the named pin.
    fn pin(&self, pin: &str) -> Result<SigId, NetlistError> {
        let bits = self
            .value
            .and_then(|c| c.get(pin))
            .and_then(Value::as_array)
            .ok_or_else(|| NetlistError::IllegalSignalList { name: self.cell.to_string() })?;
        let bit = bits
            .first()
            .ok_or_else(|| NetlistError::IllegalSignalList { name: self.cell.to_string() })?;
        signal_from_value(bit)
    }
}

/// Converts a `bits` entry into signal ids.
fn signal_list(name: &str, bits: Option<&Value>) -> Result<Vec<SigId>, NetlistError> {
    let array = bits
        .and_then(Value::as_array)
        .ok_or_else(|| NetlistError::IllegalSignalList { name: name.to_string() })?;
    array.iter().map(signal_from_value).collect()
}

/// Converts one JSON bit value: an unsigned integer is a wire, the
/// strings `"0" "1" "x" "z"` are constants.
fn signal_from_value(bit: &Value) -> Result<SigId, NetlistError> {
    if let Some(n) = bit.as_u64() {
        if n < u64::from(u32::MAX - 3) {
            return Ok(SigId::wire(n as u32));
        }
    } else if let Some(s) = bit.as_str() {
        if let Some(sig) = SigId::from_const_str(s) {
            return Ok(sig);
        }
    }
    Err(NetlistError::IllegalSignalType { value: bit.to_string() })
}

/// Maps a Yosys cell type string to a [`CellKind`].
fn parse_cell_kind(ty: &str) -> Option<CellKind> {
    use BinaryOp::*;
    use CellKind::*;
    use ClockEdge::*;
    use UnaryOp::*;
    Some(match ty {
        "$not" | "$_NOT_" => Unary(Not),
        "$buf" | "$_BUF_" => Unary(Buf),
        "$and" | "$_AND_" => Binary(And),
        "$or" | "$_OR_" => Binary(Or),
        "$xor" | "$_XOR_" => Binary(Xor),
        "$xnor" | "$_XNOR_" => Binary(Xnor),
        "$nand" | "$_NAND_" => Binary(Nand),
        "$nor" | "$_NOR_" => Binary(Nor),
        "$mux" | "$_MUX_" => Mux,
        "$dff" | "$_DFF_P_" => Dff(Pos),
        "$_DFF_N_" => Dff(Neg),
        "$dffe" | "$_DFFE_P_" => Dffe(Pos),
        "$_DFFE_N_" => Dffe(Neg),
        "$dffr" | "$adff" | "$_DFFR_P_" => Dffr(Pos),
        "$_DFFR_N_" => Dffr(Neg),
        "$dffer" | "$_DFFER_P_" => Dffer(Pos),
        "$_DFFER_N_" => Dffer(Neg),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One XOR gate: y = a ^ b.
    const XOR_JSON: &str = r#"{
        "modules": {
            "xor_top": {
                "ports": {
                    "a": {"direction": "input", "bits": [2]},
                    "b": {"direction": "input", "bits": [3]},
                    "y": {"direction": "output", "bits": [4]}
                },
                "cells": {
                    "g0": {"type": "$xor", "connections": {"A": [2], "B": [3], "Y": [4]}}
                },
                "netnames": {
                    "y": {"bits": [4]}
                }
            }
        }
    }"#;

    #[test]
    fn loads_xor_module() {
        let n = Netlist::from_json_str(XOR_JSON, "xor_top").unwrap();
        assert_eq!(n.cells().len(), 1);
        assert_eq!(n.in_ports().len(), 2);
        assert_eq!(n.out_ports().len(), 1);
        assert_eq!(n.clock(), None);
        assert_eq!(n.bits("a"), Some(&[SigId::wire(2)][..]));
        assert_eq!(n.display_name(SigId::wire(4)).unwrap().to_string(), "y [0]");
    }

    #[test]
    fn unknown_module_fails() {
        let err = Netlist::from_json_str(XOR_JSON, "nope").unwrap_err();
        assert!(matches!(err, NetlistError::UnknownModule(_)));
    }

    #[test]
    fn default_license_applied() {
        let n = Netlist::from_json_str(XOR_JSON, "xor_top").unwrap();
        assert_eq!(n.license(), "No license provided in JSON netlist");
    }

    #[test]
    fn bad_port_direction_fails() {
        let json = r#"{"modules": {"m": {"ports": {"p": {"direction": "inout", "bits": [2]}}}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalPortDirection { .. }));
    }

    #[test]
    fn unknown_cell_type_fails() {
        let json = r#"{"modules": {"m": {"ports": {},
            "cells": {"c": {"type": "$pmux", "connections": {}}}}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalCellType { .. }));
    }

    #[test]
    fn assert_cells_are_skipped() {
        let json = r#"{"modules": {"m": {"ports": {"a": {"direction": "input", "bits": [2]}},
            "cells": {"chk": {"type": "$assert", "connections": {}}}}}}"#;
        let n = Netlist::from_json_str(json, "m").unwrap();
        assert!(n.cells().is_empty());
    }

    #[test]
    fn self_loop_fails() {
        let json = r#"{"modules": {"m": {"ports": {},
            "cells": {"c": {"type": "$not", "connections": {"A": [2], "Y": [2]}}}}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalCellCycle { .. }));
    }

    #[test]
    fn undriven_output_port_fails() {
        let json = r#"{"modules": {"m": {"ports": {
            "a": {"direction": "input", "bits": [2]},
            "y": {"direction": "output", "bits": [3]}},
            "cells": {}}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalMissingSignals { .. }));
    }

    #[test]
    fn dangling_cell_input_fails() {
        let json = r#"{"modules": {"m": {"ports": {},
            "cells": {"c": {"type": "$not", "connections": {"A": [9], "Y": [10]}}}}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalMissingSignals { count: 1 }));
    }

    #[test]
    fn combinational_cycle_fails() {
        // g0: y4 = a2 & w5;  g1: w5 = y4 | a3 — mutual dependency.
        let json = r#"{"modules": {"m": {"ports": {
            "a": {"direction": "input", "bits": [2, 3]}},
            "cells": {
                "g0": {"type": "$and", "connections": {"A": [2], "B": [5], "Y": [4]}},
                "g1": {"type": "$or",  "connections": {"A": [4], "B": [3], "Y": [5]}}
            }}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalCellCycle { .. }));
    }

    #[test]
    fn two_clocks_fail() {
        let json = r#"{"modules": {"m": {"ports": {
            "c1": {"direction": "input", "bits": [2]},
            "c2": {"direction": "input", "bits": [3]},
            "d": {"direction": "input", "bits": [4]}},
            "cells": {
                "r0": {"type": "$dff", "connections": {"C": [2], "D": [4], "Q": [5]}},
                "r1": {"type": "$dff", "connections": {"C": [3], "D": [5], "Q": [6]}}
            }}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalMultipleClocks { .. }));
    }

    #[test]
    fn mixed_clock_edges_fail() {
        let json = r#"{"modules": {"m": {"ports": {
            "clk": {"direction": "input", "bits": [2]},
            "d": {"direction": "input", "bits": [3]}},
            "cells": {
                "r0": {"type": "$_DFF_P_", "connections": {"C": [2], "D": [3], "Q": [4]}},
                "r1": {"type": "$_DFF_N_", "connections": {"C": [2], "D": [4], "Q": [5]}}
            }}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalClockEdge));
    }

    #[test]
    fn constant_clock_fails() {
        let json = r#"{"modules": {"m": {"ports": {
            "d": {"direction": "input", "bits": [3]}},
            "cells": {
                "r0": {"type": "$dff", "connections": {"C": ["1"], "D": [3], "Q": [4]}}
            }}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalClockSignal { .. }));
    }

    #[test]
    fn clock_discovered_from_registers() {
        let json = r#"{"modules": {"m": {"ports": {
            "clk": {"direction": "input", "bits": [2]},
            "d": {"direction": "input", "bits": [3]}},
            "cells": {
                "r0": {"type": "$dff", "connections": {"C": [2], "D": [3], "Q": [4]}}
            }}}}"#;
        let n = Netlist::from_json_str(json, "m").unwrap();
        assert_eq!(n.clock(), Some(SigId::wire(2)));
        assert_eq!(n.clock_edge(), Some(ClockEdge::Pos));
        assert!(n.reg_outs().contains(&SigId::wire(4)));
    }

    #[test]
    fn topological_order_respects_dependencies() {
        // g1 consumes g0's output but is declared first.
        let json = r#"{"modules": {"m": {"ports": {
            "a": {"direction": "input", "bits": [2, 3]}},
            "cells": {
                "g1": {"type": "$not", "connections": {"A": [5], "Y": [6]}},
                "g0": {"type": "$and", "connections": {"A": [2], "B": [3], "Y": [5]}}
            }}}}"#;
        let n = Netlist::from_json_str(json, "m").unwrap();
        let mut produced: std::collections::HashSet<SigId> =
            n.in_ports().iter().copied().collect();
        for cell in n.cells() {
            for input in cell.comb_inputs() {
                assert!(input.is_const() || produced.contains(&input), "cell {} not ready", cell.name());
            }
            produced.insert(cell.output());
        }
    }

    #[test]
    fn duplicate_driver_fails() {
        let json = r#"{"modules": {"m": {"ports": {
            "a": {"direction": "input", "bits": [2, 3]}},
            "cells": {
                "g0": {"type": "$not", "connections": {"A": [2], "Y": [5]}},
                "g1": {"type": "$not", "connections": {"A": [3], "Y": [5]}}
            }}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalNameRedeclaration { .. }));
    }

    #[test]
    fn netname_conflict_fails() {
        let json = r#"{"modules": {"m": {"ports": {
            "a": {"direction": "input", "bits": [2]}},
            "cells": {},
            "netnames": {"a": {"bits": [3]}}}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalNameRedeclaration { .. }));
    }

    #[test]
    fn shortest_netname_wins() {
        let json = r#"{"modules": {"m": {"ports": {
            "a_long_alias": {"direction": "input", "bits": [2]}},
            "cells": {},
            "netnames": {"a": {"bits": [2]}}}}}"#;
        let n = Netlist::from_json_str(json, "m").unwrap();
        assert_eq!(n.display_name(SigId::wire(2)).unwrap().name(), "a");
    }

    #[test]
    fn bad_bit_value_fails() {
        let json = r#"{"modules": {"m": {"ports": {
            "a": {"direction": "input", "bits": ["q"]}}}}}"#;
        let err = Netlist::from_json_str(json, "m").unwrap_err();
        assert!(matches!(err, NetlistError::IllegalSignalType { .. }));
    }
}
