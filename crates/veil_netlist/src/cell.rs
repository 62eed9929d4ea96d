//! Cell definitions: gates and registers.

use crate::signal::SigId;

/// Operation of a single-input cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    /// Inverter.
    Not,
    /// Identity buffer.
    Buf,
}

/// Operation of a two-input cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryOp {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
    /// Exclusive or.
    Xor,
    /// Negated conjunction.
    Nand,
    /// Negated disjunction.
    Nor,
    /// Negated exclusive or.
    Xnor,
}

/// Triggering clock edge of a register.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClockEdge {
    /// Rising edge.
    Pos,
    /// Falling edge.
    Neg,
}

/// The kind of a cell.
///
/// Register variants record their clock edge; reset and enable
/// presence is part of the variant itself so that the port record
/// below can be matched exhaustively.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CellKind {
    /// Single-input gate.
    Unary(UnaryOp),
    /// Two-input gate.
    Binary(BinaryOp),
    /// Two-to-one multiplexer, `y = s ? b : a`.
    Mux,
    /// Plain D flip-flop.
    Dff(ClockEdge),
    /// D flip-flop with synchronous reset to zero.
    Dffr(ClockEdge),
    /// D flip-flop with clock enable.
    Dffe(ClockEdge),
    /// D flip-flop with reset and clock enable.
    Dffer(ClockEdge),
}

impl CellKind {
    /// True for the register variants.
    pub fn is_register(self) -> bool {
        matches!(
            self,
            CellKind::Dff(_) | CellKind::Dffr(_) | CellKind::Dffe(_) | CellKind::Dffer(_)
        )
    }

    /// Clock edge of a register kind.
    pub fn clock_edge(self) -> Option<ClockEdge> {
        match self {
            CellKind::Dff(e) | CellKind::Dffr(e) | CellKind::Dffe(e) | CellKind::Dffer(e) => {
                Some(e)
            }
            _ => None,
        }
    }
}

/// Port record of a cell, indexed by the cell's shape.
///
/// Register variants all expose the clock and output through
/// [`Cell::clock`] and [`Cell::output`]; no layout tricks are needed
/// to share those fields.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Ports {
    /// `y = op(a)`.
    Unary {
        /// Input.
        a: SigId,
        /// Output.
        y: SigId,
    },
    /// `y = a op b`.
    Binary {
        /// First input.
        a: SigId,
        /// Second input.
        b: SigId,
        /// Output.
        y: SigId,
    },
    /// `y = s ? b : a`.
    Mux {
        /// Selected when `s` is 0.
        a: SigId,
        /// Selected when `s` is 1.
        b: SigId,
        /// Selector.
        s: SigId,
        /// Output.
        y: SigId,
    },
    /// `q' = d` on the clock edge.
    Dff {
        /// Clock.
        c: SigId,
        /// Data input.
        d: SigId,
        /// Output.
        q: SigId,
    },
    /// `q' = r ? 0 : d`.
    Dffr {
        /// Clock.
        c: SigId,
        /// Data input.
        d: SigId,
        /// Output.
        q: SigId,
        /// Synchronous reset, active high.
        r: SigId,
    },
    /// `q' = e ? d : q`.
    Dffe {
        /// Clock.
        c: SigId,
        /// Data input.
        d: SigId,
        /// Output.
        q: SigId,
        /// Clock enable, active high.
        e: SigId,
    },
    /// `q' = r ? 0 : (e ? d : q)`.
    Dffer {
        /// Clock.
        c: SigId,
        /// Data input.
        d: SigId,
        /// Output.
        q: SigId,
        /// Synchronous reset, active high.
        r: SigId,
        /// Clock enable, active high.
        e: SigId,
    },
}

/// An elementary gate or register of the netlist.
///
/// Cells are immutable after construction; the owning [`Netlist`]
/// keeps them in topological order.
///
/// [`Netlist`]: crate::Netlist
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Cell {
    name: String,
    kind: CellKind,
    ports: Ports,
}

impl Cell {
    /// Creates a cell. The kind and port record must agree in shape.
    pub fn new(name: String, kind: CellKind, ports: Ports) -> Cell {
        let shapes_agree = matches!(
            (kind, &ports),
            (CellKind::Unary(_), Ports::Unary { .. })
                | (CellKind::Binary(_), Ports::Binary { .. })
                | (CellKind::Mux, Ports::Mux { .. })
                | (CellKind::Dff(_), Ports::Dff { .. })
                | (CellKind::Dffr(_), Ports::Dffr { .. })
                | (CellKind::Dffe(_), Ports::Dffe { .. })
                | (CellKind::Dffer(_), Ports::Dffer { .. })
        );
        assert!(shapes_agree, "cell {name}: kind and ports disagree");
        Cell { name, kind, ports }
    }

    /// The cell's instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cell's kind.
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// The cell's port record.
    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    /// True for register cells.
    pub fn is_register(&self) -> bool {
        self.kind.is_register()
    }

    /// The single output signal (`y` for gates, `q` for registers).
    pub fn output(&self) -> SigId {
        match self.ports {
            Ports::Unary { y, .. }
            | Ports::Binary { y, .. }
            | Ports::Mux { y, .. } => y,
            Ports::Dff { q, .. }
            | Ports::Dffr { q, .. }
            | Ports::Dffe { q, .. }
            | Ports::Dffer { q, .. } => q,
        }
    }

    /// The clock input of a register cell.
    pub fn clock(&self) -> Option<SigId> {
        match self.ports {
            Ports::Dff { c, .. }
            | Ports::Dffr { c, .. }
            | Ports::Dffe { c, .. }
            | Ports::Dffer { c, .. } => Some(c),
            _ => None,
        }
    }

    /// All input signals of the cell, in port order.
    ///
    /// For registers this includes the clock.
    pub fn inputs(&self) -> Vec<SigId> {
        match self.ports {
            Ports::Unary { a, .. } => vec![a],
            Ports::Binary { a, b, .. } => vec![a, b],
            Ports::Mux { a, b, s, .. } => vec![a, b, s],
            Ports::Dff { c, d, .. } => vec![c, d],
            Ports::Dffr { c, d, r, .. } => vec![c, d, r],
            Ports::Dffe { c, d, e, .. } => vec![c, d, e],
            Ports::Dffer { c, d, r, e, .. } => vec![c, d, r, e],
        }
    }

    /// Input signals that must be produced before this cell can be
    /// evaluated within a cycle.
    ///
    /// Empty for registers: their outputs are available at cycle start
    /// and their inputs are read from the previous cycle.
    pub fn comb_inputs(&self) -> Vec<SigId> {
        if self.is_register() {
            Vec::new()
        } else {
            self.inputs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(n: u32) -> SigId {
        SigId::wire(n)
    }

    #[test]
    fn gate_accessors() {
        let c = Cell::new(
            "g0".into(),
            CellKind::Binary(BinaryOp::Xor),
            Ports::Binary { a: w(2), b: w(3), y: w(4) },
        );
        assert_eq!(c.output(), w(4));
        assert_eq!(c.clock(), None);
        assert_eq!(c.inputs(), vec![w(2), w(3)]);
        assert!(!c.is_register());
    }

    #[test]
    fn register_accessors() {
        let c = Cell::new(
            "r0".into(),
            CellKind::Dffer(ClockEdge::Pos),
            Ports::Dffer { c: w(2), d: w(3), q: w(4), r: w(5), e: w(6) },
        );
        assert_eq!(c.output(), w(4));
        assert_eq!(c.clock(), Some(w(2)));
        assert!(c.is_register());
        assert!(c.comb_inputs().is_empty());
        assert_eq!(c.kind().clock_edge(), Some(ClockEdge::Pos));
    }

    #[test]
    #[should_panic(expected = "kind and ports disagree")]
    fn mismatched_shape_panics() {
        let _ = Cell::new(
            "bad".into(),
            CellKind::Mux,
            Ports::Unary { a: w(2), y: w(3) },
        );
    }

    #[test]
    fn mux_inputs_include_selector() {
        let c = Cell::new(
            "m".into(),
            CellKind::Mux,
            Ports::Mux { a: w(2), b: w(3), s: w(4), y: w(5) },
        );
        assert_eq!(c.inputs(), vec![w(2), w(3), w(4)]);
    }
}
