//! Symbolic evaluation of cells against per-cycle value maps.

use std::collections::HashMap;

use veil_expr::{ExprManager, Symbol};
use veil_netlist::{BinaryOp, Cell, CellKind, Ports, SigId, UnaryOp};

/// The symbolic value of every signal within one cycle.
pub(crate) type CycleMap = HashMap<SigId, Symbol>;

fn value(map: &CycleMap, sig: SigId) -> Symbol {
    map.get(&sig)
        .copied()
        .expect("signal missing from cycle map")
}

/// Evaluates one cell symbolically, returning its output symbol.
///
/// Combinational cells read their inputs from `curr`; register cells
/// read data, reset, enable and their own previous output from `prev`,
/// computing the Q value that holds after the clock edge.
pub(crate) fn eval_cell(
    mgr: &mut ExprManager,
    cell: &Cell,
    prev: &CycleMap,
    curr: &CycleMap,
) -> Symbol {
    let var = match (cell.kind(), cell.ports()) {
        (CellKind::Unary(op), &Ports::Unary { a, .. }) => {
            let a = value(curr, a).var();
            match op {
                UnaryOp::Not => mgr.make_not(a),
                UnaryOp::Buf => a,
            }
        }
        (CellKind::Binary(op), &Ports::Binary { a, b, .. }) => {
            let a = value(curr, a).var();
            let b = value(curr, b).var();
            match op {
                BinaryOp::And => mgr.make_and(a, b),
                BinaryOp::Or => mgr.make_or(a, b),
                BinaryOp::Xor => mgr.make_xor(a, b),
                BinaryOp::Nand => {
                    let c = mgr.make_and(a, b);
                    mgr.make_not(c)
                }
                BinaryOp::Nor => {
                    let c = mgr.make_or(a, b);
                    mgr.make_not(c)
                }
                BinaryOp::Xnor => {
                    let c = mgr.make_xor(a, b);
                    mgr.make_not(c)
                }
            }
        }
        (CellKind::Mux, &Ports::Mux { a, b, s, .. }) => {
            let a = value(curr, a).var();
            let b = value(curr, b).var();
            let s = value(curr, s).var();
            mgr.make_mux(s, b, a)
        }
        (CellKind::Dff(_), &Ports::Dff { d, .. }) => value(prev, d).var(),
        (CellKind::Dffr(_), &Ports::Dffr { d, r, .. }) => {
            let d = value(prev, d).var();
            let r = value(prev, r).var();
            mgr.make_mux(r, veil_expr::VarId::ZERO, d)
        }
        (CellKind::Dffe(_), &Ports::Dffe { d, q, e, .. }) => {
            let d = value(prev, d).var();
            let q = value(prev, q).var();
            let e = value(prev, e).var();
            mgr.make_mux(e, d, q)
        }
        (CellKind::Dffer(_), &Ports::Dffer { d, q, r, e, .. }) => {
            let d = value(prev, d).var();
            let q = value(prev, q).var();
            let e = value(prev, e).var();
            let r = value(prev, r).var();
            let held = mgr.make_mux(e, d, q);
            mgr.make_mux(r, veil_expr::VarId::ZERO, held)
        }
        _ => unreachable!("cell kind and ports always agree"),
    };
    mgr.symbol_of(var)
}
