//! In-memory model of a synchronous gate-level circuit.
//!
//! A [`Netlist`] is loaded from a Yosys-style JSON document and owns
//! all of its [`Cell`]s in a topological order: for every combinational
//! cell, all non-register inputs are produced by earlier cells (or are
//! ports, constants, or register outputs). Register outputs count as
//! produced at the start of a cycle.
//!
//! The model deliberately covers only what leakage analysis needs:
//! single-clock edge-triggered designs built from unary, binary, mux
//! and DFF cells. Latches, tri-state logic and multiple clock domains
//! are rejected at load time.

#![warn(missing_docs)]

mod cell;
mod error;
mod loader;
mod net_name;
mod netlist;
mod signal;

pub use cell::{BinaryOp, Cell, CellKind, ClockEdge, Ports, UnaryOp};
pub use error::NetlistError;
pub use net_name::NetName;
pub use netlist::Netlist;
pub use signal::SigId;
