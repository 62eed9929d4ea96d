//! Symbolic unrolling of netlists into bit-sliced run programs.
//!
//! The [`Simulator`] walks a netlist across clock cycles under the
//! control of a [`Testbench`], building one hash-consed Boolean
//! expression per wire per cycle. Wires that become observable are
//! assigned storage slots; the result of a simulation is a
//! [`RunProgram`] — a straight-line bit-parallel program over a
//! `W`-lane word array — together with the C-like text of that program
//! and the ledgers that drive the randomize/fix/copy helpers of the
//! Monte-Carlo estimator.

#![warn(missing_docs)]

mod emit;
mod error;
mod eval;
mod kernel;
mod program;
mod simulator;
mod testbench;
mod vcd;

pub use error::SimError;
pub use kernel::RunBuffers;
pub use program::{Arg, GatedRange, RunOp, RunOpKind, RunProgram};
pub use simulator::Simulator;
pub use testbench::{PortGroup, PortTestbench, Testbench};
