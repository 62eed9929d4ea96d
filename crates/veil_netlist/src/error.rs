//! Netlist loading and validation errors.

use std::io;

/// Errors raised while loading or validating a netlist.
///
/// All loader errors are fail-fast: the first violated invariant
/// aborts the load.
#[derive(Debug, thiserror::Error)]
pub enum NetlistError {
    /// The JSON document does not contain the requested top module.
    #[error("top module `{0}` not found in netlist")]
    UnknownModule(String),

    /// A port declared a direction other than input or output.
    #[error("port `{port}` has illegal direction `{direction}`")]
    IllegalPortDirection {
        /// Port name.
        port: String,
        /// The offending direction string.
        direction: String,
    },

    /// A `bits` entry was not an array of bit values.
    #[error("`{name}` carries an illegal signal list")]
    IllegalSignalList {
        /// The port or net name.
        name: String,
    },

    /// A bit value was neither an unsigned integer nor a constant
    /// literal.
    #[error("illegal signal value `{value}`")]
    IllegalSignalType {
        /// The offending JSON fragment.
        value: String,
    },

    /// The same bus name was declared twice with different bits, or a
    /// cell re-drives an existing signal.
    #[error("illegal redeclaration of `{name}`")]
    IllegalNameRedeclaration {
        /// The redeclared name.
        name: String,
    },

    /// A cell had an unrecognized type.
    #[error("cell `{cell}` has illegal type `{ty}`")]
    IllegalCellType {
        /// Cell instance name.
        cell: String,
        /// The unrecognized type string.
        ty: String,
    },

    /// A cell feeds its own output, or the combinational logic
    /// contains a cycle.
    #[error("combinational cycle through cell `{cell}`")]
    IllegalCellCycle {
        /// A cell on the cycle.
        cell: String,
    },

    /// Signals were consumed but never produced, or an output port has
    /// no driver.
    #[error("{count} signal(s) are consumed but never produced")]
    IllegalMissingSignals {
        /// Number of unresolved signals.
        count: usize,
    },

    /// A register's clock pin is tied to a constant.
    #[error("register `{cell}` has a constant clock")]
    IllegalClockSignal {
        /// The register's instance name.
        cell: String,
    },

    /// Two registers are clocked by different signals.
    #[error("register `{cell}` disagrees on the clock signal")]
    IllegalMultipleClocks {
        /// The register that introduced the second clock.
        cell: String,
    },

    /// Registers mix rising- and falling-edge clocking.
    #[error("registers mix positive and negative clock edges")]
    IllegalClockEdge,

    /// The JSON document could not be parsed.
    #[error("netlist JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The netlist file could not be read.
    #[error("netlist I/O error: {0}")]
    Io(#[from] io::Error),
}
