//! Simulation errors.

use std::io;

/// Errors raised while driving the symbolic simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// `step_cycle` was called without a preceding `prepare_cycle`.
    #[error("stepping an unprepared cycle")]
    UnpreparedCycle,

    /// An allocation was requested outside a prepared cycle.
    #[error("allocating in an unprepared cycle")]
    AllocateUnprepared,

    /// A shared allocation was requested with zero shares.
    #[error("a shared value needs at least one share")]
    NoShares,

    /// A secret, data or mask index was allocated twice.
    #[error("redefinition of {kind} {index}")]
    Redefined {
        /// "secret", "data" or "mask".
        kind: &'static str,
        /// The re-allocated bit index.
        index: u32,
    },

    /// A share or mask was requested before being allocated.
    #[error("{kind} {index} was never allocated")]
    Unallocated {
        /// "secret", "data" or "mask".
        kind: &'static str,
        /// The unallocated bit index.
        index: u32,
    },

    /// A named bus does not exist in the netlist.
    #[error("unknown bus `{name}`")]
    UnknownBus {
        /// The requested bus name.
        name: String,
    },

    /// An assignment's width does not match the bus width.
    #[error("bus `{name}` is {expected} bits wide, got {got} values")]
    WidthMismatch {
        /// The assigned bus.
        name: String,
        /// The bus width.
        expected: usize,
        /// The number of supplied values.
        got: usize,
    },

    /// A bus was read as an integer while holding symbolic values.
    #[error("bus `{name}` does not hold a constant value")]
    ValueNotConst {
        /// The bus name.
        name: String,
    },

    /// Writing a trace dump failed.
    #[error("trace I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprepared_display() {
        assert_eq!(SimError::UnpreparedCycle.to_string(), "stepping an unprepared cycle");
    }

    #[test]
    fn redefined_display() {
        let e = SimError::Redefined { kind: "secret", index: 7 };
        assert_eq!(e.to_string(), "redefinition of secret 7");
    }

    #[test]
    fn width_mismatch_display() {
        let e = SimError::WidthMismatch { name: "key_in".into(), expected: 128, got: 8 };
        assert_eq!(e.to_string(), "bus `key_in` is 128 bits wide, got 8 values");
    }

    #[test]
    fn value_not_const_display() {
        let e = SimError::ValueNotConst { name: "rcon".into() };
        assert_eq!(e.to_string(), "bus `rcon` does not hold a constant value");
    }
}
