//! Signal identifiers.

use std::fmt;

/// Identifier of a single boolean-valued wire.
///
/// The four top values of the `u32` range are reserved for the
/// constants 0, 1, X and Z; every other value is a wire and carries
/// the netlist bit index verbatim. The total order is the order of the
/// raw values.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SigId(u32);

impl SigId {
    /// The constant-0 signal.
    pub const S0: SigId = SigId(u32::MAX - 3);
    /// The constant-1 signal.
    pub const S1: SigId = SigId(u32::MAX - 2);
    /// The unknown-value signal.
    pub const SX: SigId = SigId(u32::MAX - 1);
    /// The high-impedance signal.
    pub const SZ: SigId = SigId(u32::MAX);

    /// Creates a wire signal from a netlist bit index.
    ///
    /// # Panics
    ///
    /// Panics if the index collides with the reserved constant range.
    pub fn wire(index: u32) -> SigId {
        assert!(index < u32::MAX - 3, "bit index {index} collides with constants");
        SigId(index)
    }

    /// Parses the constant literals `"0"`, `"1"`, `"x"`, `"z"`.
    pub fn from_const_str(s: &str) -> Option<SigId> {
        match s {
            "0" => Some(SigId::S0),
            "1" => Some(SigId::S1),
            "x" => Some(SigId::SX),
            "z" => Some(SigId::SZ),
            _ => None,
        }
    }

    /// Returns true for the four reserved constant signals.
    pub fn is_const(self) -> bool {
        self.0 >= u32::MAX - 3
    }

    /// The raw identifier value.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SigId::S0 => f.write_str("0"),
            SigId::S1 => f.write_str("1"),
            SigId::SX => f.write_str("x"),
            SigId::SZ => f.write_str("z"),
            SigId(n) => write!(f, "w{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn constants_are_const() {
        for s in [SigId::S0, SigId::S1, SigId::SX, SigId::SZ] {
            assert!(s.is_const());
        }
        assert!(!SigId::wire(2).is_const());
    }

    #[test]
    fn const_literals_parse() {
        assert_eq!(SigId::from_const_str("0"), Some(SigId::S0));
        assert_eq!(SigId::from_const_str("1"), Some(SigId::S1));
        assert_eq!(SigId::from_const_str("x"), Some(SigId::SX));
        assert_eq!(SigId::from_const_str("z"), Some(SigId::SZ));
        assert_eq!(SigId::from_const_str("q"), None);
    }

    #[test]
    fn wires_order_by_index() {
        assert!(SigId::wire(2) < SigId::wire(3));
        assert!(SigId::wire(1000) < SigId::S0);
    }

    #[test]
    fn hashable_in_set() {
        let mut set = HashSet::new();
        set.insert(SigId::wire(5));
        set.insert(SigId::wire(5));
        set.insert(SigId::S1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn display_forms() {
        assert_eq!(SigId::wire(17).to_string(), "w17");
        assert_eq!(SigId::SX.to_string(), "x");
    }
}
