//! Symbols: expression variables paired with their storage binding.

use crate::var::VarId;

/// Marker for "this variable has no storage slot".
pub const INVALID_POS: u32 = u32::MAX;

/// A boolean-valued node of the DAG together with its (optional)
/// storage slot.
///
/// The slot is a snapshot taken when the symbol was produced; symbols
/// are cheap `Copy` values handed around by the simulator and
/// testbenches.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Symbol {
    var: VarId,
    pos: u32,
}

impl Symbol {
    /// A constant symbol carrying no storage slot.
    pub fn from_bool(value: bool) -> Symbol {
        Symbol {
            var: if value { VarId::ONE } else { VarId::ZERO },
            pos: INVALID_POS,
        }
    }

    pub(crate) fn new(var: VarId, pos: u32) -> Symbol {
        Symbol { var, pos }
    }

    /// The underlying expression variable.
    pub fn var(self) -> VarId {
        self.var
    }

    /// The storage slot, or [`INVALID_POS`] when not emitted.
    pub fn pos(self) -> u32 {
        self.pos
    }

    /// True for the two constant symbols.
    pub fn is_const(self) -> bool {
        self.var.is_const()
    }
}

impl Default for Symbol {
    /// The constant-false symbol.
    fn default() -> Symbol {
        Symbol::from_bool(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_constants() {
        assert_eq!(Symbol::from_bool(false).var(), VarId::ZERO);
        assert_eq!(Symbol::from_bool(true).var(), VarId::ONE);
        assert_eq!(Symbol::from_bool(true).pos(), INVALID_POS);
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Symbol::default(), Symbol::from_bool(false));
    }

    #[test]
    fn const_detection() {
        assert!(Symbol::from_bool(true).is_const());
        assert!(!Symbol::new(VarId::from_raw(5), INVALID_POS).is_const());
    }
}
