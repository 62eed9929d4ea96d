//! The hash-consing expression manager.

use std::collections::HashMap;
use std::fmt::Write;

use crate::symbol::{Symbol, INVALID_POS};
use crate::var::VarId;

/// One recorded operation of the straight-line program.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct OpNode {
    /// The variable this operation defines.
    pub dst: VarId,
    /// The operation and its operands.
    pub kind: OpKind,
}

/// Operation kinds of the straight-line program.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OpKind {
    /// `dst = ¬a`.
    Not(VarId),
    /// `dst = a ∧ b`.
    And(VarId, VarId),
    /// `dst = a ∨ b`.
    Or(VarId, VarId),
    /// `dst = a ⊕ b`.
    Xor(VarId, VarId),
    /// `dst = (s ∧ t) ∨ (¬s ∧ e)`.
    Mux {
        /// Selector.
        s: VarId,
        /// Value when the selector is 1.
        t: VarId,
        /// Value when the selector is 0.
        e: VarId,
    },
}

/// Builds hash-consed Boolean expressions and emits the straight-line
/// program they form.
///
/// Every constructor first applies constant folding and the local
/// simplification rules, then consults its cache so that equal
/// expressions share one [`VarId`]. Newly allocated operations are
/// appended to a linear op tape and, when text emission is enabled,
/// written as C-like `#define` lines. Variables gain a storage slot on
/// first [`emit`](ExprManager::emit); `num_vars`/`num_emitted` size
/// the run buffers.
pub struct ExprManager {
    num_vars: u32,
    num_emitted: u32,
    not_cache: HashMap<VarId, VarId>,
    and_cache: HashMap<(VarId, VarId), VarId>,
    or_cache: HashMap<(VarId, VarId), VarId>,
    xor_cache: HashMap<(VarId, VarId), VarId>,
    mux_cache: HashMap<(VarId, VarId, VarId), VarId>,
    emission: HashMap<VarId, u32>,
    ops: Vec<OpNode>,
    text: Option<String>,
}

/// Name of the run-storage array in emitted text.
const STORAGE: &str = "s";

impl ExprManager {
    /// Creates a manager without text emission.
    pub fn new() -> ExprManager {
        ExprManager {
            num_vars: VarId::FIRST_FREE,
            num_emitted: 0,
            not_cache: HashMap::new(),
            and_cache: HashMap::new(),
            or_cache: HashMap::new(),
            xor_cache: HashMap::new(),
            mux_cache: HashMap::new(),
            emission: HashMap::new(),
            ops: Vec::new(),
            text: None,
        }
    }

    /// Creates a manager that also writes program text.
    ///
    /// Construction semantics are identical in both modes.
    pub fn with_text() -> ExprManager {
        let mut mgr = ExprManager::new();
        mgr.text = Some(String::new());
        mgr
    }

    /// Allocates a fresh variable.
    pub fn new_var(&mut self) -> VarId {
        let var = VarId::from_raw(self.num_vars);
        self.num_vars += 1;
        var
    }

    /// Allocates a fresh variable wrapped as an unemitted symbol.
    pub fn fresh_symbol(&mut self) -> Symbol {
        let var = self.new_var();
        Symbol::new(var, INVALID_POS)
    }

    /// Wraps a variable as a symbol carrying its current slot binding.
    pub fn symbol_of(&self, var: VarId) -> Symbol {
        Symbol::new(var, self.emission_slot(var))
    }

    /// Total number of variables allocated so far, constants included.
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Number of storage slots assigned so far.
    pub fn num_emitted(&self) -> u32 {
        self.num_emitted
    }

    /// The recorded op tape.
    pub fn ops(&self) -> &[OpNode] {
        &self.ops
    }

    /// The storage slot of a variable, or [`INVALID_POS`].
    pub fn emission_slot(&self, var: VarId) -> u32 {
        self.emission.get(&var).copied().unwrap_or(INVALID_POS)
    }

    /// True when the variable is a constant or has been allocated.
    pub fn is_known(&self, var: VarId) -> bool {
        var.as_raw() < self.num_vars
    }

    /// Assigns a storage slot to `var` on first call, returning it.
    ///
    /// With `write` set, the emitted text stores the variable's value
    /// into the slot (`s[p] = tN;`); otherwise the slot becomes a pure
    /// binding (`#define tN s[p]`) to be filled by the run-time
    /// randomize/copy helpers.
    pub fn emit(&mut self, var: VarId, write: bool) -> u32 {
        if let Some(&pos) = self.emission.get(&var) {
            return pos;
        }
        let pos = self.num_emitted;
        self.num_emitted += 1;

        if self.text.is_some() {
            let rhs = self.idx(var);
            if let Some(text) = self.text.as_mut() {
                if write {
                    let _ = writeln!(text, "\t{STORAGE}[{pos}] = {rhs};");
                } else {
                    let _ = writeln!(text, "\t#define {rhs} {STORAGE}[{pos}]");
                }
            }
        }

        self.emission.insert(var, pos);
        pos
    }

    /// Emits a symbol, returning it with its slot filled in.
    ///
    /// Constant symbols are returned unchanged; they never occupy a
    /// slot.
    pub fn emit_symbol(&mut self, sym: Symbol, write: bool) -> Symbol {
        if sym.is_const() {
            return sym;
        }
        let pos = self.emit(sym.var(), write);
        Symbol::new(sym.var(), pos)
    }

    /// `¬a`, simplified and hash-consed.
    pub fn make_not(&mut self, a: VarId) -> VarId {
        assert!(self.is_known(a), "unknown literal");

        if a == VarId::ZERO {
            return VarId::ONE;
        }
        if a == VarId::ONE {
            return VarId::ZERO;
        }

        if let Some(&cached) = self.not_cache.get(&a) {
            return cached;
        }

        let not_a = self.new_var();
        self.not_cache.insert(a, not_a);
        self.not_cache.insert(not_a, a);
        self.record(OpNode { dst: not_a, kind: OpKind::Not(a) });
        not_a
    }

    /// `a ∧ b`, simplified and hash-consed.
    pub fn make_and(&mut self, a: VarId, b: VarId) -> VarId {
        assert!(self.is_known(a), "unknown literal");
        assert!(self.is_known(b), "unknown literal");

        if a == VarId::ZERO || b == VarId::ZERO {
            return VarId::ZERO;
        }
        if a == VarId::ONE {
            return b;
        }
        if b == VarId::ONE {
            return a;
        }
        if a == b {
            return a;
        }
        if self.not_cache.get(&b) == Some(&a) {
            return VarId::ZERO;
        }

        let key = (a.min(b), a.max(b));
        if let Some(&cached) = self.and_cache.get(&key) {
            return cached;
        }

        let c = self.new_var();
        self.and_cache.insert(key, c);
        self.record(OpNode { dst: c, kind: OpKind::And(a, b) });
        c
    }

    /// `a ∨ b`, simplified and hash-consed.
    pub fn make_or(&mut self, a: VarId, b: VarId) -> VarId {
        assert!(self.is_known(a), "unknown literal");
        assert!(self.is_known(b), "unknown literal");

        if a == VarId::ONE || b == VarId::ONE {
            return VarId::ONE;
        }
        if a == VarId::ZERO {
            return b;
        }
        if b == VarId::ZERO {
            return a;
        }
        if a == b {
            return a;
        }
        if self.not_cache.get(&b) == Some(&a) {
            return VarId::ONE;
        }

        let key = (a.min(b), a.max(b));
        if let Some(&cached) = self.or_cache.get(&key) {
            return cached;
        }

        let c = self.new_var();
        self.or_cache.insert(key, c);
        self.record(OpNode { dst: c, kind: OpKind::Or(a, b) });
        c
    }

    /// `a ⊕ b`, simplified and hash-consed.
    pub fn make_xor(&mut self, a: VarId, b: VarId) -> VarId {
        assert!(self.is_known(a), "unknown literal");
        assert!(self.is_known(b), "unknown literal");

        if a == VarId::ZERO {
            return b;
        }
        if b == VarId::ZERO {
            return a;
        }
        if a == VarId::ONE {
            return self.make_not(b);
        }
        if b == VarId::ONE {
            return self.make_not(a);
        }
        if a == b {
            return VarId::ZERO;
        }
        if self.not_cache.get(&b) == Some(&a) {
            return VarId::ONE;
        }

        let key = (a.min(b), a.max(b));
        if let Some(&cached) = self.xor_cache.get(&key) {
            return cached;
        }

        let c = self.new_var();
        self.xor_cache.insert(key, c);
        self.record(OpNode { dst: c, kind: OpKind::Xor(a, b) });
        c
    }

    /// `s ? t : e`, simplified and hash-consed.
    ///
    /// Treated as `(s ∧ t) ∨ (¬s ∧ e)`; every reducible operand
    /// combination is rewritten to a cheaper gate before the cache is
    /// consulted.
    pub fn make_mux(&mut self, s: VarId, t: VarId, e: VarId) -> VarId {
        assert!(self.is_known(s), "unknown literal");
        assert!(self.is_known(t), "unknown literal");
        assert!(self.is_known(e), "unknown literal");

        if s == VarId::ONE {
            return t;
        }
        if s == VarId::ZERO {
            return e;
        }

        if t == e {
            return t;
        }

        if t == VarId::ONE {
            return self.make_or(s, e);
        }
        if t == VarId::ZERO {
            let not_s = self.make_not(s);
            return self.make_and(not_s, e);
        }

        if e == VarId::ONE {
            let not_s = self.make_not(s);
            return self.make_or(not_s, t);
        }
        if e == VarId::ZERO {
            return self.make_and(s, t);
        }

        if self.not_cache.get(&e) == Some(&t) {
            return self.make_xor(s, e);
        }

        if t == s {
            return self.make_or(s, e);
        }
        if self.not_cache.get(&s) == Some(&t) {
            // t = ¬s, so the then-branch never passes: ¬s ∧ e.
            return self.make_and(t, e);
        }

        if e == s {
            return self.make_and(s, t);
        }
        if self.not_cache.get(&s) == Some(&e) {
            // e = ¬s: (s ∧ t) ∨ ¬s = ¬s ∨ t.
            return self.make_or(e, t);
        }

        let key = (s, t, e);
        if let Some(&cached) = self.mux_cache.get(&key) {
            return cached;
        }

        let r = self.new_var();
        self.mux_cache.insert(key, r);
        self.record(OpNode { dst: r, kind: OpKind::Mux { s, t, e } });
        r
    }

    /// Appends raw text to the program buffer, when enabled.
    pub fn push_text(&mut self, chunk: &str) {
        if let Some(text) = self.text.as_mut() {
            text.push_str(chunk);
        }
    }

    /// True when program text is being collected.
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    /// The program text collected so far.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The operand spelling for emitted text: the storage slot when
    /// the variable has one, its temporary name otherwise.
    pub fn idx(&self, var: VarId) -> String {
        assert!(self.is_known(var), "unknown literal");
        match self.emission.get(&var) {
            Some(pos) => format!("{STORAGE}[{pos}]"),
            None => var.to_string(),
        }
    }

    fn record(&mut self, op: OpNode) {
        if self.text.is_some() {
            let line = match op.kind {
                OpKind::Not(a) => {
                    format!("\t#define {} _not({})\n", self.idx(op.dst), self.idx(a))
                }
                OpKind::And(a, b) => format!(
                    "\t#define {} _and({}, {})\n",
                    self.idx(op.dst),
                    self.idx(a),
                    self.idx(b)
                ),
                OpKind::Or(a, b) => format!(
                    "\t#define {} _or({}, {})\n",
                    self.idx(op.dst),
                    self.idx(a),
                    self.idx(b)
                ),
                OpKind::Xor(a, b) => format!(
                    "\t#define {} _xor({}, {})\n",
                    self.idx(op.dst),
                    self.idx(a),
                    self.idx(b)
                ),
                OpKind::Mux { s, t, e } => format!(
                    "\t#define {} _mux({}, {}, {})\n",
                    self.idx(op.dst),
                    self.idx(s),
                    self.idx(e),
                    self.idx(t)
                ),
            };
            self.push_text(&line);
        }
        self.ops.push(op);
    }
}

impl Default for ExprManager {
    fn default() -> ExprManager {
        ExprManager::new()
    }
}
