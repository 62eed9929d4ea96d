//! Build hashing for checkpoint compatibility.

use std::fmt;

/// A 64-byte hash identifying one emitted run program.
///
/// Checkpoints carry this hash at their head; loading a checkpoint
/// produced by a different program (different netlist, testbench, or
/// word size) is rejected. The value is 64 ASCII-hex bytes derived
/// from two seeded XXH3-128 digests of the emitted program text, so it
/// stays readable in a hex dump of the checkpoint file.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BuildHash([u8; 64]);

impl BuildHash {
    /// Computes the hash of an emitted program text.
    pub fn of_text(text: &str) -> Self {
        let lo = xxhash_rust::xxh3::xxh3_128_with_seed(text.as_bytes(), 0);
        let hi = xxhash_rust::xxh3::xxh3_128_with_seed(text.as_bytes(), 1);
        let hex = format!("{lo:032x}{hi:032x}");
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(hex.as_bytes());
        Self(bytes)
    }

    /// Reconstructs a hash from its stored 64-byte form.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// The raw 64-byte form written to checkpoint files.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Display for BuildHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for BuildHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BuildHash({}{}..)",
            self.0[0] as char, self.0[1] as char
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = BuildHash::of_text("void run_circuit() {}");
        let b = BuildHash::of_text("void run_circuit() {}");
        assert_eq!(a, b);
    }

    #[test]
    fn different_programs_differ() {
        let a = BuildHash::of_text("program a");
        let b = BuildHash::of_text("program b");
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_hex() {
        let h = BuildHash::of_text("x");
        let s = h.to_string();
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn byte_roundtrip() {
        let h = BuildHash::of_text("roundtrip");
        let back = BuildHash::from_bytes(*h.as_bytes());
        assert_eq!(h, back);
    }
}
