//! W-lane machine words for bit-sliced circuit simulation.
//!
//! A [`Word`] packs `LANES` independent boolean experiments into one
//! value; every boolean operation acts on all lanes at once. The lane
//! count is fixed at build time through the `w64`/`w128`/`w256`/`w512`
//! cargo features so that kernel buffers can be sized and aligned as
//! constants.

use rand::Rng;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// Number of parallel lanes in a [`Word`].
#[cfg(feature = "w512")]
pub const LANES: u32 = 512;
/// Number of parallel lanes in a [`Word`].
#[cfg(all(feature = "w256", not(feature = "w512")))]
pub const LANES: u32 = 256;
/// Number of parallel lanes in a [`Word`].
#[cfg(all(feature = "w128", not(any(feature = "w256", feature = "w512"))))]
pub const LANES: u32 = 128;
/// Number of parallel lanes in a [`Word`].
#[cfg(not(any(feature = "w128", feature = "w256", feature = "w512")))]
pub const LANES: u32 = 64;

/// Number of `u64` limbs backing a [`Word`].
pub const LIMBS: usize = (LANES as usize) / 64;

/// A W-lane machine word: `LANES` boolean experiments evaluated in
/// parallel, one bit per lane.
///
/// All operations are pure and lane-wise. `Word` is `Copy`, so kernel
/// code moves values freely without aliasing concerns.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Word([u64; LIMBS]);

impl Word {
    /// The word with every lane cleared.
    pub const ZEROS: Word = Word([0; LIMBS]);
    /// The word with every lane set.
    pub const ONES: Word = Word([u64::MAX; LIMBS]);

    /// Returns `ONES` when `bit` is set, `ZEROS` otherwise.
    ///
    /// Used to fix a single boolean value uniformly across all lanes.
    pub fn splat(bit: bool) -> Word {
        if bit {
            Word::ONES
        } else {
            Word::ZEROS
        }
    }

    /// Lane-wise AND.
    pub fn and(self, other: Word) -> Word {
        let mut out = [0u64; LIMBS];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a & b;
        }
        Word(out)
    }

    /// Lane-wise OR.
    pub fn or(self, other: Word) -> Word {
        let mut out = [0u64; LIMBS];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a | b;
        }
        Word(out)
    }

    /// Lane-wise XOR.
    pub fn xor(self, other: Word) -> Word {
        let mut out = [0u64; LIMBS];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a ^ b;
        }
        Word(out)
    }

    /// Lane-wise complement.
    pub fn invert(self) -> Word {
        let mut out = [0u64; LIMBS];
        for (o, a) in out.iter_mut().zip(self.0.iter()) {
            *o = !a;
        }
        Word(out)
    }

    /// Lane-wise select: `(s ∧ t) ∨ (¬s ∧ e)`.
    ///
    /// Each lane of `s` picks the corresponding lane of `t` when set
    /// and of `e` when clear.
    pub fn mux(s: Word, e: Word, t: Word) -> Word {
        s.and(t).or(s.invert().and(e))
    }

    /// Number of set lanes across the whole word.
    pub fn popcount(self) -> u64 {
        self.0.iter().map(|l| u64::from(l.count_ones())).sum()
    }

    /// Fills every lane with an independent uniform random bit.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Word {
        let mut limbs = [0u64; LIMBS];
        for limb in &mut limbs {
            *limb = rng.gen();
        }
        Word(limbs)
    }
}

impl BitAnd for Word {
    type Output = Word;
    fn bitand(self, rhs: Word) -> Word {
        self.and(rhs)
    }
}

impl BitOr for Word {
    type Output = Word;
    fn bitor(self, rhs: Word) -> Word {
        self.or(rhs)
    }
}

impl BitXor for Word {
    type Output = Word;
    fn bitxor(self, rhs: Word) -> Word {
        self.xor(rhs)
    }
}

impl Not for Word {
    type Output = Word;
    fn not(self) -> Word {
        self.invert()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn lanes_is_power_of_two() {
        assert!(LANES.is_power_of_two());
        assert!(LANES >= 64);
        assert_eq!(LIMBS as u32 * 64, LANES);
    }

    #[test]
    fn constants_popcount() {
        assert_eq!(Word::ZEROS.popcount(), 0);
        assert_eq!(Word::ONES.popcount(), u64::from(LANES));
    }

    #[test]
    fn splat_selects_constant() {
        assert_eq!(Word::splat(true), Word::ONES);
        assert_eq!(Word::splat(false), Word::ZEROS);
    }

    #[test]
    fn boolean_identities() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Word::random(&mut rng);
        assert_eq!(a & Word::ZEROS, Word::ZEROS);
        assert_eq!(a | Word::ONES, Word::ONES);
        assert_eq!(a ^ a, Word::ZEROS);
        assert_eq!(a & !a, Word::ZEROS);
        assert_eq!(a | !a, Word::ONES);
        assert_eq!(!!a, a);
    }

    #[test]
    fn mux_selects_per_lane() {
        let mut rng = StdRng::seed_from_u64(11);
        let e = Word::random(&mut rng);
        let t = Word::random(&mut rng);
        assert_eq!(Word::mux(Word::ONES, e, t), t);
        assert_eq!(Word::mux(Word::ZEROS, e, t), e);
        let s = Word::random(&mut rng);
        let m = Word::mux(s, e, t);
        assert_eq!(m, (s & t) | (!s & e));
    }

    #[test]
    fn popcount_sums_lanes() {
        let mut rng = StdRng::seed_from_u64(23);
        let a = Word::random(&mut rng);
        let b = !a;
        assert_eq!(a.popcount() + b.popcount(), u64::from(LANES));
    }

    #[test]
    fn random_words_differ() {
        let mut rng = StdRng::seed_from_u64(31);
        let a = Word::random(&mut rng);
        let b = Word::random(&mut rng);
        assert_ne!(a, b);
    }
}
