//! Codon values and the single-substitution codon graph.
//!
//! A [`Codon`] is a small copyable handle into a fixed registry of the 64
//! possible nucleotide triplets over `A`, `C`, `G`, `T`. Equality is index
//! equality, and the nine single-substitution neighbors of every codon are
//! computed once per process so adjacency queries are a table lookup.
//!
//! Ambiguity codes, `N`, `X` and gaps are never represented as a `Codon`;
//! callers filter them out before decoding.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use thiserror::Error;

/// Nucleotides in registry order. A codon index is `b0 * 16 + b1 * 4 + b2`.
pub const NUCLEOTIDES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Errors raised when decoding a codon from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodonParseError {
    #[error("Codon must have exactly 3 nucleotides (got {0})")]
    WrongLength(usize),

    #[error("Invalid nucleotide '{0}' in codon")]
    InvalidBase(char),
}

/// One of the 64 nucleotide triplets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Codon(u8);

/// Neighbor lists, position-major, alternative bases in registry order.
static NEIGHBORS: Lazy<[[Codon; 9]; 64]> = Lazy::new(|| {
    let mut table = [[Codon(0); 9]; 64];
    for (index, slot) in table.iter_mut().enumerate() {
        let codon = Codon(index as u8);
        let mut n = 0;
        for pos in 0..3 {
            let own = codon.base_index(pos);
            for alt in 0..4 {
                if alt != own {
                    slot[n] = codon.with_base_index(pos, alt);
                    n += 1;
                }
            }
        }
    }
    table
});

impl Codon {
    /// Number of distinct codons.
    pub const COUNT: usize = 64;

    /// Returns the codon with the given registry index.
    pub fn from_index(index: usize) -> Option<Self> {
        (index < Self::COUNT).then_some(Self(index as u8))
    }

    /// Decodes three nucleotide bytes. `U` is read as `T`; case is ignored.
    pub fn from_bases(bases: [u8; 3]) -> Option<Self> {
        let mut index = 0usize;
        for b in bases {
            index = index * 4 + base_index(b)?;
        }
        Some(Self(index as u8))
    }

    /// Parses a 3-letter codon string.
    pub fn parse(s: &str) -> Result<Self, CodonParseError> {
        let bytes = s.as_bytes();
        if s.chars().count() != 3 || bytes.len() != 3 {
            return Err(CodonParseError::WrongLength(s.chars().count()));
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii() || base_index(*c as u8).is_none()) {
            return Err(CodonParseError::InvalidBase(bad));
        }
        Self::from_bases([bytes[0], bytes[1], bytes[2]])
            .ok_or(CodonParseError::InvalidBase(s.chars().next().unwrap_or('?')))
    }

    /// Iterates over all 64 codons in registry order.
    pub fn all() -> impl Iterator<Item = Codon> {
        (0..Self::COUNT as u8).map(Codon)
    }

    /// Registry index in `0..64`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Uppercase nucleotide bytes.
    pub fn bases(self) -> [u8; 3] {
        [self.base(0), self.base(1), self.base(2)]
    }

    /// Nucleotide at `pos` (0, 1 or 2).
    #[inline]
    pub fn base(self, pos: usize) -> u8 {
        NUCLEOTIDES[self.base_index(pos)]
    }

    #[inline]
    fn base_index(self, pos: usize) -> usize {
        (self.0 as usize >> (2 * (2 - pos))) & 3
    }

    fn with_base_index(self, pos: usize, base: usize) -> Codon {
        let shift = 2 * (2 - pos);
        let cleared = self.0 as usize & !(3 << shift);
        Codon((cleared | (base << shift)) as u8)
    }

    /// The nine codons that differ from this one at exactly one position.
    #[inline]
    pub fn neighbors(self) -> &'static [Codon; 9] {
        &NEIGHBORS[self.index()]
    }

    /// Number of positions at which the two codons differ.
    pub fn differences(self, other: Codon) -> usize {
        (0..3)
            .filter(|&pos| self.base_index(pos) != other.base_index(pos))
            .count()
    }

    /// True if the codons differ at exactly one position.
    #[inline]
    pub fn is_neighbor(self, other: Codon) -> bool {
        self.differences(other) == 1
    }

    /// The position where the codons differ, if they differ at exactly one.
    pub fn differing_position(self, other: Codon) -> Option<usize> {
        let mut found = None;
        for pos in 0..3 {
            if self.base_index(pos) != other.base_index(pos) {
                if found.is_some() {
                    return None;
                }
                found = Some(pos);
            }
        }
        found
    }

    /// Single-bit mask used for set operations over the 64 codons.
    #[inline]
    pub(crate) fn mask(self) -> u64 {
        1u64 << self.0
    }
}

impl fmt::Display for Codon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.bases();
        write!(f, "{}{}{}", a as char, b as char, c as char)
    }
}

impl fmt::Debug for Codon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Codon({})", self)
    }
}

impl FromStr for Codon {
    type Err = CodonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Codon::parse(s)
    }
}

/// Registry index of a nucleotide, accepting lowercase and `U`.
#[inline]
pub fn base_index(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' | b'U' => Some(3),
        _ => None,
    }
}

/// Purine-purine or pyrimidine-pyrimidine change (A<->G, C<->T).
#[inline]
pub fn is_transition(a: u8, b: u8) -> bool {
    matches!(
        (a.to_ascii_uppercase(), b.to_ascii_uppercase()),
        (b'A', b'G') | (b'G', b'A') | (b'C', b'T') | (b'T', b'C')
    )
}

/// Any other change between two distinct nucleotides.
#[inline]
pub fn is_transversion(a: u8, b: u8) -> bool {
    match (base_index(a), base_index(b)) {
        (Some(x), Some(y)) => x != y && !is_transition(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codon(s: &str) -> Codon {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(codon("atg").to_string(), "ATG");
        assert_eq!(codon("AUG"), codon("ATG"));
        assert_eq!(Codon::parse("AT"), Err(CodonParseError::WrongLength(2)));
        assert_eq!(Codon::parse("ANG"), Err(CodonParseError::InvalidBase('N')));
        assert_eq!(Codon::parse("A-G"), Err(CodonParseError::InvalidBase('-')));
    }

    #[test]
    fn test_registry_covers_all_triplets() {
        let all: Vec<Codon> = Codon::all().collect();
        assert_eq!(all.len(), 64);
        assert_eq!(all[0], codon("AAA"));
        assert_eq!(all[63], codon("TTT"));
        for c in all {
            assert_eq!(Codon::from_bases(c.bases()), Some(c));
            assert_eq!(Codon::from_index(c.index()), Some(c));
        }
        assert_eq!(Codon::from_index(64), None);
    }

    #[test]
    fn test_neighbors_of_aaa() {
        let names: Vec<String> = codon("AAA").neighbors().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            names,
            ["CAA", "GAA", "TAA", "ACA", "AGA", "ATA", "AAC", "AAG", "AAT"]
        );
    }

    #[test]
    fn test_neighbor_symmetry() {
        for x in Codon::all() {
            assert_eq!(x.neighbors().len(), 9);
            for &y in x.neighbors() {
                assert_ne!(x, y);
                assert!(y.neighbors().contains(&x));
                assert_eq!(x.differences(y), 1);
            }
        }
    }

    #[test]
    fn test_differing_position() {
        assert_eq!(codon("AAA").differing_position(codon("ATA")), Some(1));
        assert_eq!(codon("AAT").differing_position(codon("ATA")), None);
        assert_eq!(codon("AAA").differing_position(codon("AAA")), None);
        assert_eq!(codon("AAT").differences(codon("ATA")), 2);
    }

    #[test]
    fn test_transition_classification() {
        assert!(is_transition(b'A', b'G'));
        assert!(is_transition(b'c', b'T'));
        assert!(!is_transition(b'A', b'T'));
        assert!(is_transversion(b'A', b'T'));
        assert!(is_transversion(b'G', b'C'));
        assert!(!is_transversion(b'A', b'A'));
        assert!(!is_transversion(b'A', b'N'));
    }
}
