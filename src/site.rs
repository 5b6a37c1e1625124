//! Nucleotide composition of a single alignment column.
//!
//! A [`SiteComposition`] counts the symbols observed in one column across
//! the sampled strains and answers the per-site diversity questions the
//! statistics layer needs (alleles, polymorphisms, singletons, mean
//! pairwise differences). [`SiteType`] classifies a pair of columns drawn
//! from two populations and is shared with codon sites.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::codon::{is_transition, NUCLEOTIDES};

const GAP: usize = 4;
const N: usize = 5;
const X: usize = 6;

/// Counts of `A`, `C`, `G`, `T`, gap, `N` and `X` in one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteComposition {
    counts: [usize; 7],
}

/// Bucket for an input symbol. `U` counts as `T`, `.` as a gap and `?` as `X`.
fn bucket(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' | b'U' => Some(3),
        b'-' | b'.' => Some(GAP),
        b'N' => Some(N),
        b'X' | b'?' => Some(X),
        _ => None,
    }
}

/// True if an allele seen `count` times out of `total` is rare under `cutoff`.
///
/// A cutoff of 0.5 or more means "seen exactly once"; below that the
/// allele frequency must not exceed the cutoff.
pub(crate) fn is_rare(count: usize, total: usize, cutoff: f64) -> bool {
    if count == 0 || total == 0 {
        return false;
    }
    if cutoff >= 0.5 {
        count == 1
    } else {
        (count as f64 / total as f64) <= cutoff
    }
}

impl SiteComposition {
    /// Creates an empty composition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a composition from a column of symbols, skipping unknown ones.
    pub fn from_column(column: &[u8]) -> Self {
        let mut site = Self::new();
        for &b in column {
            site.add_base(b);
        }
        site
    }

    /// Records one symbol. Returns false for symbols outside
    /// `A/C/G/T/U`, gap, `N` and `X`.
    pub fn add_base(&mut self, base: u8) -> bool {
        match bucket(base) {
            Some(b) => {
                self.counts[b] += 1;
                true
            }
            None => false,
        }
    }

    /// Count for a nucleotide or special symbol (0 for unknown symbols).
    pub fn count(&self, base: u8) -> usize {
        bucket(base).map_or(0, |b| self.counts[b])
    }

    pub fn gaps(&self) -> usize {
        self.counts[GAP]
    }

    pub fn ns(&self) -> usize {
        self.counts[N]
    }

    pub fn xs(&self) -> usize {
        self.counts[X]
    }

    /// `A + C + G + T`.
    pub fn valid_bases_count(&self) -> usize {
        self.counts[..4].iter().sum()
    }

    /// Every symbol recorded, valid or not.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Counts of `A`, `C`, `G`, `T` in that order.
    pub fn base_counts(&self) -> [usize; 4] {
        [self.counts[0], self.counts[1], self.counts[2], self.counts[3]]
    }

    /// Number of distinct nucleotides observed.
    pub fn number_of_alleles(&self) -> usize {
        self.counts[..4].iter().filter(|&&c| c > 0).count()
    }

    pub fn is_polymorphic(&self) -> bool {
        self.number_of_alleles() > 1
    }

    /// Minimum number of mutations explaining the column.
    pub fn number_of_polymorphisms(&self) -> usize {
        self.number_of_alleles().saturating_sub(1)
    }

    /// Number of rare-allele mutations, never more than the polymorphisms.
    pub fn number_of_singletons(&self, cutoff: f64) -> usize {
        let total = self.valid_bases_count();
        let rare = self.counts[..4]
            .iter()
            .filter(|&&c| is_rare(c, total, cutoff))
            .count();
        rare.min(self.number_of_polymorphisms())
    }

    /// True if `base` is a rare allele in this column.
    pub fn is_rare_base(&self, base: u8, cutoff: f64) -> bool {
        match bucket(base) {
            Some(b) if b < 4 => self.is_polymorphic() && is_rare(self.counts[b], self.valid_bases_count(), cutoff),
            _ => false,
        }
    }

    /// Mean number of differences over all pairs of valid bases (per-site π).
    pub fn pairwise_differences(&self) -> f64 {
        let n = self.valid_bases_count();
        if n < 2 {
            return 0.0;
        }
        let mut differing = 0usize;
        for i in 0..4 {
            for j in (i + 1)..4 {
                differing += self.counts[i] * self.counts[j];
            }
        }
        differing as f64 / (n * (n - 1) / 2) as f64
    }

    /// The most frequent nucleotide, ties resolved in `A, C, G, T` order.
    pub fn major_allele(&self) -> Option<u8> {
        let mut best: Option<(usize, usize)> = None;
        for (i, &c) in self.counts[..4].iter().enumerate() {
            if c > 0 && best.map_or(true, |(_, bc)| c > bc) {
                best = Some((i, c));
            }
        }
        best.map(|(i, _)| NUCLEOTIDES[i])
    }

    /// Transitions and transversions between the major allele and each
    /// minor allele.
    pub fn transitions_transversions(&self) -> (usize, usize) {
        let Some(major) = self.major_allele() else {
            return (0, 0);
        };
        let mut ts = 0;
        let mut tv = 0;
        for (i, &c) in self.counts[..4].iter().enumerate() {
            let base = NUCLEOTIDES[i];
            if c == 0 || base == major {
                continue;
            }
            if is_transition(major, base) {
                ts += 1;
            } else {
                tv += 1;
            }
        }
        (ts, tv)
    }

    /// Adds the counts of `other` into `self`.
    pub fn absorb(&mut self, other: &SiteComposition) {
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += b;
        }
    }

    /// Classifies a column observed in two populations.
    pub fn site_type(a: Option<&SiteComposition>, b: Option<&SiteComposition>) -> SiteType {
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) if a.valid_bases_count() > 0 && b.valid_bases_count() > 0 => (a, b),
            _ => return SiteType::INVALID,
        };

        let mut site_type = SiteType::MONOMORPHIC;
        if a.is_polymorphic() {
            site_type |= SiteType::POLYMORPHIC_FIRST;
        }
        if b.is_polymorphic() {
            site_type |= SiteType::POLYMORPHIC_SECOND;
        }
        let shared = (0..4).any(|i| a.counts[i] > 0 && b.counts[i] > 0);
        if !shared {
            site_type |= SiteType::DIVERGENT;
        }
        site_type
    }
}

/// Flag set describing a site compared across two populations.
///
/// `MONOMORPHIC` is the empty set: it holds only when no other flag does.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SiteType(u8);

impl SiteType {
    pub const MONOMORPHIC: SiteType = SiteType(0);
    pub const INVALID: SiteType = SiteType(1);
    pub const POLYMORPHIC_FIRST: SiteType = SiteType(1 << 1);
    pub const POLYMORPHIC_SECOND: SiteType = SiteType(1 << 2);
    pub const DIVERGENT: SiteType = SiteType(1 << 3);

    /// True if every flag of `other` is set; `MONOMORPHIC` matches only itself.
    pub fn contains(self, other: SiteType) -> bool {
        if other.0 == 0 {
            self.0 == 0
        } else {
            self.0 & other.0 == other.0
        }
    }

    pub fn is_invalid(self) -> bool {
        self.contains(SiteType::INVALID)
    }

    pub fn is_monomorphic(self) -> bool {
        self.0 == 0
    }

    pub fn is_divergent(self) -> bool {
        self.contains(SiteType::DIVERGENT)
    }

    pub fn is_polymorphic(self) -> bool {
        self.0 & (Self::POLYMORPHIC_FIRST.0 | Self::POLYMORPHIC_SECOND.0) != 0
    }
}

impl BitOr for SiteType {
    type Output = SiteType;

    fn bitor(self, rhs: SiteType) -> SiteType {
        SiteType(self.0 | rhs.0)
    }
}

impl BitOrAssign for SiteType {
    fn bitor_assign(&mut self, rhs: SiteType) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_monomorphic() {
            return write!(f, "SiteType(MONOMORPHIC)");
        }
        let names: Vec<&str> = [
            (SiteType::INVALID, "INVALID"),
            (SiteType::POLYMORPHIC_FIRST, "POLYMORPHIC_FIRST"),
            (SiteType::POLYMORPHIC_SECOND, "POLYMORPHIC_SECOND"),
            (SiteType::DIVERGENT, "DIVERGENT"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
        write!(f, "SiteType({})", names.join(" | "))
    }
}
