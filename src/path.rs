//! Evolutionary paths through the codon graph.
//!
//! An [`EvolutionaryPath`] is a walk over single-substitution steps. Each
//! codon carries a flag telling whether it was actually sampled at the site
//! or only introduced as an intermediate to connect the sampled codons.
//! Every step of a path is classified against the path's genetic code.

use std::fmt;
use std::ops::{Add, AddAssign};

use crate::codon::{is_transition, Codon};
use crate::genetic_code::CodonTable;

/// Synonymous and nonsynonymous mutation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolymorphismCounts {
    pub synonymous: usize,
    pub nonsynonymous: usize,
}

impl PolymorphismCounts {
    pub fn new(synonymous: usize, nonsynonymous: usize) -> Self {
        Self { synonymous, nonsynonymous }
    }

    pub fn total(&self) -> usize {
        self.synonymous + self.nonsynonymous
    }
}

impl Add for PolymorphismCounts {
    type Output = PolymorphismCounts;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.synonymous + rhs.synonymous, self.nonsynonymous + rhs.nonsynonymous)
    }
}

impl AddAssign for PolymorphismCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Substitutions split by synonymy and by transition/transversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionCounts {
    pub synonymous_transitions: usize,
    pub synonymous_transversions: usize,
    pub nonsynonymous_transitions: usize,
    pub nonsynonymous_transversions: usize,
}

impl SubstitutionCounts {
    pub fn transitions(&self) -> usize {
        self.synonymous_transitions + self.nonsynonymous_transitions
    }

    pub fn transversions(&self) -> usize {
        self.synonymous_transversions + self.nonsynonymous_transversions
    }

    pub fn total(&self) -> usize {
        self.transitions() + self.transversions()
    }
}

impl AddAssign for SubstitutionCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.synonymous_transitions += rhs.synonymous_transitions;
        self.synonymous_transversions += rhs.synonymous_transversions;
        self.nonsynonymous_transitions += rhs.nonsynonymous_transitions;
        self.nonsynonymous_transversions += rhs.nonsynonymous_transversions;
    }
}

/// A walk through the codon graph with per-codon "observed" flags.
///
/// Consecutive codons differ at exactly one position when the path comes
/// from [`PathFinder`](crate::path_finder::PathFinder). A zero-length path
/// means no path could be built.
#[derive(Clone)]
pub struct EvolutionaryPath<'a> {
    table: &'a dyn CodonTable,
    codons: Vec<Codon>,
    observed: Vec<bool>,
}

impl<'a> EvolutionaryPath<'a> {
    /// Creates an empty path classified with `table`.
    pub fn new(table: &'a dyn CodonTable) -> Self {
        Self::with_capacity(table, 0)
    }

    pub fn with_capacity(table: &'a dyn CodonTable, capacity: usize) -> Self {
        Self {
            table,
            codons: Vec::with_capacity(capacity),
            observed: Vec::with_capacity(capacity),
        }
    }

    /// Appends a codon. Returns false when there is no codon to append.
    pub fn append(&mut self, codon: Option<Codon>, observed: bool) -> bool {
        match codon {
            Some(codon) => {
                self.push(codon, observed);
                true
            }
            None => false,
        }
    }

    pub(crate) fn push(&mut self, codon: Codon, observed: bool) {
        self.codons.push(codon);
        self.observed.push(observed);
    }

    /// The genetic code used to classify steps.
    pub fn table(&self) -> &'a dyn CodonTable {
        self.table
    }

    /// Number of codons in the path.
    pub fn len(&self) -> usize {
        self.codons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codons.is_empty()
    }

    pub fn codons(&self) -> &[Codon] {
        &self.codons
    }

    /// Whether the codon at `index` was sampled.
    pub fn is_observed(&self, index: usize) -> Option<bool> {
        self.observed.get(index).copied()
    }

    pub fn contains(&self, codon: Codon) -> bool {
        self.codons.contains(&codon)
    }

    /// Sampled codons in path order.
    pub fn observed_codons(&self) -> impl Iterator<Item = Codon> + '_ {
        self.codons
            .iter()
            .zip(self.observed.iter())
            .filter(|(_, o)| **o)
            .map(|(&c, _)| c)
    }

    /// Number of intermediate codons that were not sampled.
    pub fn transient_count(&self) -> usize {
        self.observed.iter().filter(|&&o| !o).count()
    }

    /// Consecutive codon pairs.
    pub fn steps(&self) -> impl Iterator<Item = (Codon, Codon)> + '_ {
        self.codons.windows(2).map(|w| (w[0], w[1]))
    }

    /// Synonymous and nonsynonymous steps; they add up to `len() - 1`.
    pub fn polymorphism_counts(&self) -> PolymorphismCounts {
        let mut counts = PolymorphismCounts::default();
        for (a, b) in self.steps() {
            if self.table.are_synonymous(a, b) {
                counts.synonymous += 1;
            } else {
                counts.nonsynonymous += 1;
            }
        }
        counts
    }

    pub fn nonsynonymous_count(&self) -> usize {
        self.steps()
            .filter(|&(a, b)| !self.table.are_synonymous(a, b))
            .count()
    }

    /// Steps split by synonymy and by transition/transversion.
    ///
    /// Steps that do not differ at exactly one position are skipped.
    pub fn substitution_counts(&self) -> SubstitutionCounts {
        let mut counts = SubstitutionCounts::default();
        for (a, b) in self.steps() {
            let Some(pos) = a.differing_position(b) else {
                continue;
            };
            let transition = is_transition(a.base(pos), b.base(pos));
            match (self.table.are_synonymous(a, b), transition) {
                (true, true) => counts.synonymous_transitions += 1,
                (true, false) => counts.synonymous_transversions += 1,
                (false, true) => counts.nonsynonymous_transitions += 1,
                (false, false) => counts.nonsynonymous_transversions += 1,
            }
        }
        counts
    }

    /// True if `codon` is in the path and is synonymous with its
    /// predecessor or successor.
    pub fn is_substitution_synonymous(&self, codon: Codon) -> bool {
        if self.codons.len() < 2 {
            return false;
        }
        let Some(i) = self.codons.iter().position(|&c| c == codon) else {
            return false;
        };
        let before = i > 0 && self.table.are_synonymous(self.codons[i - 1], codon);
        let after = i + 1 < self.codons.len() && self.table.are_synonymous(codon, self.codons[i + 1]);
        before || after
    }

    /// Classifies the step entering or leaving `codon` that changes `position`.
    ///
    /// Falls back to [`is_substitution_synonymous`](Self::is_substitution_synonymous)
    /// when no adjacent step changes that position.
    pub fn is_position_change_synonymous(&self, codon: Codon, position: usize) -> bool {
        if let Some(i) = self.codons.iter().position(|&c| c == codon) {
            let prev = i.checked_sub(1).map(|j| self.codons[j]);
            let next = self.codons.get(i + 1).copied();
            for other in [prev, next].into_iter().flatten() {
                if codon.differing_position(other) == Some(position) {
                    return self.table.are_synonymous(codon, other);
                }
            }
        }
        self.is_substitution_synonymous(codon)
    }

    pub fn contains_terminal_codons(&self) -> bool {
        self.codons.iter().any(|&c| self.table.is_terminal(c))
    }
}

impl PartialEq for EvolutionaryPath<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.codons == other.codons && self.observed == other.observed
    }
}

impl fmt::Display for EvolutionaryPath<'_> {
    /// Observed codons print bare, intermediates in parentheses.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (codon, observed)) in self.codons.iter().zip(self.observed.iter()).enumerate() {
            if i > 0 {
                write!(f, "->")?;
            }
            if *observed {
                write!(f, "{}", codon)?;
            } else {
                write!(f, "({})", codon)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for EvolutionaryPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvolutionaryPath[{}]", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetic_code::GeneticCode;

    fn codon(s: &str) -> Codon {
        s.parse().unwrap()
    }

    fn path_of(codons: &[(&str, bool)]) -> EvolutionaryPath<'static> {
        let mut path = EvolutionaryPath::new(GeneticCode::standard());
        for (c, observed) in codons {
            assert!(path.append(Some(codon(c)), *observed));
        }
        path
    }

    #[test]
    fn test_append_rejects_missing_codon() {
        let mut path = EvolutionaryPath::new(GeneticCode::standard());
        assert!(!path.append(None, true));
        assert!(path.is_empty());
        assert_eq!(path.polymorphism_counts(), PolymorphismCounts::default());
        assert_eq!(path.substitution_counts(), SubstitutionCounts::default());
    }

    #[test]
    fn test_polymorphism_counts() {
        // Asn -> Lys -> Lys -> Met
        let path = path_of(&[("AAT", true), ("AAA", true), ("AAG", false), ("ATG", true)]);
        let counts = path.polymorphism_counts();
        assert_eq!(counts, PolymorphismCounts::new(1, 2));
        assert_eq!(counts.total(), path.len() - 1);
        assert_eq!(path.nonsynonymous_count(), 2);
        assert_eq!(path.transient_count(), 1);
        assert_eq!(path.observed_codons().count(), 3);
    }

    #[test]
    fn test_substitution_counts() {
        // AAT->AAC: T/C transition, synonymous (Asn)
        // AAC->AAA: C/A transversion, nonsynonymous (Asn -> Lys)
        // AAA->GAA: A/G transition, nonsynonymous (Lys -> Glu)
        let path = path_of(&[("AAT", true), ("AAC", true), ("AAA", true), ("GAA", true)]);
        let counts = path.substitution_counts();
        assert_eq!(counts.synonymous_transitions, 1);
        assert_eq!(counts.synonymous_transversions, 0);
        assert_eq!(counts.nonsynonymous_transitions, 1);
        assert_eq!(counts.nonsynonymous_transversions, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_is_substitution_synonymous() {
        let path = path_of(&[("AAT", true), ("AAC", true), ("AAA", true)]);
        assert!(path.is_substitution_synonymous(codon("AAT")));
        assert!(path.is_substitution_synonymous(codon("AAC")));
        assert!(!path.is_substitution_synonymous(codon("AAA")));
        assert!(!path.is_substitution_synonymous(codon("GGG")));

        let single = path_of(&[("AAT", true)]);
        assert!(!single.is_substitution_synonymous(codon("AAT")));
    }

    #[test]
    fn test_position_change_classification() {
        // AAT-AAC changes position 2 (syn), AAC-ATC changes position 1 (Asn -> Ile)
        let path = path_of(&[("AAT", true), ("AAC", false), ("ATC", true)]);
        assert!(!path.is_position_change_synonymous(codon("AAC"), 1));
        assert!(path.is_position_change_synonymous(codon("AAC"), 2));
        assert!(!path.is_position_change_synonymous(codon("ATC"), 1));
    }

    #[test]
    fn test_terminal_detection_and_display() {
        let path = path_of(&[("TAT", true), ("TAA", false), ("AAA", true)]);
        assert!(path.contains_terminal_codons());
        assert_eq!(path.to_string(), "TAT->(TAA)->AAA");
        assert!(!path_of(&[("AAA", true)]).contains_terminal_codons());
    }
}
