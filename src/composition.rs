//! Codons observed at one codon site of a population sample.
//!
//! A [`CodonComposition`] is filled with one triplet per strain. Valid
//! triplets become [`Codon`]s; triplets with gaps, `N` or `X` are only
//! counted. The composition also keeps one [`SiteComposition`] per codon
//! position and a lazily computed [`EvolutionaryPath`] through its distinct
//! codons, which drives the polymorphism, singleton and divergence counts.

use std::collections::HashMap;

use once_cell::unsync::OnceCell;
use thiserror::Error;
use tracing::debug;

use crate::codon::Codon;
use crate::genetic_code::CodonTable;
use crate::path::{EvolutionaryPath, PolymorphismCounts, SubstitutionCounts};
use crate::path_finder::{PathFinder, DEFAULT_SEARCH_BUDGET};
use crate::site::{SiteComposition, SiteType};

/// Errors raised when combining two compositions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("Cannot merge codon sites using different genetic codes ({first} and {second})")]
    IncompatibleTable { first: u8, second: u8 },

    #[error("Cannot merge codon sites using two different genetic codes that share id {0}")]
    ConflictingTables(u8),

    #[error("Cannot merge codon sites with different terminal codon policies")]
    IncompatibleTerminalPolicy,
}

/// True if both tables give the same answer for every codon and codon pair.
fn same_table(a: &dyn CodonTable, b: &dyn CodonTable) -> bool {
    if std::ptr::eq(a as *const dyn CodonTable as *const (), b as *const dyn CodonTable as *const ()) {
        return true;
    }
    Codon::all().all(|x| {
        a.is_terminal(x) == b.is_terminal(x)
            && a.is_start_codon(x) == b.is_start_codon(x)
            && Codon::all().all(|y| a.are_synonymous(x, y) == b.are_synonymous(x, y))
    })
}

/// Nei-Gojobori synonymous and nonsynonymous site counts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SiteCounts {
    pub synonymous: f64,
    pub nonsynonymous: f64,
}

/// Mean differences over all pairs of sampled codons.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairwiseDifferences {
    pub synonymous: f64,
    pub nonsynonymous: f64,
    pub nucleotide: f64,
    /// Pairs that contributed to the means
    pub pairs: usize,
}

/// Codons sampled at one codon site.
#[derive(Debug, Clone)]
pub struct CodonComposition<'a> {
    table: &'a dyn CodonTable,
    include_terminal: bool,
    search_budget: usize,
    codons: Vec<Codon>,
    gaps: usize,
    ns: usize,
    xs: usize,
    total: usize,
    sites: [SiteComposition; 3],
    path: OnceCell<EvolutionaryPath<'a>>,
}

impl<'a> CodonComposition<'a> {
    pub fn new(table: &'a dyn CodonTable, include_terminal: bool) -> Self {
        Self {
            table,
            include_terminal,
            search_budget: DEFAULT_SEARCH_BUDGET,
            codons: Vec::new(),
            gaps: 0,
            ns: 0,
            xs: 0,
            total: 0,
            sites: Default::default(),
            path: OnceCell::new(),
        }
    }

    /// Caps the path search performed for this site.
    pub fn with_search_budget(mut self, search_budget: usize) -> Self {
        self.search_budget = search_budget;
        self.path = OnceCell::new();
        self
    }

    pub fn table(&self) -> &'a dyn CodonTable {
        self.table
    }

    pub fn include_terminal(&self) -> bool {
        self.include_terminal
    }

    /// Records one triplet.
    ///
    /// Rejects anything that is not three symbols from `A, C, G, T, N, X, -`
    /// (any case). Accepted triplets always update the per-position
    /// compositions; only fully resolved ones become codons.
    pub fn add_codon(&mut self, sequence: &str) -> bool {
        let bytes = sequence.as_bytes();
        if bytes.len() != 3 {
            return false;
        }
        let upper = [
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ];
        if !upper.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T' | b'N' | b'X' | b'-')) {
            return false;
        }

        for (site, &b) in self.sites.iter_mut().zip(upper.iter()) {
            site.add_base(b);
        }
        self.total += 1;

        match Codon::from_bases(upper) {
            Some(codon) => {
                self.codons.push(codon);
                self.path = OnceCell::new();
            }
            None if upper.contains(&b'-') => self.gaps += 1,
            None if upper.contains(&b'N') => self.ns += 1,
            None => self.xs += 1,
        }
        true
    }

    /// Valid codons in insertion order, duplicates included.
    pub fn valid_codons(&self) -> &[Codon] {
        &self.codons
    }

    /// Valid codons without duplicates, in first-seen order.
    pub fn distinct_codons(&self) -> Vec<Codon> {
        let mut seen = 0u64;
        self.codons
            .iter()
            .copied()
            .filter(|c| {
                let new = seen & c.mask() == 0;
                seen |= c.mask();
                new
            })
            .collect()
    }

    /// True when no valid codon was recorded.
    pub fn is_empty(&self) -> bool {
        self.codons.is_empty()
    }

    pub fn gaps(&self) -> usize {
        self.gaps
    }

    pub fn ns(&self) -> usize {
        self.ns
    }

    pub fn xs(&self) -> usize {
        self.xs
    }

    /// Accepted triplets, valid or not.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Composition of codon position `pos` (0, 1 or 2).
    pub fn site(&self, pos: usize) -> &SiteComposition {
        &self.sites[pos]
    }

    pub fn path_finder(&self) -> PathFinder<'a> {
        PathFinder::new(self.table, self.include_terminal).with_search_budget(self.search_budget)
    }

    /// Minimal path through the distinct codons, computed once per content.
    pub fn evolutionary_path(&self) -> &EvolutionaryPath<'a> {
        self.path.get_or_init(|| {
            let distinct = self.distinct_codons();
            debug!(codons = distinct.len(), "computing evolutionary path");
            self.path_finder()
                .find_path(&distinct)
                .unwrap_or_else(|| EvolutionaryPath::new(self.table))
        })
    }

    /// True when more than one distinct codon was sampled.
    pub fn is_polymorphic(&self) -> bool {
        self.distinct_codons().len() > 1
    }

    /// Synonymous and nonsynonymous mutations along the path.
    pub fn number_of_polymorphisms(&self) -> PolymorphismCounts {
        self.evolutionary_path().polymorphism_counts()
    }

    /// Path steps split by synonymy and transition/transversion.
    pub fn substitutions_count(&self) -> SubstitutionCounts {
        self.evolutionary_path().substitution_counts()
    }

    /// Distinct codons carrying a rare base at some position.
    pub fn singletons(&self, cutoff: f64) -> Vec<Codon> {
        self.distinct_codons()
            .into_iter()
            .filter(|c| (0..3).any(|pos| self.sites[pos].is_rare_base(c.base(pos), cutoff)))
            .collect()
    }

    /// Rare-base mutations classified by the path step that produced them.
    pub fn number_of_singletons(&self, cutoff: f64) -> PolymorphismCounts {
        let mut counts = PolymorphismCounts::default();
        let path = self.evolutionary_path();
        if path.is_empty() {
            return counts;
        }

        let distinct = self.distinct_codons();
        for (pos, site) in self.sites.iter().enumerate() {
            let cap = site.number_of_singletons(cutoff);
            let mut seen_bases: Vec<u8> = Vec::with_capacity(4);
            for &codon in &distinct {
                if seen_bases.len() == cap {
                    break;
                }
                let base = codon.base(pos);
                if seen_bases.contains(&base) || !site.is_rare_base(base, cutoff) {
                    continue;
                }
                seen_bases.push(base);
                if path.is_position_change_synonymous(codon, pos) {
                    counts.synonymous += 1;
                } else {
                    counts.nonsynonymous += 1;
                }
            }
        }
        counts
    }

    /// Mean synonymous and nonsynonymous sites over the sampled codons.
    ///
    /// Without terminal codons, substitutions leading to a stop are not
    /// counted as sites and sampled stop codons are left out.
    pub fn site_counts(&self) -> SiteCounts {
        let mut counted = 0usize;
        let mut synonymous = 0usize;
        let mut nonsynonymous = 0usize;
        for &codon in &self.codons {
            if !self.include_terminal && self.table.is_terminal(codon) {
                continue;
            }
            counted += 1;
            for &n in self.table.neighbors(codon) {
                if self.table.are_synonymous(codon, n) {
                    synonymous += 1;
                } else if self.include_terminal || !self.table.is_terminal(n) {
                    nonsynonymous += 1;
                }
            }
        }
        if counted == 0 {
            return SiteCounts::default();
        }
        let scale = 3.0 * counted as f64;
        SiteCounts {
            synonymous: synonymous as f64 / scale,
            nonsynonymous: nonsynonymous as f64 / scale,
        }
    }

    pub fn synonymous_sites(&self) -> f64 {
        self.site_counts().synonymous
    }

    pub fn nonsynonymous_sites(&self) -> f64 {
        self.site_counts().nonsynonymous
    }

    /// Mean pairwise differences between sampled codons.
    ///
    /// Each pair of distinct codons is classified with its own two-codon
    /// path; pairs that cannot be connected are left out.
    pub fn pairwise_differences(&self) -> PairwiseDifferences {
        let n = self.codons.len();
        if n < 2 {
            return PairwiseDifferences::default();
        }

        let distinct = self.distinct_codons();
        let counts: Vec<usize> = distinct
            .iter()
            .map(|d| self.codons.iter().filter(|&&c| c == *d).count())
            .collect();
        let finder = self.path_finder();

        let mut pairs = counts.iter().map(|&c| c * (c - 1) / 2).sum::<usize>();
        let mut synonymous = 0usize;
        let mut nonsynonymous = 0usize;
        let mut nucleotide = 0usize;
        let mut classified: HashMap<(Codon, Codon), Option<PolymorphismCounts>> = HashMap::new();

        for i in 0..distinct.len() {
            for j in (i + 1)..distinct.len() {
                let key = (distinct[i].min(distinct[j]), distinct[i].max(distinct[j]));
                let steps = *classified.entry(key).or_insert_with(|| {
                    finder
                        .find_path(&[key.0, key.1])
                        .filter(|p| !p.is_empty())
                        .map(|p| p.polymorphism_counts())
                });
                let Some(steps) = steps else {
                    continue;
                };
                let weight = counts[i] * counts[j];
                pairs += weight;
                synonymous += weight * steps.synonymous;
                nonsynonymous += weight * steps.nonsynonymous;
                nucleotide += weight * distinct[i].differences(distinct[j]);
            }
        }

        if pairs == 0 {
            return PairwiseDifferences::default();
        }
        PairwiseDifferences {
            synonymous: synonymous as f64 / pairs as f64,
            nonsynonymous: nonsynonymous as f64 / pairs as f64,
            nucleotide: nucleotide as f64 / pairs as f64,
            pairs,
        }
    }

    /// Classifies a codon site observed in two populations.
    pub fn site_type(a: Option<&CodonComposition<'_>>, b: Option<&CodonComposition<'_>>) -> SiteType {
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => (a, b),
            _ => return SiteType::INVALID,
        };
        let (path_a, path_b) = (a.evolutionary_path(), b.evolutionary_path());
        if path_a.is_empty() || path_b.is_empty() {
            return SiteType::INVALID;
        }

        let mut site_type = SiteType::MONOMORPHIC;
        if a.is_polymorphic() {
            site_type |= SiteType::POLYMORPHIC_FIRST;
        }
        if b.is_polymorphic() {
            site_type |= SiteType::POLYMORPHIC_SECOND;
        }
        if !path_a.codons().iter().any(|&c| path_b.contains(c)) {
            site_type |= SiteType::DIVERGENT;
        }
        site_type
    }

    /// Fixed differences against an outgroup sample at the same codon site.
    ///
    /// Returns `None` when either side has no usable codon, zero counts when
    /// the site is not divergent, and otherwise the counts of the closest
    /// outgroup-to-ingroup path.
    pub fn divergence(&self, outgroup: &CodonComposition<'_>) -> Option<PolymorphismCounts> {
        let site_type = Self::site_type(Some(self), Some(outgroup));
        if site_type.is_invalid() {
            return None;
        }
        if !site_type.is_divergent() {
            return Some(PolymorphismCounts::default());
        }

        let finder = self.path_finder();
        let ingroup = self.distinct_codons();
        let mut best: Option<EvolutionaryPath<'a>> = None;
        for codon in outgroup.distinct_codons() {
            let Some(path) = finder.find_best_path(codon, &ingroup) else {
                continue;
            };
            if path.is_empty() {
                continue;
            }
            let better = match &best {
                None => true,
                Some(b) => {
                    let (n, bn) = (path.nonsynonymous_count(), b.nonsynonymous_count());
                    n < bn || (n == bn && path.len() < b.len())
                }
            };
            if better {
                best = Some(path);
            }
        }
        best.map(|p| p.polymorphism_counts())
    }

    /// Combines two samples of the same codon site.
    ///
    /// Both must use the same genetic code and terminal codon policy. Tables
    /// sharing an id must also agree on every codon.
    pub fn merge(a: &CodonComposition<'a>, b: &CodonComposition<'a>) -> Result<CodonComposition<'a>, CompositionError> {
        if a.table.id() != b.table.id() {
            return Err(CompositionError::IncompatibleTable {
                first: a.table.id(),
                second: b.table.id(),
            });
        }
        if !same_table(a.table, b.table) {
            return Err(CompositionError::ConflictingTables(a.table.id()));
        }
        if a.include_terminal != b.include_terminal {
            return Err(CompositionError::IncompatibleTerminalPolicy);
        }

        let mut merged = CodonComposition::new(a.table, a.include_terminal)
            .with_search_budget(a.search_budget.max(b.search_budget));
        merged.codons = a.codons.iter().chain(b.codons.iter()).copied().collect();
        merged.gaps = a.gaps + b.gaps;
        merged.ns = a.ns + b.ns;
        merged.xs = a.xs + b.xs;
        merged.total = a.total + b.total;
        for pos in 0..3 {
            merged.sites[pos] = a.sites[pos].clone();
            merged.sites[pos].absorb(&b.sites[pos]);
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetic_code::{genetic_codes, GeneticCode};

    fn composition(codons: &[&str]) -> CodonComposition<'static> {
        let mut c = CodonComposition::new(GeneticCode::standard(), false);
        for s in codons {
            assert!(c.add_codon(s), "rejected {}", s);
        }
        c
    }

    fn codon(s: &str) -> Codon {
        s.parse().unwrap()
    }

    #[test]
    fn test_add_codon_validation() {
        let mut c = CodonComposition::new(GeneticCode::standard(), false);
        assert!(c.add_codon("AAA"));
        assert!(c.add_codon("aat"));
        assert!(c.add_codon("AN-"));
        assert!(c.add_codon("ANN"));
        assert!(c.add_codon("AXX"));
        assert!(!c.add_codon("AA"));
        assert!(!c.add_codon("AAAA"));
        assert!(!c.add_codon("ABC"));
        assert!(!c.add_codon("AAU"));

        assert_eq!(c.valid_codons(), &[codon("AAA"), codon("AAT")]);
        assert_eq!(c.gaps(), 1);
        assert_eq!(c.ns(), 1);
        assert_eq!(c.xs(), 1);
        assert_eq!(c.total(), 5);
        // Position compositions see every accepted triplet
        assert_eq!(c.site(0).count(b'A'), 5);
        assert_eq!(c.site(2).count(b'T'), 1);
        assert_eq!(c.site(2).gaps(), 1);
    }

    #[test]
    fn test_path_cache() {
        let mut c = composition(&["AAA", "AAT"]);
        let first = c.evolutionary_path() as *const EvolutionaryPath<'_>;
        let second = c.evolutionary_path() as *const EvolutionaryPath<'_>;
        assert!(std::ptr::eq(first, second));
        assert_eq!(c.evolutionary_path().len(), 2);

        c.add_codon("ATA");
        assert_eq!(c.evolutionary_path().len(), 3);
        assert_eq!(c.evolutionary_path().to_string(), "AAT->AAA->ATA");
    }

    #[test]
    fn test_duplicates_kept_but_path_deduplicated() {
        let c = composition(&["AAA", "AAT", "AAA", "ATA", "AAT"]);
        assert_eq!(c.valid_codons().len(), 5);
        assert_eq!(c.distinct_codons(), vec![codon("AAA"), codon("AAT"), codon("ATA")]);
        assert_eq!(c.number_of_polymorphisms(), PolymorphismCounts::new(0, 2));
        let subs = c.substitutions_count();
        assert_eq!(subs.nonsynonymous_transversions, 2);
        assert_eq!(subs.transitions(), 0);
    }

    #[test]
    fn test_monomorphic_site() {
        let c = composition(&["GGG", "GGG", "---"]);
        assert!(!c.is_polymorphic());
        assert_eq!(c.number_of_polymorphisms().total(), 0);
        assert_eq!(c.number_of_singletons(0.5).total(), 0);
        assert!(c.singletons(0.5).is_empty());
    }

    #[test]
    fn test_singletons() {
        let c = composition(&["AAA", "AAA", "AAA", "AAT"]);
        assert_eq!(c.singletons(0.5), vec![codon("AAT")]);
        assert_eq!(c.number_of_singletons(0.5), PolymorphismCounts::new(0, 1));
        assert!(c.singletons(0.2).is_empty());

        let c = composition(&["AAA", "AAA", "AAA", "AAG"]);
        assert_eq!(c.number_of_singletons(0.5), PolymorphismCounts::new(1, 0));
    }

    #[test]
    fn test_site_counts() {
        let c = composition(&["AAA"]);
        let counts = c.site_counts();
        // Only AAG among the nine neighbors of AAA is synonymous; TAA is a stop
        assert!((counts.synonymous - 1.0 / 3.0).abs() < 1e-12);
        assert!((counts.nonsynonymous - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(composition(&[]).site_counts(), SiteCounts::default());

        let mut with = CodonComposition::new(GeneticCode::standard(), true);
        with.add_codon("AAA");
        assert!((with.synonymous_sites() + with.nonsynonymous_sites() - 3.0).abs() < 1e-12);

        // A sampled stop is left out without terminal codons
        assert_eq!(composition(&["TAA"]).site_counts(), SiteCounts::default());
    }

    #[test]
    fn test_pairwise_differences() {
        let c = composition(&["AAA", "AAA", "AAG", "AAT"]);
        let diffs = c.pairwise_differences();
        assert_eq!(diffs.pairs, 6);
        assert!((diffs.synonymous - 2.0 / 6.0).abs() < 1e-12);
        assert!((diffs.nonsynonymous - 3.0 / 6.0).abs() < 1e-12);
        assert!((diffs.nucleotide - 5.0 / 6.0).abs() < 1e-12);

        assert_eq!(composition(&["AAA"]).pairwise_differences().pairs, 0);
    }

    #[test]
    fn test_site_type() {
        let a = composition(&["AAA", "AAG"]);
        let b = composition(&["GAA"]);
        let c = composition(&["AAA"]);
        let empty = composition(&["---"]);

        assert_eq!(CodonComposition::site_type(Some(&a), None), SiteType::INVALID);
        assert_eq!(CodonComposition::site_type(Some(&a), Some(&empty)), SiteType::INVALID);
        assert_eq!(
            CodonComposition::site_type(Some(&a), Some(&b)),
            SiteType::POLYMORPHIC_FIRST | SiteType::DIVERGENT
        );
        assert_eq!(CodonComposition::site_type(Some(&c), Some(&c)), SiteType::MONOMORPHIC);
        assert_eq!(CodonComposition::site_type(Some(&c), Some(&a)), SiteType::POLYMORPHIC_SECOND);
    }

    #[test]
    fn test_divergence() {
        let ingroup = composition(&["AAA", "AAG"]);
        // GAA (Glu) reaches AAA (Lys) in one nonsynonymous step
        let outgroup = composition(&["GAA"]);
        assert_eq!(ingroup.divergence(&outgroup), Some(PolymorphismCounts::new(0, 1)));

        let shared = composition(&["AAA"]);
        assert_eq!(ingroup.divergence(&shared), Some(PolymorphismCounts::default()));
        assert_eq!(ingroup.divergence(&composition(&["NNN"])), None);
    }

    #[test]
    fn test_merge() {
        let a = composition(&["AAA", "A-A"]);
        let b = composition(&["AAT", "NAA"]);
        let merged = CodonComposition::merge(&a, &b).unwrap();
        assert_eq!(merged.valid_codons(), &[codon("AAA"), codon("AAT")]);
        assert_eq!(merged.gaps(), 1);
        assert_eq!(merged.ns(), 1);
        assert_eq!(merged.total(), 4);
        assert_eq!(merged.site(0).count(b'A'), 3);
        assert_eq!(merged.evolutionary_path().len(), 2);
    }

    #[test]
    fn test_merge_incompatible() {
        let a = composition(&["AAA"]);
        let mito = CodonComposition::new(genetic_codes().get(2).unwrap(), false);
        assert_eq!(
            CodonComposition::merge(&a, &mito).unwrap_err(),
            CompositionError::IncompatibleTable { first: 1, second: 2 }
        );

        let all_lysine = GeneticCode::custom(1, "All lysine", &"K".repeat(64), &["ATG"]).unwrap();
        let copy = GeneticCode::custom(
            1,
            "Standard copy",
            "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
            &["TTG", "CTG", "ATG"],
        )
        .unwrap();
        let mut standard = CodonComposition::new(GeneticCode::standard(), false);
        standard.add_codon("AAA");
        let mut relabeled = CodonComposition::new(&all_lysine, false);
        relabeled.add_codon("AAT");
        assert_eq!(
            CodonComposition::merge(&standard, &relabeled).unwrap_err(),
            CompositionError::ConflictingTables(1)
        );

        let mut same = CodonComposition::new(&copy, false);
        same.add_codon("AAT");
        assert!(CodonComposition::merge(&standard, &same).is_ok());

        let terminal = CodonComposition::new(GeneticCode::standard(), true);
        assert_eq!(
            CodonComposition::merge(&a, &terminal).unwrap_err(),
            CompositionError::IncompatibleTerminalPolicy
        );
    }

    #[test]
    fn test_terminal_codon_excluded() {
        let c = composition(&["TAA", "TAT"]);
        assert!(c.evolutionary_path().is_empty());
        assert_eq!(c.number_of_polymorphisms().total(), 0);

        let mut with = CodonComposition::new(GeneticCode::standard(), true);
        with.add_codon("TAA");
        with.add_codon("TAT");
        assert_eq!(with.number_of_polymorphisms().nonsynonymous, 1);
    }
}
