//! Accumulators over many sites of one population.
//!
//! Sites and codon sites are bucketed by their sample size (the number of
//! strains with a usable symbol there), so θ and Tajima's D use the right
//! harmonic sums even when gaps or ambiguous bases thin out some columns.

use std::collections::BTreeMap;

use crate::composition::CodonComposition;
use crate::path::{PolymorphismCounts, SubstitutionCounts};
use crate::site::SiteComposition;
use crate::statistics;

/// Sample size with the most entries, ties going to the larger size.
fn modal_sample_size<'s>(counts: impl Iterator<Item = (&'s usize, usize)>) -> Option<usize> {
    counts
        .filter(|(_, c)| *c > 0)
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)))
        .map(|(n, _)| *n)
}

#[derive(Debug, Clone, Default, PartialEq)]
struct SiteSums {
    sites: usize,
    segregating: usize,
    mutations: usize,
    singletons: usize,
    pairwise: f64,
    transitions: usize,
    transversions: usize,
    compared: usize,
    fixed: usize,
}

impl SiteSums {
    fn absorb(&mut self, other: &SiteSums) {
        self.sites += other.sites;
        self.segregating += other.segregating;
        self.mutations += other.mutations;
        self.singletons += other.singletons;
        self.pairwise += other.pairwise;
        self.transitions += other.transitions;
        self.transversions += other.transversions;
        self.compared += other.compared;
        self.fixed += other.fixed;
    }
}

/// Nucleotide-site statistics for one population.
#[derive(Debug, Clone, PartialEq)]
pub struct SitesBlock {
    singleton_cutoff: f64,
    by_sample_size: BTreeMap<usize, SiteSums>,
}

impl SitesBlock {
    pub fn new(singleton_cutoff: f64) -> Self {
        Self {
            singleton_cutoff,
            by_sample_size: BTreeMap::new(),
        }
    }

    /// Adds one column. Columns without valid bases are ignored.
    pub fn add_site(&mut self, site: &SiteComposition) -> bool {
        let n = site.valid_bases_count();
        if n == 0 {
            return false;
        }
        let sums = self.by_sample_size.entry(n).or_default();
        let (ts, tv) = site.transitions_transversions();
        sums.sites += 1;
        sums.segregating += usize::from(site.is_polymorphic());
        sums.mutations += site.number_of_polymorphisms();
        sums.singletons += site.number_of_singletons(self.singleton_cutoff);
        sums.pairwise += site.pairwise_differences();
        sums.transitions += ts;
        sums.transversions += tv;
        true
    }

    /// Compares one column with the same column of an outgroup.
    pub fn add_divergence(&mut self, site: &SiteComposition, outgroup: &SiteComposition) -> bool {
        let site_type = SiteComposition::site_type(Some(site), Some(outgroup));
        if site_type.is_invalid() {
            return false;
        }
        let sums = self.by_sample_size.entry(site.valid_bases_count()).or_default();
        sums.compared += 1;
        sums.fixed += usize::from(site_type.is_divergent());
        true
    }

    /// Sums both blocks into a new one; the cutoff of `a` is kept.
    pub fn combine(a: &SitesBlock, b: &SitesBlock) -> SitesBlock {
        let mut combined = a.clone();
        for (n, sums) in &b.by_sample_size {
            combined.by_sample_size.entry(*n).or_default().absorb(sums);
        }
        combined
    }

    fn total<F: Fn(&SiteSums) -> usize>(&self, f: F) -> usize {
        self.by_sample_size.values().map(f).sum()
    }

    /// Sample sizes seen, ascending.
    pub fn sample_sizes(&self) -> Vec<usize> {
        self.by_sample_size.keys().copied().collect()
    }

    pub fn number_of_sites(&self) -> usize {
        self.total(|s| s.sites)
    }

    pub fn segregating_sites(&self) -> usize {
        self.total(|s| s.segregating)
    }

    /// Minimum number of mutations (η).
    pub fn mutations(&self) -> usize {
        self.total(|s| s.mutations)
    }

    pub fn singletons(&self) -> usize {
        self.total(|s| s.singletons)
    }

    pub fn transitions(&self) -> usize {
        self.total(|s| s.transitions)
    }

    pub fn transversions(&self) -> usize {
        self.total(|s| s.transversions)
    }

    pub fn compared_sites(&self) -> usize {
        self.total(|s| s.compared)
    }

    pub fn fixed_differences(&self) -> usize {
        self.total(|s| s.fixed)
    }

    /// Summed per-site mean pairwise differences.
    pub fn pairwise_differences(&self) -> f64 {
        self.by_sample_size.values().map(|s| s.pairwise).sum()
    }

    pub fn pi(&self, jukes_cantor: bool) -> f64 {
        statistics::pi(self.pairwise_differences(), self.number_of_sites() as f64, jukes_cantor)
    }

    /// Watterson's θ per site, each sample size weighted by its own a1.
    pub fn theta(&self, jukes_cantor: bool) -> f64 {
        let theta: f64 = self
            .by_sample_size
            .iter()
            .map(|(&n, s)| statistics::theta(s.segregating as f64, n))
            .sum();
        statistics::per_site(theta, self.number_of_sites() as f64, jukes_cantor)
    }

    /// Tajima's D at the most common sample size.
    pub fn tajima_d(&self) -> f64 {
        let counts = self.by_sample_size.iter().map(|(n, s)| (n, s.sites));
        match modal_sample_size(counts) {
            Some(n) => statistics::tajima_d(n, self.segregating_sites() as f64, self.pairwise_differences()),
            None => f64::NAN,
        }
    }

    pub fn divergence_k(&self, jukes_cantor: bool) -> f64 {
        statistics::divergence_k(
            self.fixed_differences() as f64,
            self.compared_sites() as f64,
            jukes_cantor,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CodonSums {
    codons: usize,
    unresolved: usize,
    synonymous_sites: f64,
    nonsynonymous_sites: f64,
    polymorphisms: PolymorphismCounts,
    segregating: usize,
    singletons: PolymorphismCounts,
    synonymous_pairwise: f64,
    nonsynonymous_pairwise: f64,
    substitutions: SubstitutionCounts,
    compared: usize,
    compared_synonymous_sites: f64,
    compared_nonsynonymous_sites: f64,
    fixed: PolymorphismCounts,
}

impl CodonSums {
    fn absorb(&mut self, other: &CodonSums) {
        self.codons += other.codons;
        self.unresolved += other.unresolved;
        self.synonymous_sites += other.synonymous_sites;
        self.nonsynonymous_sites += other.nonsynonymous_sites;
        self.polymorphisms += other.polymorphisms;
        self.segregating += other.segregating;
        self.singletons += other.singletons;
        self.synonymous_pairwise += other.synonymous_pairwise;
        self.nonsynonymous_pairwise += other.nonsynonymous_pairwise;
        self.substitutions += other.substitutions;
        self.compared += other.compared;
        self.compared_synonymous_sites += other.compared_synonymous_sites;
        self.compared_nonsynonymous_sites += other.compared_nonsynonymous_sites;
        self.fixed += other.fixed;
    }
}

/// Codon-site statistics for one population, split by synonymy.
#[derive(Debug, Clone, PartialEq)]
pub struct CodonsBlock {
    singleton_cutoff: f64,
    by_sample_size: BTreeMap<usize, CodonSums>,
}

impl CodonsBlock {
    pub fn new(singleton_cutoff: f64) -> Self {
        Self {
            singleton_cutoff,
            by_sample_size: BTreeMap::new(),
        }
    }

    /// Adds one codon site.
    ///
    /// Sites without valid codons are ignored; sites whose path could not be
    /// built are counted as unresolved and contribute nothing else.
    pub fn add_codon(&mut self, codon: &CodonComposition<'_>) -> bool {
        let n = codon.valid_codons().len();
        if n == 0 {
            return false;
        }
        let sums = self.by_sample_size.entry(n).or_default();
        if codon.evolutionary_path().is_empty() {
            sums.unresolved += 1;
            return false;
        }

        let site_counts = codon.site_counts();
        let pairwise = codon.pairwise_differences();
        let polymorphisms = codon.number_of_polymorphisms();

        sums.codons += 1;
        sums.synonymous_sites += site_counts.synonymous;
        sums.nonsynonymous_sites += site_counts.nonsynonymous;
        sums.polymorphisms += polymorphisms;
        sums.segregating += usize::from(polymorphisms.total() > 0);
        sums.singletons += codon.number_of_singletons(self.singleton_cutoff);
        sums.synonymous_pairwise += pairwise.synonymous;
        sums.nonsynonymous_pairwise += pairwise.nonsynonymous;
        sums.substitutions += codon.substitutions_count();
        true
    }

    /// Compares one codon site with the same site of an outgroup.
    pub fn add_divergence(&mut self, codon: &CodonComposition<'_>, outgroup: &CodonComposition<'_>) -> bool {
        let Some(fixed) = codon.divergence(outgroup) else {
            return false;
        };
        let (ingroup_sites, outgroup_sites) = (codon.site_counts(), outgroup.site_counts());
        let sums = self.by_sample_size.entry(codon.valid_codons().len()).or_default();
        sums.compared += 1;
        sums.compared_synonymous_sites += (ingroup_sites.synonymous + outgroup_sites.synonymous) / 2.0;
        sums.compared_nonsynonymous_sites += (ingroup_sites.nonsynonymous + outgroup_sites.nonsynonymous) / 2.0;
        sums.fixed += fixed;
        true
    }

    /// Sums both blocks into a new one; the cutoff of `a` is kept.
    pub fn combine(a: &CodonsBlock, b: &CodonsBlock) -> CodonsBlock {
        let mut combined = a.clone();
        for (n, sums) in &b.by_sample_size {
            combined.by_sample_size.entry(*n).or_default().absorb(sums);
        }
        combined
    }

    fn sum_f64<F: Fn(&CodonSums) -> f64>(&self, f: F) -> f64 {
        self.by_sample_size.values().map(f).sum()
    }

    fn sum_counts<F: Fn(&CodonSums) -> PolymorphismCounts>(&self, f: F) -> PolymorphismCounts {
        self.by_sample_size
            .values()
            .fold(PolymorphismCounts::default(), |acc, s| acc + f(s))
    }

    /// Sample sizes seen, ascending.
    pub fn sample_sizes(&self) -> Vec<usize> {
        self.by_sample_size.keys().copied().collect()
    }

    /// Codon sites with a usable path.
    pub fn number_of_codons(&self) -> usize {
        self.by_sample_size.values().map(|s| s.codons).sum()
    }

    /// Codon sites whose observed codons could not be connected.
    pub fn unresolved(&self) -> usize {
        self.by_sample_size.values().map(|s| s.unresolved).sum()
    }

    pub fn synonymous_sites(&self) -> f64 {
        self.sum_f64(|s| s.synonymous_sites)
    }

    pub fn nonsynonymous_sites(&self) -> f64 {
        self.sum_f64(|s| s.nonsynonymous_sites)
    }

    pub fn polymorphisms(&self) -> PolymorphismCounts {
        self.sum_counts(|s| s.polymorphisms)
    }

    pub fn singletons(&self) -> PolymorphismCounts {
        self.sum_counts(|s| s.singletons)
    }

    pub fn substitutions(&self) -> SubstitutionCounts {
        let mut total = SubstitutionCounts::default();
        for s in self.by_sample_size.values() {
            total += s.substitutions;
        }
        total
    }

    pub fn compared_codons(&self) -> usize {
        self.by_sample_size.values().map(|s| s.compared).sum()
    }

    pub fn fixed_differences(&self) -> PolymorphismCounts {
        self.sum_counts(|s| s.fixed)
    }

    pub fn pi_synonymous(&self, jukes_cantor: bool) -> f64 {
        statistics::pi(self.sum_f64(|s| s.synonymous_pairwise), self.synonymous_sites(), jukes_cantor)
    }

    pub fn pi_nonsynonymous(&self, jukes_cantor: bool) -> f64 {
        statistics::pi(self.sum_f64(|s| s.nonsynonymous_pairwise), self.nonsynonymous_sites(), jukes_cantor)
    }

    fn theta_of<F: Fn(&CodonSums) -> usize>(&self, mutations: F, sites: f64, jukes_cantor: bool) -> f64 {
        let theta: f64 = self
            .by_sample_size
            .iter()
            .map(|(&n, s)| statistics::theta(mutations(s) as f64, n))
            .sum();
        statistics::per_site(theta, sites, jukes_cantor)
    }

    /// Watterson's θ per synonymous site, from synonymous mutations.
    pub fn theta_synonymous(&self, jukes_cantor: bool) -> f64 {
        self.theta_of(|s| s.polymorphisms.synonymous, self.synonymous_sites(), jukes_cantor)
    }

    pub fn theta_nonsynonymous(&self, jukes_cantor: bool) -> f64 {
        self.theta_of(|s| s.polymorphisms.nonsynonymous, self.nonsynonymous_sites(), jukes_cantor)
    }

    /// Tajima's D over all codon mutations at the most common sample size.
    pub fn tajima_d(&self) -> f64 {
        let counts = self.by_sample_size.iter().map(|(n, s)| (n, s.codons));
        let Some(n) = modal_sample_size(counts) else {
            return f64::NAN;
        };
        let pi = self.sum_f64(|s| s.synonymous_pairwise + s.nonsynonymous_pairwise);
        statistics::tajima_d(n, self.polymorphisms().total() as f64, pi)
    }

    pub fn k_synonymous(&self, jukes_cantor: bool) -> f64 {
        statistics::divergence_k(
            self.fixed_differences().synonymous as f64,
            self.sum_f64(|s| s.compared_synonymous_sites),
            jukes_cantor,
        )
    }

    pub fn k_nonsynonymous(&self, jukes_cantor: bool) -> f64 {
        statistics::divergence_k(
            self.fixed_differences().nonsynonymous as f64,
            self.sum_f64(|s| s.compared_nonsynonymous_sites),
            jukes_cantor,
        )
    }
}
