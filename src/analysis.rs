//! Per-population analysis of a coding alignment.
//!
//! [`analyze`] walks every codon column once per ingroup population, builds
//! a [`CodonComposition`] from the strains' triplets and feeds it to a
//! [`CodonsBlock`], while the three nucleotide columns it covers go to a
//! [`SitesBlock`]. When an outgroup population is named, each codon column
//! of the ingroup is also compared against the outgroup's column.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::block::{CodonsBlock, SitesBlock};
use crate::composition::CodonComposition;
use crate::genetic_code::{genetic_codes, CodonTable};
use crate::model::{AlignmentError, CodingAlignment, Strain};
use crate::path_finder::DEFAULT_SEARCH_BUDGET;

/// Errors raised by [`analyze`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Unknown genetic code: {0}")]
    UnknownGeneticCode(u8),

    #[error("Singleton cutoff must be in (0, 1] (got {0})")]
    InvalidCutoff(f64),

    #[error("Outgroup population '{0}' not found in alignment")]
    UnknownOutgroup(String),

    #[error("No population left to analyze besides the outgroup")]
    NoIngroup,

    #[error(transparent)]
    Alignment(#[from] AlignmentError),
}

/// Settings of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// NCBI translation table id
    pub genetic_code: u8,
    /// Allow stop codons in and along evolutionary paths
    pub include_terminal: bool,
    /// Apply the Jukes-Cantor correction to π, θ and K
    pub jukes_cantor: bool,
    /// Frequency below which an allele is a singleton; 0.5 or more means
    /// "seen exactly once"
    pub singleton_cutoff: f64,
    /// Population used as outgroup for divergence
    pub outgroup: Option<String>,
    /// Node budget for each codon path search
    pub search_budget: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            genetic_code: 1,
            include_terminal: false,
            jukes_cantor: false,
            singleton_cutoff: 0.5,
            outgroup: None,
            search_budget: DEFAULT_SEARCH_BUDGET,
        }
    }
}

/// Fixed differences between a population and the outgroup.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceSummary {
    pub outgroup: String,
    /// Nucleotide sites usable on both sides
    pub sites_compared: usize,
    pub fixed_differences: usize,
    /// Nucleotide divergence per site
    pub k: f64,
    /// Codon sites usable on both sides
    pub codons_compared: usize,
    pub synonymous_differences: usize,
    pub nonsynonymous_differences: usize,
    pub k_synonymous: f64,
    pub k_nonsynonymous: f64,
}

/// Statistics of one population.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSummary {
    pub population: String,
    pub strains: usize,

    /// Codon sites with a usable path
    pub codons_analyzed: usize,
    /// Codon sites whose codons could not be connected
    pub codons_unresolved: usize,

    pub sites: usize,
    pub segregating_sites: usize,
    pub mutations: usize,
    pub singletons: usize,
    pub pi: f64,
    pub theta: f64,
    pub tajima_d: f64,

    pub synonymous_sites: f64,
    pub nonsynonymous_sites: f64,
    pub synonymous_polymorphisms: usize,
    pub nonsynonymous_polymorphisms: usize,
    pub synonymous_singletons: usize,
    pub nonsynonymous_singletons: usize,
    pub transitions: usize,
    pub transversions: usize,
    pub pi_synonymous: f64,
    pub pi_nonsynonymous: f64,
    pub theta_synonymous: f64,
    pub theta_nonsynonymous: f64,
    pub codon_tajima_d: f64,

    pub divergence: Option<DivergenceSummary>,
}

impl PopulationSummary {
    fn from_blocks(
        population: &str,
        strains: usize,
        sites: &SitesBlock,
        codons: &CodonsBlock,
        outgroup: Option<&str>,
        jukes_cantor: bool,
    ) -> Self {
        let polymorphisms = codons.polymorphisms();
        let singletons = codons.singletons();
        let substitutions = codons.substitutions();

        let divergence = outgroup.map(|name| {
            let fixed = codons.fixed_differences();
            DivergenceSummary {
                outgroup: name.to_string(),
                sites_compared: sites.compared_sites(),
                fixed_differences: sites.fixed_differences(),
                k: sites.divergence_k(jukes_cantor),
                codons_compared: codons.compared_codons(),
                synonymous_differences: fixed.synonymous,
                nonsynonymous_differences: fixed.nonsynonymous,
                k_synonymous: codons.k_synonymous(jukes_cantor),
                k_nonsynonymous: codons.k_nonsynonymous(jukes_cantor),
            }
        });

        Self {
            population: population.to_string(),
            strains,
            codons_analyzed: codons.number_of_codons(),
            codons_unresolved: codons.unresolved(),
            sites: sites.number_of_sites(),
            segregating_sites: sites.segregating_sites(),
            mutations: sites.mutations(),
            singletons: sites.singletons(),
            pi: sites.pi(jukes_cantor),
            theta: sites.theta(jukes_cantor),
            tajima_d: sites.tajima_d(),
            synonymous_sites: codons.synonymous_sites(),
            nonsynonymous_sites: codons.nonsynonymous_sites(),
            synonymous_polymorphisms: polymorphisms.synonymous,
            nonsynonymous_polymorphisms: polymorphisms.nonsynonymous,
            synonymous_singletons: singletons.synonymous,
            nonsynonymous_singletons: singletons.nonsynonymous,
            transitions: substitutions.transitions(),
            transversions: substitutions.transversions(),
            pi_synonymous: codons.pi_synonymous(jukes_cantor),
            pi_nonsynonymous: codons.pi_nonsynonymous(jukes_cantor),
            theta_synonymous: codons.theta_synonymous(jukes_cantor),
            theta_nonsynonymous: codons.theta_nonsynonymous(jukes_cantor),
            codon_tajima_d: codons.tajima_d(),
            divergence,
        }
    }
}

/// Builds the composition of codon column `index` over `strains`.
///
/// Returns the composition and the number of rejected triplets.
fn codon_column<'a>(
    table: &'a dyn CodonTable,
    options: &AnalysisOptions,
    strains: &[&Strain],
    index: usize,
) -> (CodonComposition<'a>, usize) {
    let mut composition =
        CodonComposition::new(table, options.include_terminal).with_search_budget(options.search_budget);
    let mut rejected = 0;
    for strain in strains {
        let accepted = strain
            .codon(index)
            .map_or(false, |triplet| composition.add_codon(triplet));
        if !accepted {
            rejected += 1;
        }
    }
    (composition, rejected)
}

fn validate(alignment: &CodingAlignment, options: &AnalysisOptions) -> Result<&'static dyn CodonTable, AnalysisError> {
    let table = genetic_codes()
        .get(options.genetic_code)
        .ok_or(AnalysisError::UnknownGeneticCode(options.genetic_code))?;
    if !(options.singleton_cutoff > 0.0 && options.singleton_cutoff <= 1.0) {
        return Err(AnalysisError::InvalidCutoff(options.singleton_cutoff));
    }
    if let Some(outgroup) = &options.outgroup {
        if !alignment.has_population(outgroup) {
            return Err(AnalysisError::UnknownOutgroup(outgroup.clone()));
        }
    }
    Ok(table)
}

/// Computes one [`PopulationSummary`] per ingroup population, in the order
/// populations first appear in the alignment.
pub fn analyze(alignment: &CodingAlignment, options: &AnalysisOptions) -> Result<Vec<PopulationSummary>, AnalysisError> {
    let table = validate(alignment, options)?;
    let outgroup_name = options.outgroup.as_deref();

    let ingroups: Vec<&str> = alignment
        .populations()
        .into_iter()
        .filter(|p| Some(*p) != outgroup_name)
        .collect();
    if ingroups.is_empty() {
        return Err(AnalysisError::NoIngroup);
    }

    let codon_count = alignment.codon_count();
    info!(
        strains = alignment.strain_count(),
        populations = ingroups.len(),
        codons = codon_count,
        genetic_code = options.genetic_code,
        "analyzing coding alignment"
    );

    let outgroup_columns: Vec<CodonComposition<'static>> = match outgroup_name {
        Some(name) => {
            let strains = alignment.population(name);
            (0..codon_count)
                .map(|i| codon_column(table, options, &strains, i).0)
                .collect()
        }
        None => Vec::new(),
    };

    let mut summaries = Vec::with_capacity(ingroups.len());
    for population in ingroups {
        let strains = alignment.population(population);
        let mut sites = SitesBlock::new(options.singleton_cutoff);
        let mut codons = CodonsBlock::new(options.singleton_cutoff);
        let mut rejected = 0;

        for i in 0..codon_count {
            let (column, bad) = codon_column(table, options, &strains, i);
            rejected += bad;

            for pos in 0..3 {
                sites.add_site(column.site(pos));
            }
            codons.add_codon(&column);

            if let Some(outgroup) = outgroup_columns.get(i) {
                for pos in 0..3 {
                    sites.add_divergence(column.site(pos), outgroup.site(pos));
                }
                codons.add_divergence(&column, outgroup);
            }
        }

        if rejected > 0 {
            warn!(population, rejected, "triplets with unsupported symbols skipped");
        }
        debug!(
            population,
            codons = codons.number_of_codons(),
            unresolved = codons.unresolved(),
            "population done"
        );

        summaries.push(PopulationSummary::from_blocks(
            population,
            strains.len(),
            &sites,
            &codons,
            outgroup_name,
            options.jukes_cantor,
        ));
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alignment(rows: &[(&str, &str)]) -> CodingAlignment {
        let strains = rows
            .iter()
            .enumerate()
            .map(|(i, (pop, seq))| Strain::new(format!("s{}", i + 1), *pop, *seq))
            .collect();
        CodingAlignment::new(strains).unwrap()
    }

    fn sample() -> CodingAlignment {
        alignment(&[
            ("in", "AAACCC"),
            ("in", "AAGCCC"),
            ("in", "AAACCC"),
            ("in", "AAACCC"),
            ("out", "GAACCC"),
        ])
    }

    #[test]
    fn test_default_options() {
        let options = AnalysisOptions::default();
        assert_eq!(options.genetic_code, 1);
        assert!(!options.include_terminal);
        assert!(!options.jukes_cantor);
        assert_eq!(options.singleton_cutoff, 0.5);
        assert!(options.outgroup.is_none());
        assert_eq!(options.search_budget, DEFAULT_SEARCH_BUDGET);
    }

    #[test]
    fn test_invalid_options() {
        let data = sample();
        let options = AnalysisOptions {
            genetic_code: 7,
            ..Default::default()
        };
        assert_eq!(analyze(&data, &options).unwrap_err(), AnalysisError::UnknownGeneticCode(7));

        let options = AnalysisOptions {
            singleton_cutoff: 0.0,
            ..Default::default()
        };
        assert_eq!(analyze(&data, &options).unwrap_err(), AnalysisError::InvalidCutoff(0.0));

        let options = AnalysisOptions {
            outgroup: Some("east".into()),
            ..Default::default()
        };
        assert_eq!(
            analyze(&data, &options).unwrap_err(),
            AnalysisError::UnknownOutgroup("east".into())
        );

        let single = alignment(&[("out", "AAA")]);
        let options = AnalysisOptions {
            outgroup: Some("out".into()),
            ..Default::default()
        };
        assert_eq!(analyze(&single, &options).unwrap_err(), AnalysisError::NoIngroup);
    }

    #[test]
    fn test_polymorphism_summary() {
        let summaries = analyze(&sample(), &AnalysisOptions::default()).unwrap();
        assert_eq!(summaries.len(), 2);

        let s = &summaries[0];
        assert_eq!(s.population, "in");
        assert_eq!(s.strains, 4);
        assert_eq!(s.codons_analyzed, 2);
        assert_eq!(s.codons_unresolved, 0);
        assert_eq!(s.sites, 6);
        assert_eq!(s.segregating_sites, 1);
        assert_eq!(s.singletons, 1);
        assert!((s.pi - 0.5 / 6.0).abs() < 1e-12);
        assert_eq!(s.synonymous_polymorphisms, 1);
        assert_eq!(s.nonsynonymous_polymorphisms, 0);
        assert_eq!(s.synonymous_singletons, 1);
        assert_eq!(s.transitions, 1);
        assert!(s.divergence.is_none());
        assert!(s.tajima_d.is_finite());

        let out = &summaries[1];
        assert_eq!(out.population, "out");
        assert_eq!(out.segregating_sites, 0);
        assert_eq!(out.pi, 0.0);
    }

    #[test]
    fn test_outgroup_divergence() {
        let options = AnalysisOptions {
            outgroup: Some("out".into()),
            ..Default::default()
        };
        let summaries = analyze(&sample(), &options).unwrap();
        assert_eq!(summaries.len(), 1);

        let d = summaries[0].divergence.as_ref().unwrap();
        assert_eq!(d.outgroup, "out");
        assert_eq!(d.sites_compared, 6);
        assert_eq!(d.fixed_differences, 1);
        assert!((d.k - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(d.codons_compared, 2);
        // GAA (Glu) to AAA (Lys)
        assert_eq!(d.synonymous_differences, 0);
        assert_eq!(d.nonsynonymous_differences, 1);
        assert_eq!(d.k_synonymous, 0.0);
        assert!(d.k_nonsynonymous > 0.0);
    }

    #[test]
    fn test_stop_codons_unresolved() {
        let data = alignment(&[("p", "TAACCC"), ("p", "TATCCC")]);
        let s = &analyze(&data, &AnalysisOptions::default()).unwrap()[0];
        assert_eq!(s.codons_analyzed, 1);
        assert_eq!(s.codons_unresolved, 1);

        let options = AnalysisOptions {
            include_terminal: true,
            ..Default::default()
        };
        let s = &analyze(&data, &options).unwrap()[0];
        assert_eq!(s.codons_analyzed, 2);
        assert_eq!(s.nonsynonymous_polymorphisms, 1);
    }

    #[test]
    fn test_unsupported_symbols_are_skipped() {
        let data = alignment(&[("p", "AAA"), ("p", "ARA"), ("p", "AAG")]);
        let s = &analyze(&data, &AnalysisOptions::default()).unwrap()[0];
        assert_eq!(s.codons_analyzed, 1);
        assert_eq!(s.synonymous_polymorphisms, 1);
    }
}
