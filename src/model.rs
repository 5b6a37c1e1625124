//! Data model for coding alignments sampled from several populations.
//!
//! This module contains:
//! - Strains: one aligned coding sequence tagged with its population
//! - Coding alignments: equal-length strains cut into codon columns

use thiserror::Error;
use tracing::warn;

/// Errors raised while assembling a coding alignment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("Alignment contains no strains")]
    Empty,

    #[error("Sequences have different lengths (min: {min}, max: {max}). Not a valid alignment.")]
    UnequalLengths { min: usize, max: usize },

    #[error("Sequence '{0}' contains non-ASCII characters")]
    NonAscii(String),

    #[error("Sequence '{0}' has no population")]
    MissingPopulation(String),
}

/// A single aligned coding sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strain {
    /// The strain identifier
    pub id: String,
    /// Population the strain was sampled from
    pub population: String,
    /// Aligned nucleotides, gaps included
    pub sequence: String,
}

impl Strain {
    /// Creates a new strain.
    pub fn new(id: impl Into<String>, population: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            population: population.into(),
            sequence: sequence.into(),
        }
    }

    /// Returns the length of the sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Returns true if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// The triplet of codon column `index`, if the sequence covers it.
    pub fn codon(&self, index: usize) -> Option<&str> {
        let start = index.checked_mul(3)?;
        self.sequence.get(start..start + 3)
    }

    /// Number of complete codons.
    pub fn codon_count(&self) -> usize {
        self.sequence.len() / 3
    }
}

/// Equal-length strains, grouped by population in first-seen order.
#[derive(Debug, Clone)]
pub struct CodingAlignment {
    strains: Vec<Strain>,
    alignment_length: usize,
}

impl CodingAlignment {
    /// Creates an alignment, checking that every strain has a population,
    /// ASCII data and the same length.
    ///
    /// A length that is not a multiple of three is accepted with a warning;
    /// the trailing bases are never read.
    pub fn new(strains: Vec<Strain>) -> Result<Self, AlignmentError> {
        let alignment_length = Self::validate_alignment(&strains)?;
        if alignment_length % 3 != 0 {
            warn!(
                length = alignment_length,
                "alignment length is not a multiple of 3, trailing bases ignored"
            );
        }
        Ok(Self {
            strains,
            alignment_length,
        })
    }

    fn validate_alignment(strains: &[Strain]) -> Result<usize, AlignmentError> {
        let first = strains.first().ok_or(AlignmentError::Empty)?;

        for strain in strains {
            if strain.population.is_empty() {
                return Err(AlignmentError::MissingPopulation(strain.id.clone()));
            }
            if !strain.sequence.is_ascii() {
                return Err(AlignmentError::NonAscii(strain.id.clone()));
            }
        }

        let first_len = first.len();
        if strains.iter().all(|s| s.len() == first_len) {
            return Ok(first_len);
        }
        let min = strains.iter().map(|s| s.len()).min().unwrap_or(0);
        let max = strains.iter().map(|s| s.len()).max().unwrap_or(0);
        Err(AlignmentError::UnequalLengths { min, max })
    }

    /// Returns the number of strains.
    pub fn strain_count(&self) -> usize {
        self.strains.len()
    }

    /// Returns the alignment length in nucleotides.
    pub fn alignment_length(&self) -> usize {
        self.alignment_length
    }

    /// Returns the number of complete codon columns.
    pub fn codon_count(&self) -> usize {
        self.alignment_length / 3
    }

    pub fn strains(&self) -> &[Strain] {
        &self.strains
    }

    /// Population names in first-seen order.
    pub fn populations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for strain in &self.strains {
            if !names.contains(&strain.population.as_str()) {
                names.push(&strain.population);
            }
        }
        names
    }

    /// Strains of one population, in input order.
    pub fn population(&self, name: &str) -> Vec<&Strain> {
        self.strains.iter().filter(|s| s.population == name).collect()
    }

    pub fn has_population(&self, name: &str) -> bool {
        self.strains.iter().any(|s| s.population == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alignment() -> CodingAlignment {
        CodingAlignment::new(vec![
            Strain::new("s1", "north", "AAAGGG"),
            Strain::new("s2", "south", "AATGGG"),
            Strain::new("s3", "north", "ATA---"),
        ])
        .unwrap()
    }

    #[test]
    fn test_strain_creation() {
        let strain = Strain::new("s1", "pop", "ACGTAC");
        assert_eq!(strain.id, "s1");
        assert_eq!(strain.population, "pop");
        assert_eq!(strain.len(), 6);
        assert_eq!(strain.codon_count(), 2);
    }

    #[test]
    fn test_strain_codon() {
        let strain = Strain::new("s1", "pop", "ACGTACG");
        assert_eq!(strain.codon(0), Some("ACG"));
        assert_eq!(strain.codon(1), Some("TAC"));
        assert_eq!(strain.codon(2), None);
    }

    #[test]
    fn test_alignment_valid() {
        let alignment = alignment();
        assert_eq!(alignment.strain_count(), 3);
        assert_eq!(alignment.alignment_length(), 6);
        assert_eq!(alignment.codon_count(), 2);
        assert_eq!(alignment.strains()[2].id, "s3");
    }

    #[test]
    fn test_alignment_invalid() {
        let result = CodingAlignment::new(vec![Strain::new("s1", "p", "ACGT"), Strain::new("s2", "p", "TG")]);
        assert_eq!(result.unwrap_err(), AlignmentError::UnequalLengths { min: 2, max: 4 });

        assert_eq!(CodingAlignment::new(vec![]).unwrap_err(), AlignmentError::Empty);

        let result = CodingAlignment::new(vec![Strain::new("s1", "", "ACG")]);
        assert_eq!(result.unwrap_err(), AlignmentError::MissingPopulation("s1".into()));

        let result = CodingAlignment::new(vec![Strain::new("s1", "p", "AÇG")]);
        assert_eq!(result.unwrap_err(), AlignmentError::NonAscii("s1".into()));
    }

    #[test]
    fn test_populations_first_seen_order() {
        let alignment = alignment();
        assert_eq!(alignment.populations(), vec!["north", "south"]);
        let north: Vec<&str> = alignment.population("north").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(north, vec!["s1", "s3"]);
        assert!(alignment.has_population("south"));
        assert!(!alignment.has_population("east"));
    }

    #[test]
    fn test_trailing_bases_ignored() {
        let alignment = CodingAlignment::new(vec![Strain::new("s1", "p", "AAAGG")]).unwrap();
        assert_eq!(alignment.codon_count(), 1);
    }
}
