//! Genetic code tables.
//!
//! This module provides:
//! - The [`CodonTable`] contract used by the path engine
//! - NCBI genetic code tables (1-33) with their start codons
//! - User-defined tables built from an NCBI-ordered amino acid string
//!
//! The path engine never looks at amino acids directly; it only asks a
//! table whether a codon terminates translation, starts it, or encodes the
//! same amino acid as another codon.

use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::codon::{Codon, CodonParseError};

/// Lookups the path engine needs from a genetic code.
///
/// Implementations must be pure: the same question always gets the same
/// answer, and no call has side effects.
pub trait CodonTable: fmt::Debug + Send + Sync {
    /// Identifier used to decide whether two compositions share a table.
    fn id(&self) -> u8;

    /// True if the codon signals translation termination.
    fn is_terminal(&self, codon: Codon) -> bool;

    /// True if the codon can initiate translation.
    fn is_start_codon(&self, codon: Codon) -> bool;

    /// True if both codons encode the same amino acid.
    /// Always false when either codon is terminal.
    fn are_synonymous(&self, a: Codon, b: Codon) -> bool;

    /// Codons reachable from `codon` by one nucleotide substitution.
    fn neighbors(&self, codon: Codon) -> &[Codon] {
        codon.neighbors()
    }
}

/// Errors raised when building a user-defined genetic code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneticCodeError {
    #[error("Amino acid string must have 64 entries (got {0})")]
    InvalidLength(usize),

    #[error("Invalid amino acid symbol '{0}'")]
    InvalidAminoAcid(char),

    #[error("Invalid start codon: {0}")]
    InvalidStartCodon(#[from] CodonParseError),
}

/// A genetic code table mapping each codon to a one-letter amino acid.
#[derive(Debug, Clone)]
pub struct GeneticCode {
    /// NCBI genetic code ID
    id: u8,
    /// Name of the genetic code
    name: String,
    /// Amino acid per codon registry index, `*` for stop
    amino_acids: [u8; 64],
    /// Start codons as a bit set over registry indices
    starts: u64,
}

impl GeneticCode {
    /// Builds a table from an NCBI `ncbieaa` string.
    ///
    /// # Arguments
    /// * `ncbieaa` - 64 amino acids in NCBI order (TTT, TTC, TTA, TTG, TCT, ...)
    /// * `starts` - start codons
    fn from_ncbi(id: u8, name: &str, ncbieaa: &str, starts: &[&str]) -> Result<Self, GeneticCodeError> {
        let symbols = ncbieaa.as_bytes();
        if symbols.len() != 64 {
            return Err(GeneticCodeError::InvalidLength(ncbieaa.chars().count()));
        }
        if let Some(&bad) = symbols.iter().find(|s| !(s.is_ascii_uppercase() || **s == b'*')) {
            return Err(GeneticCodeError::InvalidAminoAcid(bad as char));
        }

        // NCBI order is Base1, Base2, Base3 over T, C, A, G
        let bases = [b'T', b'C', b'A', b'G'];
        let mut amino_acids = [b'X'; 64];
        let mut idx = 0;
        for &b1 in &bases {
            for &b2 in &bases {
                for &b3 in &bases {
                    if let Some(codon) = Codon::from_bases([b1, b2, b3]) {
                        amino_acids[codon.index()] = symbols[idx];
                    }
                    idx += 1;
                }
            }
        }

        let mut start_mask = 0u64;
        for s in starts {
            start_mask |= Codon::parse(s)?.mask();
        }

        Ok(Self {
            id,
            name: name.to_string(),
            amino_acids,
            starts: start_mask,
        })
    }

    /// Builds a user-defined table.
    ///
    /// `amino_acids` follows the NCBI ordering used by the built-in tables.
    pub fn custom(id: u8, name: &str, amino_acids: &str, starts: &[&str]) -> Result<Self, GeneticCodeError> {
        Self::from_ncbi(id, name, &amino_acids.to_ascii_uppercase(), starts)
    }

    /// The standard code (NCBI table 1).
    pub fn standard() -> &'static GeneticCode {
        genetic_codes().default_code()
    }

    /// NCBI genetic code ID.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Name of the genetic code.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// One-letter amino acid for a codon, `*` for stop.
    pub fn translate(&self, codon: Codon) -> u8 {
        self.amino_acids[codon.index()]
    }

    /// Stop codons in registry order.
    pub fn stop_codons(&self) -> Vec<Codon> {
        Codon::all().filter(|c| self.translate(*c) == b'*').collect()
    }

    /// Start codons in registry order.
    pub fn start_codons(&self) -> Vec<Codon> {
        Codon::all().filter(|c| self.starts & c.mask() != 0).collect()
    }
}

impl CodonTable for GeneticCode {
    fn id(&self) -> u8 {
        self.id
    }

    fn is_terminal(&self, codon: Codon) -> bool {
        self.translate(codon) == b'*'
    }

    fn is_start_codon(&self, codon: Codon) -> bool {
        self.starts & codon.mask() != 0
    }

    fn are_synonymous(&self, a: Codon, b: Codon) -> bool {
        let (x, y) = (self.translate(a), self.translate(b));
        x != b'*' && x == y
    }
}

/// All available genetic codes from NCBI.
#[derive(Debug)]
pub struct GeneticCodes {
    codes: Vec<GeneticCode>,
}

const NCBI_TABLES: &[(u8, &str, &str, &[&str])] = &[
    (1, "Standard",
        "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["TTG", "CTG", "ATG"]),
    (2, "Vertebrate Mitochondrial",
        "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSS**VVVVAAAADDEEGGGG",
        &["ATT", "ATC", "ATA", "ATG", "GTG"]),
    (3, "Yeast Mitochondrial",
        "FFLLSSSSYY**CCWWTTTTPPPPHHQQRRRRIIMMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATA", "ATG"]),
    (4, "Mold/Protozoan/Coelenterate Mitochondrial",
        "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["TTA", "TTG", "CTG", "ATT", "ATC", "ATA", "ATG", "GTG"]),
    (5, "Invertebrate Mitochondrial",
        "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSSSSVVVVAAAADDEEGGGG",
        &["TTG", "ATT", "ATC", "ATA", "ATG", "GTG"]),
    (6, "Ciliate/Dasycladacean/Hexamita Nuclear",
        "FFLLSSSSYYQQCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (9, "Echinoderm/Flatworm Mitochondrial",
        "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNNKSSSSVVVVAAAADDEEGGGG",
        &["ATG", "GTG"]),
    (10, "Euplotid Nuclear",
        "FFLLSSSSYY**CCCWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (11, "Bacterial/Archaeal/Plant Plastid",
        "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["TTG", "CTG", "ATT", "ATC", "ATA", "ATG", "GTG"]),
    (12, "Alternative Yeast Nuclear",
        "FFLLSSSSYY**CC*WLLLSPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["CTG", "ATG"]),
    (13, "Ascidian Mitochondrial",
        "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSSGGVVVVAAAADDEEGGGG",
        &["TTG", "ATA", "ATG", "GTG"]),
    (14, "Alternative Flatworm Mitochondrial",
        "FFLLSSSSYYY*CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNNKSSSSVVVVAAAADDEEGGGG",
        &["ATG"]),
    (15, "Blepharisma Macronuclear",
        "FFLLSSSSYY*QCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (16, "Chlorophycean Mitochondrial",
        "FFLLSSSSYY*LCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (21, "Trematode Mitochondrial",
        "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNNKSSSSVVVVAAAADDEEGGGG",
        &["ATG", "GTG"]),
    (22, "Scenedesmus obliquus Mitochondrial",
        "FFLLSS*SYY*LCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (23, "Thraustochytrium Mitochondrial",
        "FF*LSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATT", "ATG", "GTG"]),
    (24, "Rhabdopleuridae Mitochondrial",
        "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSSKVVVVAAAADDEEGGGG",
        &["TTG", "CTG", "ATG", "GTG"]),
    (25, "Candidate Division SR1/Gracilibacteria",
        "FFLLSSSSYY**CCGWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["TTG", "ATG", "GTG"]),
    (26, "Pachysolen tannophilus Nuclear",
        "FFLLSSSSYY**CC*WLLLAPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["TTG", "CTG", "ATG"]),
    (27, "Karyorelict Nuclear",
        "FFLLSSSSYYQQCCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (28, "Condylostoma Nuclear",
        "FFLLSSSSYYQQCCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (29, "Mesodinium Nuclear",
        "FFLLSSSSYYYYCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (30, "Peritrich Nuclear",
        "FFLLSSSSYYEECC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (31, "Blastocrithidia Nuclear",
        "FFLLSSSSYYEECCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["ATG"]),
    (32, "Balanophoraceae Plastid",
        "FFLLSSSSYY*WCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
        &["TTG", "CTG", "ATT", "ATC", "ATA", "ATG", "GTG"]),
    (33, "Cephalodiscidae Mitochondrial",
        "FFLLSSSSYYY*CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSSKVVVVAAAADDEEGGGG",
        &["TTG", "CTG", "ATG", "GTG"]),
];

impl GeneticCodes {
    /// Creates the complete set of NCBI genetic codes.
    pub fn new() -> Self {
        let codes = NCBI_TABLES
            .iter()
            .filter_map(|&(id, name, ncbieaa, starts)| GeneticCode::from_ncbi(id, name, ncbieaa, starts).ok())
            .collect();
        Self { codes }
    }

    /// Returns all genetic codes.
    pub fn all(&self) -> &[GeneticCode] {
        &self.codes
    }

    /// Gets a genetic code by ID.
    pub fn get(&self, id: u8) -> Option<&GeneticCode> {
        self.codes.iter().find(|c| c.id == id)
    }

    /// Gets the default (Standard) genetic code.
    pub fn default_code(&self) -> &GeneticCode {
        self.get(1).expect("Standard genetic code should always exist")
    }
}

impl Default for GeneticCodes {
    fn default() -> Self {
        Self::new()
    }
}

static GENETIC_CODES: Lazy<GeneticCodes> = Lazy::new(GeneticCodes::new);

/// Process-wide registry of the NCBI tables.
pub fn genetic_codes() -> &'static GeneticCodes {
    &GENETIC_CODES
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codon(s: &str) -> Codon {
        s.parse().unwrap()
    }

    #[test]
    fn test_all_ncbi_tables_load() {
        assert_eq!(genetic_codes().all().len(), NCBI_TABLES.len());
    }

    #[test]
    fn test_standard_code_translation() {
        let standard = GeneticCode::standard();

        assert_eq!(standard.translate(codon("ATG")), b'M');
        assert_eq!(standard.translate(codon("TTT")), b'F');
        assert_eq!(standard.translate(codon("GGG")), b'G');
        assert_eq!(standard.translate(codon("AAA")), b'K');
        assert_eq!(standard.translate(codon("AAT")), b'N');
        assert_eq!(standard.translate(codon("ATA")), b'I');

        let stops: Vec<String> = standard.stop_codons().iter().map(|c| c.to_string()).collect();
        assert_eq!(stops, ["TAA", "TAG", "TGA"]);
    }

    #[test]
    fn test_terminal_and_start() {
        let standard = GeneticCode::standard();
        assert!(standard.is_terminal(codon("TAA")));
        assert!(!standard.is_terminal(codon("TGG")));
        assert!(standard.is_start_codon(codon("ATG")));
        assert!(standard.is_start_codon(codon("TTG")));
        assert!(!standard.is_start_codon(codon("ATA")));
    }

    #[test]
    fn test_synonymy() {
        let standard = GeneticCode::standard();
        assert!(standard.are_synonymous(codon("AAA"), codon("AAG")));
        assert!(!standard.are_synonymous(codon("AAA"), codon("AAT")));
        assert!(!standard.are_synonymous(codon("TAA"), codon("TAG")));
    }

    #[test]
    fn test_different_genetic_codes() {
        let codes = genetic_codes();

        // In standard code, TGA is stop
        let standard = codes.get(1).unwrap();
        assert!(standard.is_terminal(codon("TGA")));

        // In vertebrate mitochondrial (code 2), TGA is Trp (W)
        let vert_mito = codes.get(2).unwrap();
        assert_eq!(vert_mito.translate(codon("TGA")), b'W');
        assert!(vert_mito.is_terminal(codon("AGA")));
        assert!(codes.get(7).is_none());
    }

    #[test]
    fn test_custom_code() {
        let all_lysine = "K".repeat(64);
        let code = GeneticCode::custom(99, "All lysine", &all_lysine, &["aaa"]).unwrap();
        assert_eq!(CodonTable::id(&code), 99);
        assert!(code.are_synonymous(codon("AAA"), codon("TTT")));
        assert!(code.is_start_codon(codon("AAA")));
        assert!(code.stop_codons().is_empty());

        assert_eq!(
            GeneticCode::custom(99, "short", "KK", &[]).unwrap_err(),
            GeneticCodeError::InvalidLength(2)
        );
        let bad = format!("{}1", "K".repeat(63));
        assert_eq!(
            GeneticCode::custom(99, "bad", &bad, &[]).unwrap_err(),
            GeneticCodeError::InvalidAminoAcid('1')
        );
        assert!(matches!(
            GeneticCode::custom(99, "bad start", &all_lysine, &["AN"]),
            Err(GeneticCodeError::InvalidStartCodon(_))
        ));
    }
}
