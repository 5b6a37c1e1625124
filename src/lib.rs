//! # codonpath - Codon Evolutionary Paths
//!
//! Reconstructs the minimal single-substitution walk through the codons
//! observed at a codon site and derives population genetics statistics
//! from it.
//!
//! ## Architecture
//!
//! - `codon`: Codon values and the precomputed neighbor graph
//! - `genetic_code`: NCBI translation tables behind the `CodonTable` trait
//! - `site`: Nucleotide composition of one alignment column
//! - `path`: Evolutionary paths and their step classification
//! - `path_finder`: Minimal path search
//! - `composition`: Codons observed at one codon site
//! - `statistics`: π, θ, Tajima's D, divergence K
//! - `block`: Per-population accumulators over many sites
//! - `model`: Strains and coding alignments
//! - `analysis`: End-to-end per-population analysis

pub mod analysis;
pub mod block;
pub mod codon;
pub mod composition;
pub mod genetic_code;
pub mod model;
pub mod path;
pub mod path_finder;
pub mod site;
pub mod statistics;
