//! codonpath - Codon evolutionary paths and population statistics
//!
//! ## Usage
//!
//! ```bash
//! codonpath path AAA AAT ATA
//! codonpath path AGA AGG -g 2 --include-terminal
//! codonpath stats -s north:AAACCC -s north:AAGCCC -s south:GAACCC --outgroup south
//! codonpath codes
//! ```

// Use jemalloc for better memory management (returns memory to OS)
#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use codonpath::analysis::{analyze, AnalysisOptions, PopulationSummary};
use codonpath::codon::Codon;
use codonpath::genetic_code::genetic_codes;
use codonpath::model::{CodingAlignment, Strain};
use codonpath::path_finder::{PathFinder, DEFAULT_SEARCH_BUDGET};

/// codonpath - Minimal codon paths and per-site population genetics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print search and analysis events to stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the minimal evolutionary path through a set of codons
    Path {
        /// Observed codons (e.g. AAA AAT ATA)
        #[arg(required = true)]
        codons: Vec<String>,

        /// Genetic code (1-33, default: 1 = Standard)
        #[arg(short = 'g', long = "genetic-code", default_value = "1")]
        genetic_code: u8,

        /// Allow stop codons along the path
        #[arg(long = "include-terminal")]
        include_terminal: bool,

        /// Maximum number of codon extensions for the search
        #[arg(long = "search-budget", default_value_t = DEFAULT_SEARCH_BUDGET)]
        search_budget: usize,
    },

    /// Compute per-population statistics from aligned coding sequences
    Stats {
        /// Aligned sample as POPULATION:SEQUENCE (repeatable)
        #[arg(short = 's', long = "sample", required = true)]
        samples: Vec<String>,

        /// Genetic code (1-33, default: 1 = Standard)
        #[arg(short = 'g', long = "genetic-code", default_value = "1")]
        genetic_code: u8,

        /// Allow stop codons in and along paths
        #[arg(long = "include-terminal")]
        include_terminal: bool,

        /// Apply the Jukes-Cantor correction to pi, theta and K
        #[arg(long = "jukes-cantor")]
        jukes_cantor: bool,

        /// Singleton frequency cutoff in (0, 1]; 0.5 or more means "seen once"
        #[arg(long = "singleton-cutoff", default_value = "0.5")]
        singleton_cutoff: f64,

        /// Population used as outgroup for divergence
        #[arg(long = "outgroup")]
        outgroup: Option<String>,

        /// Maximum number of codon extensions per codon site
        #[arg(long = "search-budget", default_value_t = DEFAULT_SEARCH_BUDGET)]
        search_budget: usize,
    },

    /// List the available genetic codes
    Codes,
}

/// Initialize tracing subscriber writing to stderr
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn validate_genetic_code(genetic_code: u8) -> Result<()> {
    if !(1..=33).contains(&genetic_code) {
        anyhow::bail!("Genetic code must be 1-33 (got {})", genetic_code);
    }
    Ok(())
}

/// Runs the `path` command: parse codons, search, print the path.
fn run_path(codons: &[String], genetic_code: u8, include_terminal: bool, search_budget: usize) -> Result<()> {
    validate_genetic_code(genetic_code)?;
    let table = genetic_codes()
        .get(genetic_code)
        .ok_or_else(|| anyhow!("Unknown genetic code: {}", genetic_code))?;

    let observed = codons
        .iter()
        .map(|s| Codon::parse(s).with_context(|| format!("Invalid codon '{}'", s)))
        .collect::<Result<Vec<_>>>()?;

    let path = PathFinder::new(table, include_terminal)
        .with_search_budget(search_budget)
        .find_path(&observed)
        .ok_or_else(|| anyhow!("No codons given"))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if path.is_empty() {
        writeln!(handle, "No path found (stop codon excluded or search budget exhausted)")?;
        return Ok(());
    }

    let counts = path.polymorphism_counts();
    let substitutions = path.substitution_counts();
    writeln!(handle, "path\t{}", path)?;
    writeln!(handle, "genetic_code\t{} ({})", table.id(), table.name())?;
    writeln!(handle, "codons\t{}", path.len())?;
    writeln!(handle, "transient\t{}", path.transient_count())?;
    writeln!(handle, "synonymous\t{}", counts.synonymous)?;
    writeln!(handle, "nonsynonymous\t{}", counts.nonsynonymous)?;
    writeln!(handle, "transitions\t{}", substitutions.transitions())?;
    writeln!(handle, "transversions\t{}", substitutions.transversions())?;
    Ok(())
}

/// Builds strains from `POPULATION:SEQUENCE` arguments.
fn parse_samples(samples: &[String]) -> Result<Vec<Strain>> {
    let mut per_population: Vec<(String, usize)> = Vec::new();
    let mut strains = Vec::with_capacity(samples.len());
    for sample in samples {
        let Some((population, sequence)) = sample.split_once(':') else {
            anyhow::bail!("Sample must be POPULATION:SEQUENCE (got '{}')", sample);
        };
        let population = population.trim();
        if population.is_empty() {
            anyhow::bail!("Sample '{}' has an empty population name", sample);
        }

        let index = match per_population.iter_mut().find(|(p, _)| p == population) {
            Some((_, n)) => {
                *n += 1;
                *n
            }
            None => {
                per_population.push((population.to_string(), 1));
                1
            }
        };
        strains.push(Strain::new(format!("{}_{}", population, index), population, sequence.trim()));
    }
    Ok(strains)
}

fn format_stat(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.6}", value)
    }
}

fn write_summaries(out: &mut impl Write, summaries: &[PopulationSummary], with_divergence: bool) -> Result<()> {
    let mut header = vec![
        "population", "strains", "codons", "unresolved", "sites", "S", "eta", "singletons", "pi", "theta",
        "tajima_d", "syn_sites", "nonsyn_sites", "syn_poly", "nonsyn_poly", "syn_singletons",
        "nonsyn_singletons", "ts", "tv", "pi_syn", "pi_nonsyn", "theta_syn", "theta_nonsyn",
    ];
    if with_divergence {
        header.extend(["fixed", "k", "syn_fixed", "nonsyn_fixed", "k_syn", "k_nonsyn"]);
    }
    writeln!(out, "{}", header.join("\t"))?;

    for s in summaries {
        let mut row = vec![
            s.population.clone(),
            s.strains.to_string(),
            s.codons_analyzed.to_string(),
            s.codons_unresolved.to_string(),
            s.sites.to_string(),
            s.segregating_sites.to_string(),
            s.mutations.to_string(),
            s.singletons.to_string(),
            format_stat(s.pi),
            format_stat(s.theta),
            format_stat(s.tajima_d),
            format_stat(s.synonymous_sites),
            format_stat(s.nonsynonymous_sites),
            s.synonymous_polymorphisms.to_string(),
            s.nonsynonymous_polymorphisms.to_string(),
            s.synonymous_singletons.to_string(),
            s.nonsynonymous_singletons.to_string(),
            s.transitions.to_string(),
            s.transversions.to_string(),
            format_stat(s.pi_synonymous),
            format_stat(s.pi_nonsynonymous),
            format_stat(s.theta_synonymous),
            format_stat(s.theta_nonsynonymous),
        ];
        if let Some(d) = &s.divergence {
            row.extend([
                d.fixed_differences.to_string(),
                format_stat(d.k),
                d.synonymous_differences.to_string(),
                d.nonsynonymous_differences.to_string(),
                format_stat(d.k_synonymous),
                format_stat(d.k_nonsynonymous),
            ]);
        }
        writeln!(out, "{}", row.join("\t"))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Path {
            codons,
            genetic_code,
            include_terminal,
            search_budget,
        } => run_path(&codons, genetic_code, include_terminal, search_budget)?,

        Command::Stats {
            samples,
            genetic_code,
            include_terminal,
            jukes_cantor,
            singleton_cutoff,
            outgroup,
            search_budget,
        } => {
            validate_genetic_code(genetic_code)?;
            if !(singleton_cutoff > 0.0 && singleton_cutoff <= 1.0) {
                anyhow::bail!("Singleton cutoff must be in (0, 1] (got {})", singleton_cutoff);
            }

            let alignment = CodingAlignment::new(parse_samples(&samples)?)?;
            let options = AnalysisOptions {
                genetic_code,
                include_terminal,
                jukes_cantor,
                singleton_cutoff,
                outgroup,
                search_budget,
            };
            let summaries = analyze(&alignment, &options)?;

            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_summaries(&mut handle, &summaries, options.outgroup.is_some())?;
        }

        Command::Codes => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for code in genetic_codes().all() {
                writeln!(handle, "{}\t{}", code.id(), code.name())?;
            }
        }
    }

    Ok(())
}
