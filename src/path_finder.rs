//! Minimal evolutionary paths connecting the codons observed at a site.
//!
//! Given the distinct codons sampled at one codon site, [`PathFinder`]
//! searches the single-substitution codon graph for the shortest simple
//! walk that visits all of them. Among walks of that length it keeps the
//! one with the fewest nonsynonymous steps; ties go to the first walk found.
//!
//! ## Search order
//!
//! Start codons are tried in input order and neighbors in the order given
//! by [`CodonTable::neighbors`], so the result is fully deterministic.
//!
//! ## Bounds
//!
//! The walk length starts at a lower bound (distinct bases per position,
//! minus one, summed over the three positions) and grows one step at a time
//! up to [`MAX_PATH_STEPS`]. Every extension counts against a node budget;
//! running out of either yields an empty path.

use tracing::{debug, warn};

use crate::codon::{base_index, Codon};
use crate::genetic_code::CodonTable;
use crate::path::EvolutionaryPath;

/// Longest walk the finder will consider, in substitution steps.
pub const MAX_PATH_STEPS: usize = 64;

/// Default number of codon extensions allowed for one search.
pub const DEFAULT_SEARCH_BUDGET: usize = 2_000_000;

/// Searches minimal codon walks under one genetic code and terminal policy.
#[derive(Debug, Clone, Copy)]
pub struct PathFinder<'a> {
    table: &'a dyn CodonTable,
    include_terminal: bool,
    search_budget: usize,
}

/// Mutable state of one depth-bounded search. The current walk lives in a
/// single stack that grows and shrinks with the recursion.
struct Search<'f, 'a> {
    finder: &'f PathFinder<'a>,
    targets: u64,
    stack: Vec<Codon>,
    visited: u64,
    best: Option<(Vec<Codon>, usize)>,
    expansions: usize,
    exhausted: bool,
}

impl<'a> PathFinder<'a> {
    pub fn new(table: &'a dyn CodonTable, include_terminal: bool) -> Self {
        Self {
            table,
            include_terminal,
            search_budget: DEFAULT_SEARCH_BUDGET,
        }
    }

    /// Caps the number of codon extensions per search.
    pub fn with_search_budget(mut self, search_budget: usize) -> Self {
        self.search_budget = search_budget;
        self
    }

    pub fn table(&self) -> &'a dyn CodonTable {
        self.table
    }

    pub fn include_terminal(&self) -> bool {
        self.include_terminal
    }

    /// Sum over the three positions of (distinct bases - 1).
    pub fn lower_bound(codons: &[Codon]) -> usize {
        (0..3)
            .map(|pos| {
                let mut seen = [false; 4];
                for c in codons {
                    seen[base_index(c.base(pos)).unwrap_or(0)] = true;
                }
                seen.iter().filter(|&&s| s).count().saturating_sub(1)
            })
            .sum()
    }

    /// Finds the best walk visiting every codon in `observed`.
    ///
    /// Returns `None` for empty input and an empty path when no walk
    /// satisfies the terminal policy within the step and node budgets.
    /// Duplicate codons are ignored.
    pub fn find_path(&self, observed: &[Codon]) -> Option<EvolutionaryPath<'a>> {
        if observed.is_empty() {
            return None;
        }

        let mut targets: Vec<Codon> = Vec::with_capacity(observed.len());
        let mut target_mask = 0u64;
        for &c in observed {
            if target_mask & c.mask() == 0 {
                target_mask |= c.mask();
                targets.push(c);
            }
        }

        if !self.include_terminal && targets.iter().any(|&c| self.table.is_terminal(c)) {
            debug!(codons = targets.len(), "terminal codon observed, no path without terminals");
            return Some(EvolutionaryPath::new(self.table));
        }

        let first_round = Self::lower_bound(&targets).max(targets.len() - 1);
        let mut search = Search {
            finder: self,
            targets: target_mask,
            stack: Vec::with_capacity(first_round + 1),
            visited: 0,
            best: None,
            expansions: 0,
            exhausted: false,
        };

        for n_steps in first_round..=MAX_PATH_STEPS {
            debug!(n_steps, codons = targets.len(), "searching codon paths");
            for &start in &targets {
                search.run(start, n_steps);
                if search.exhausted {
                    break;
                }
            }
            if search.best.is_some() || search.exhausted {
                break;
            }
        }

        if search.exhausted {
            warn!(
                codons = targets.len(),
                budget = self.search_budget,
                "codon path search budget exhausted"
            );
        }

        let mut path = EvolutionaryPath::new(self.table);
        if let (Some((codons, _)), false) = (search.best, search.exhausted) {
            for c in codons {
                path.push(c, target_mask & c.mask() != 0);
            }
        }
        Some(path)
    }

    /// Connects `single` to the closest codon of `candidates`.
    ///
    /// Each candidate is joined to `single` with the two-codon search; the
    /// path with the fewest nonsynonymous steps wins, then the shortest,
    /// then the first. Returns `None` when `candidates` is empty.
    pub fn find_best_path(&self, single: Codon, candidates: &[Codon]) -> Option<EvolutionaryPath<'a>> {
        if candidates.is_empty() {
            return None;
        }

        let mut best: Option<(EvolutionaryPath<'a>, usize)> = None;
        for &candidate in candidates {
            let Some(path) = self.find_path(&[single, candidate]) else {
                continue;
            };
            if path.is_empty() {
                continue;
            }
            let nonsyn = path.nonsynonymous_count();
            let better = match &best {
                None => true,
                Some((b, bn)) => nonsyn < *bn || (nonsyn == *bn && path.len() < b.len()),
            };
            if better {
                best = Some((path, nonsyn));
            }
        }

        Some(best.map_or_else(|| EvolutionaryPath::new(self.table), |(p, _)| p))
    }
}

impl Search<'_, '_> {
    fn run(&mut self, start: Codon, n_steps: usize) {
        self.stack.clear();
        self.stack.push(start);
        self.visited = start.mask();
        self.extend(start, n_steps, 0);
    }

    fn extend(&mut self, current: Codon, remaining: usize, nonsyn: usize) {
        if self.exhausted {
            return;
        }
        // Equal counts never replace the first walk found
        if let Some((_, best)) = &self.best {
            if nonsyn >= *best {
                return;
            }
        }

        let missing = self.targets & !self.visited;
        if remaining == 0 {
            if missing == 0 {
                self.best = Some((self.stack.clone(), nonsyn));
            }
            return;
        }
        if missing == 0 {
            return;
        }

        // Each step reaches at most one new target
        let unvisited = missing.count_ones() as usize;
        let nearest = (0..64)
            .filter(|i| missing & (1u64 << i) != 0)
            .filter_map(Codon::from_index)
            .map(|c| current.differences(c))
            .min()
            .unwrap_or(0);
        if nearest + unvisited - 1 > remaining {
            return;
        }

        let table = self.finder.table;
        for &next in table.neighbors(current) {
            if self.visited & next.mask() != 0 {
                continue;
            }
            if !self.finder.include_terminal && table.is_terminal(next) {
                continue;
            }
            self.expansions += 1;
            if self.expansions > self.finder.search_budget {
                self.exhausted = true;
                return;
            }

            let step = usize::from(!table.are_synonymous(current, next));
            self.stack.push(next);
            self.visited |= next.mask();
            self.extend(next, remaining - 1, nonsyn + step);
            self.visited &= !next.mask();
            self.stack.pop();
        }
    }
}
