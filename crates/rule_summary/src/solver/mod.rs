//! Branch-and-bound search for high-coverage rules.
//!
//! The search is level-wise: single-column rules are counted first, then for
//! each size up to the configured cap the promising rules of the previous
//! level are extended by one column, candidates whose marginal value bound
//! cannot beat the incumbent are dropped, and the survivors are counted in one
//! pass over the population.

mod arena;
mod bounds;
mod counting;
mod lazy;
mod search;

pub use arena::{RuleArena, RuleId};
pub use lazy::CandidateSet;

use crate::conf::SolverConfig;
use crate::error::{Result, SummaryError};
use crate::population::Population;
use crate::rules::{Rule, ScoredRule};
use crate::sample::TableSample;
use crate::sample_handler::SampleHandler;
use crate::scorer::Scorer;
use crate::table::Table;
use counting::gain;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A candidate dropped by bound pruning, with the incumbent it was measured against.
#[derive(Debug, Clone, PartialEq)]
pub struct PrunedCandidate {
    pub rule: Rule,
    pub bound: i64,
    pub count_bound: u64,
    pub best_value: i64,
    pub best_count: u64,
}

/// One greedy step: the solution it started from, what it pruned, what it picked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepTrace {
    pub solution: Vec<Rule>,
    pub pruned: Vec<PrunedCandidate>,
    pub chosen: Option<ScoredRule>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveTrace {
    pub steps: Vec<StepTrace>,
}

#[derive(Debug, Clone)]
pub struct RuleSolver {
    config: SolverConfig,
    rng: StdRng,
    trace: Option<SolveTrace>,
}

impl Default for RuleSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl RuleSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            trace: None,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Steps recorded since the last `take_trace` (only with `record_trace`).
    pub fn trace(&self) -> Option<&SolveTrace> {
        self.trace.as_ref()
    }

    pub fn take_trace(&mut self) -> Option<SolveTrace> {
        self.trace.take()
    }

    /// Best `rule_nums` rules refining `base_rule`, found on a sample of the
    /// tuples it covers and expanded back to the table. With
    /// `required_column` every rule fixes that column.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &mut self,
        table: &Table,
        base_rule: &Rule,
        rule_nums: usize,
        max_score: u32,
        scorer: &Scorer,
        required_column: Option<usize>,
        sample_handler: &mut SampleHandler,
    ) -> Result<Vec<ScoredRule>> {
        table.check_rule(base_rule)?;
        if let Some(c) = required_column {
            if c >= table.num_columns() || base_rule.is_fixed(c) {
                return Err(SummaryError::InvalidArgument(format!(
                    "column {c} cannot be required under {base_rule}"
                )));
            }
        }
        let pooled = sample_handler.get_sample_for_rule(table, base_rule)?;
        let exact;
        let sample: &TableSample = match &pooled {
            Some(sample) => sample.as_ref(),
            None => {
                warn!("no sample available for {base_rule}, evaluating exactly");
                exact = TableSample::create(table, base_rule, usize::MAX, &mut self.rng)?;
                &exact
            }
        };
        let population = sample.population(table);
        let local_required = required_column.and_then(|c| sample.local_column(c));
        let found =
            self.get_solution(&population, scorer, rule_nums, max_score, local_required)?;
        info!(
            "solved {base_rule}: {} rules from {} of {} tuples",
            found.len(),
            sample.len(),
            sample.total_count()
        );
        Ok(found
            .iter()
            .map(|r| sample.expand_scored(table, scorer, r))
            .collect())
    }
}

/// `solve` with the default solver configuration.
pub fn solve(
    table: &Table,
    base_rule: &Rule,
    rule_nums: usize,
    max_score: u32,
    scorer: &Scorer,
    required_column: Option<usize>,
    sample_handler: &mut SampleHandler,
) -> Result<Vec<ScoredRule>> {
    RuleSolver::default().solve(
        table,
        base_rule,
        rule_nums,
        max_score,
        scorer,
        required_column,
        sample_handler,
    )
}

/// Exact marginal value of `rule` on top of `solution`.
pub fn marginal_value(
    population: &Population<'_>,
    scorer: &Scorer,
    rule: &Rule,
    solution: &[Rule],
) -> i64 {
    let score = population.score(scorer, rule);
    let scores: Vec<u32> = solution.iter().map(|r| population.score(scorer, r)).collect();
    population
        .tuples()
        .filter(|t| rule.covers(t))
        .map(|t| {
            let covered = solution
                .iter()
                .zip(&scores)
                .filter(|(r, _)| r.covers(t))
                .map(|(_, s)| *s)
                .max()
                .unwrap_or(0);
            gain(score, covered)
        })
        .sum()
}

/// Tuples credited to each solution rule when every tuple goes to the
/// highest-scoring rule covering it (earlier rules win ties). Aligned with
/// `solution`.
pub fn marginal_counts(population: &Population<'_>, scorer: &Scorer, solution: &[Rule]) -> Vec<u64> {
    let scores: Vec<u32> = solution.iter().map(|r| population.score(scorer, r)).collect();
    let mut order: Vec<usize> = (0..solution.len()).collect();
    order.sort_by(|a, b| scores[*b].cmp(&scores[*a]));
    let mut counts = vec![0u64; solution.len()];
    for tuple in population.tuples() {
        if let Some(i) = order.iter().find(|i| solution[**i].covers(tuple)) {
            counts[*i] += 1;
        }
    }
    counts
}

/// Total score of a solution: every tuple contributes the best score covering it.
pub fn solution_value(population: &Population<'_>, scorer: &Scorer, solution: &[Rule]) -> u64 {
    let scores: Vec<u32> = solution.iter().map(|r| population.score(scorer, r)).collect();
    marginal_counts(population, scorer, solution)
        .iter()
        .zip(scores)
        .map(|(c, s)| c * u64::from(s))
        .sum()
}
