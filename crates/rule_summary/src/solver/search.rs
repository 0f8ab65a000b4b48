use super::arena::{RuleArena, RuleId};
use super::bounds::{upper_bound, Bound};
use super::counting::{count_lattice, count_pairs, count_single_hash, gain};
use super::{PrunedCandidate, RuleSolver, StepTrace};
use crate::conf::CountingStrategy;
use crate::error::{weighted, Result, SummaryError};
use crate::lattice::find_super_rules;
use crate::population::Population;
use crate::rules::{Rule, RuleStats, ScoredRule};
use crate::scorer::Scorer;
use log::debug;
use rustc_hash::FxHashSet;
use std::time::Instant;

/// Whether something bounded by `(value, count)` can still displace the
/// incumbent `(best_value, best_count)`.
pub(crate) fn could_beat(value: i64, count: u64, best_value: i64, best_count: u64) -> bool {
    value > best_value || (value == best_value && count > best_count)
}

/// Best rule found so far in a greedy step.
struct Incumbent {
    id: Option<RuleId>,
    value: i64,
    count: u64,
}

impl Default for Incumbent {
    fn default() -> Self {
        Self {
            id: None,
            value: -1,
            count: 0,
        }
    }
}

impl Incumbent {
    fn offer(&mut self, search: &LevelSearch<'_, '_>, id: RuleId) {
        let stats = search.arena.stats(id);
        if stats.count == 0 || search.is_excluded(id) {
            return;
        }
        if could_beat(stats.max_marginal_value, stats.count, self.value, self.count) {
            self.id = Some(id);
            self.value = stats.max_marginal_value;
            self.count = stats.count;
        }
    }
}

/// State of one level-wise search over a population.
pub(crate) struct LevelSearch<'s, 'p> {
    population: &'s Population<'p>,
    scorer: &'s Scorer,
    max_score: u32,
    cardinalities: Vec<usize>,
    pub(crate) arena: RuleArena,
    /// Score of the best solution rule covering each tuple.
    covered: Vec<u32>,
    excluded: FxHashSet<Rule>,
}

impl<'s, 'p> LevelSearch<'s, 'p> {
    pub(crate) fn new(
        population: &'s Population<'p>,
        scorer: &'s Scorer,
        max_score: u32,
        solution: &[Rule],
    ) -> Self {
        let scores: Vec<u32> = solution.iter().map(|r| population.score(scorer, r)).collect();
        let covered = population
            .tuples()
            .map(|t| {
                solution
                    .iter()
                    .zip(&scores)
                    .filter(|(r, _)| r.covers(t))
                    .map(|(_, s)| *s)
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        Self {
            population,
            scorer,
            max_score,
            cardinalities: population.cardinalities(),
            arena: RuleArena::new(),
            covered,
            excluded: solution.iter().cloned().collect(),
        }
    }

    pub(crate) fn is_excluded(&self, id: RuleId) -> bool {
        self.excluded.contains(self.arena.rule(id))
    }

    /// Counts every single-column rule in one pass and stores those within
    /// the score limit. With `column` set only that column is seeded.
    pub(crate) fn seed(&mut self, column: Option<usize>) -> Vec<RuleId> {
        let width = self.population.width();
        let columns: Vec<usize> = match column {
            Some(c) => vec![c],
            None => (0..width).collect(),
        };
        let scores: Vec<Vec<u32>> = (0..width)
            .map(|c| {
                (0..self.cardinalities[c] as i32)
                    .map(|v| self.population.single_score(self.scorer, c, v))
                    .collect()
            })
            .collect();
        let mut counts: Vec<Vec<u64>> = self.cardinalities.iter().map(|n| vec![0; *n]).collect();
        let mut marginals: Vec<Vec<i64>> =
            self.cardinalities.iter().map(|n| vec![0; *n]).collect();
        for (t, tuple) in self.population.tuples().enumerate() {
            for c in &columns {
                let v = tuple[*c] as usize;
                counts[*c][v] += 1;
                marginals[*c][v] += gain(scores[*c][v], self.covered[t]);
            }
        }
        let mut ids = Vec::new();
        for c in columns {
            for v in 0..self.cardinalities[c] {
                if scores[c][v] > self.max_score {
                    continue;
                }
                let mut stats = RuleStats::uncounted(scores[c][v], 0);
                stats.settle(counts[c][v], marginals[c][v]);
                let rule = Rule::empty(width).with_value(c, v as i32);
                ids.push(self.arena.insert(rule, stats));
            }
        }
        ids
    }

    /// Super-rules of `size` of every rule in `latest` whose potential
    /// `(marginal + count * headroom, count)` passes `promising`.
    pub(crate) fn expand<F>(&self, latest: &[RuleId], size: usize, promising: F) -> Result<Vec<Rule>>
    where
        F: Fn(i64, u64) -> bool,
    {
        let mut seen: FxHashSet<Rule> = FxHashSet::default();
        for id in latest {
            let stats = self.arena.stats(*id);
            let headroom = i64::from(self.max_score) - i64::from(stats.score);
            let potential = weighted(stats.count, headroom, stats.max_marginal_value)?;
            if !promising(potential, stats.count) {
                continue;
            }
            for rule in find_super_rules(self.arena.rule(*id), &self.cardinalities, size) {
                if self.arena.get(&rule).is_none() {
                    seen.insert(rule);
                }
            }
        }
        let mut candidates: Vec<Rule> = seen.into_iter().collect();
        candidates.sort();
        Ok(candidates)
    }

    /// Scores and bounds the candidates, keeping those `prune` rejects and
    /// linking each under a sub-rule already in the arena.
    pub(crate) fn admit<F>(
        &mut self,
        candidates: Vec<Rule>,
        prune: F,
        mut pruned: Option<&mut Vec<PrunedCandidate>>,
    ) -> Result<Vec<RuleId>>
    where
        F: Fn(&Bound) -> bool,
    {
        let mut admitted = Vec::new();
        for rule in candidates {
            let score = self.population.score(self.scorer, &rule);
            if score > self.max_score {
                continue;
            }
            let bound = upper_bound(&self.arena, &rule, self.max_score, &prune)?;
            if prune(&bound) {
                if let Some(log) = pruned.as_deref_mut() {
                    log.push(PrunedCandidate {
                        rule,
                        bound: bound.value,
                        count_bound: bound.count,
                        best_value: 0,
                        best_count: 0,
                    });
                }
                continue;
            }
            let id = self.arena.insert(rule, RuleStats::uncounted(score, bound.value));
            if !self.arena.link_under_sub_rule(id) {
                return Err(SummaryError::InvalidArgument(format!(
                    "candidate {} has no sub-rule in the search",
                    self.arena.rule(id)
                )));
            }
            admitted.push(id);
        }
        Ok(admitted)
    }

    pub(crate) fn count<R: rand::Rng>(
        &mut self,
        ids: &[RuleId],
        size: usize,
        strategy: CountingStrategy,
        rng: &mut R,
    ) {
        let started = Instant::now();
        match (size, strategy) {
            (2, _) => count_pairs(self.population, &mut self.arena, ids, &self.covered),
            (_, CountingStrategy::LatticeWalk) => {
                count_lattice(self.population, &mut self.arena, ids, size, &self.covered)
            }
            (_, CountingStrategy::SingleHash) => {
                count_single_hash(self.population, &mut self.arena, ids, &self.covered, rng)
            }
        }
        debug!(
            "counted {} rules of size {size} in {:?}",
            ids.len(),
            started.elapsed()
        );
    }
}

impl RuleSolver {
    /// The rule adding the most score on top of `solution`, searched level
    /// by level up to the configured size with bound pruning. Ties go to the
    /// larger count. `required_column` restricts the search to rules fixing
    /// that (population) column.
    pub fn best_marginal_rule(
        &mut self,
        population: &Population<'_>,
        scorer: &Scorer,
        max_score: u32,
        solution: &[Rule],
        required_column: Option<usize>,
    ) -> Result<Option<ScoredRule>> {
        if let Some(c) = required_column.filter(|c| *c >= population.width()) {
            return Err(SummaryError::InvalidArgument(format!(
                "required column {c} out of range for width {}",
                population.width()
            )));
        }
        if population.width() == 0 || population.is_empty() {
            return Ok(None);
        }
        let mut search = LevelSearch::new(population, scorer, max_score, solution);
        let mut latest = search.seed(required_column);
        let mut best = Incumbent::default();
        for id in &latest {
            best.offer(&search, *id);
        }

        let mut step = self.config.record_trace.then(|| StepTrace {
            solution: solution.to_vec(),
            ..StepTrace::default()
        });
        let max_size = self.config.effective_max_rule_size().min(population.width());
        for size in 2..=max_size {
            let (value, count) = (best.value, best.count);
            let candidates =
                search.expand(&latest, size, |p, c| could_beat(p, c, value, count))?;
            let generated = candidates.len();
            let traced_before = step.as_ref().map_or(0, |s| s.pruned.len());
            let admitted = search.admit(
                candidates,
                |b| !could_beat(b.value, b.count, value, count),
                step.as_mut().map(|s| &mut s.pruned),
            )?;
            if let Some(step) = step.as_mut() {
                for pruned in &mut step.pruned[traced_before..] {
                    pruned.best_value = value;
                    pruned.best_count = count;
                }
            }
            debug!(
                "size {size}: {generated} generated, {} admitted, best {value}",
                admitted.len()
            );
            if admitted.is_empty() {
                break;
            }
            search.count(&admitted, size, self.config.counting, &mut self.rng);
            for id in &admitted {
                best.offer(&search, *id);
            }
            latest = admitted;
        }

        let chosen = best.id.map(|id| search.arena.scored(id));
        if let Some(mut step) = step {
            step.chosen = chosen.clone();
            self.trace.get_or_insert_with(Default::default).steps.push(step);
        }
        Ok(chosen)
    }

    /// Greedy solution of up to `rule_nums` rules, each the best marginal
    /// rule given the ones before it.
    pub fn get_solution(
        &mut self,
        population: &Population<'_>,
        scorer: &Scorer,
        rule_nums: usize,
        max_score: u32,
        required_column: Option<usize>,
    ) -> Result<Vec<ScoredRule>> {
        let mut solution: Vec<ScoredRule> = Vec::with_capacity(rule_nums);
        let mut rules: Vec<Rule> = Vec::with_capacity(rule_nums);
        while solution.len() < rule_nums {
            match self.best_marginal_rule(population, scorer, max_score, &rules, required_column)? {
                Some(found) => {
                    rules.push(found.rule.clone());
                    solution.push(found);
                }
                None => break,
            }
        }
        Ok(solution)
    }

    /// Ranked level-wise search keeping every rule that can still reach the
    /// `k` best marginal values (with an empty solution, `count * score`).
    pub(crate) fn ranked_search<'s, 'p>(
        &mut self,
        population: &'s Population<'p>,
        scorer: &'s Scorer,
        k: usize,
        max_score: u32,
    ) -> Result<(LevelSearch<'s, 'p>, Vec<RuleId>)> {
        let mut search = LevelSearch::new(population, scorer, max_score, &[]);
        if k == 0 || population.width() == 0 || population.is_empty() {
            return Ok((search, Vec::new()));
        }
        let mut latest = search.seed(None);
        let mut ranked: Vec<RuleId> = latest
            .iter()
            .copied()
            .filter(|id| search.arena.stats(*id).count > 0)
            .collect();
        ranked.sort_by(|a, b| search.arena.cmp_priority(*a, *b));

        let max_size = self.config.effective_max_rule_size().min(population.width());
        for size in 2..=max_size {
            let (value, count) = match ranked.get(k - 1) {
                Some(id) => {
                    let s = search.arena.stats(*id);
                    (s.max_marginal_value, s.count)
                }
                None => (-1, 0),
            };
            let below = |v: i64, c: u64| v < value || (v == value && c < count);
            let candidates = search.expand(&latest, size, |p, c| !below(p, c))?;
            let admitted = search.admit(candidates, |b| below(b.value, b.count), None)?;
            debug!(
                "ranked size {size}: {} admitted against threshold {value}",
                admitted.len()
            );
            if admitted.is_empty() {
                break;
            }
            search.count(&admitted, size, self.config.counting, &mut self.rng);
            ranked.extend(
                admitted
                    .iter()
                    .copied()
                    .filter(|id| search.arena.stats(*id).count > 0),
            );
            ranked.sort_by(|a, b| search.arena.cmp_priority(*a, *b));
            latest = admitted;
        }
        Ok((search, ranked))
    }

    /// The `k` rules with the largest `count * score`.
    pub fn top_k_rules(
        &mut self,
        population: &Population<'_>,
        scorer: &Scorer,
        k: usize,
        max_score: u32,
    ) -> Result<Vec<ScoredRule>> {
        let (search, ranked) = self.ranked_search(population, scorer, k, max_score)?;
        Ok(ranked
            .into_iter()
            .take(k)
            .map(|id| search.arena.scored(id))
            .collect())
    }
}
