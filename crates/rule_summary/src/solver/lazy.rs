use super::arena::{RuleArena, RuleId};
use super::bounds::count_upper_bound;
use super::counting::gain;
use super::RuleSolver;
use crate::error::{weighted, Result};
use crate::lattice::{is_consistent, rule_union};
use crate::population::Population;
use crate::rules::ScoredRule;
use crate::scorer::Scorer;
use log::debug;

/// Pool of counted rules produced by a ranked search, best first.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    arena: RuleArena,
    order: Vec<RuleId>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn rules(&self) -> Vec<ScoredRule> {
        self.order.iter().map(|id| self.arena.scored(*id)).collect()
    }
}

impl RuleSolver {
    /// Every rule that can still rank among the `rule_nums` best by
    /// `count * score`, counted.
    pub fn candidate_rules(
        &mut self,
        population: &Population<'_>,
        scorer: &Scorer,
        rule_nums: usize,
        max_score: u32,
    ) -> Result<CandidateSet> {
        let (search, order) = self.ranked_search(population, scorer, rule_nums, max_score)?;
        Ok(CandidateSet {
            arena: search.arena,
            order,
        })
    }

    /// Greedy selection over a candidate pool. Each pick uses lower and upper
    /// marginal bounds derived from intersection counts with the rules picked
    /// since the last exact count; the pool is recounted in one pass only when
    /// the leading candidate is not provably the best.
    pub fn lazy_solution(
        &mut self,
        population: &Population<'_>,
        scorer: &Scorer,
        rule_nums: usize,
        max_score: u32,
    ) -> Result<Vec<ScoredRule>> {
        let CandidateSet { mut arena, order } =
            self.candidate_rules(population, scorer, rule_nums, max_score)?;
        let max_size = self.config.effective_max_rule_size();
        let mut pool = order;
        let mut chosen: Vec<RuleId> = Vec::new();
        let mut fresh: Vec<RuleId> = Vec::new();
        let mut baseline_empty = true;
        let mut recounts = 0;
        while chosen.len() < rule_nums && !pool.is_empty() {
            pool.sort_by(|a, b| arena.cmp_priority(*a, *b));
            let undecided = pool.len() > 1
                && arena.stats(pool[0]).min_marginal_value
                    < arena.stats(pool[1]).max_marginal_value;
            if undecided && !fresh.is_empty() {
                recount(population, &mut arena, &pool, &chosen, max_size);
                recounts += 1;
                fresh.clear();
                baseline_empty = chosen.is_empty();
                pool.sort_by(|a, b| arena.cmp_priority(*a, *b));
            }
            let id = pool.remove(0);
            chosen.push(id);
            fresh.push(id);
            estimate(&mut arena, &pool, &fresh, baseline_empty)?;
        }
        debug!("lazy selection of {} rules used {recounts} recounts", chosen.len());
        Ok(chosen.into_iter().map(|id| arena.scored(id)).collect())
    }
}

/// Exact marginal values of the pool against `chosen`, in one lattice walk.
fn recount(
    population: &Population<'_>,
    arena: &mut RuleArena,
    pool: &[RuleId],
    chosen: &[RuleId],
    max_size: usize,
) {
    let mut slots = vec![usize::MAX; arena.len()];
    for (slot, id) in pool.iter().enumerate() {
        slots[*id] = slot;
    }
    let mut marginals = vec![0i64; pool.len()];
    for tuple in population.tuples() {
        let covered = chosen
            .iter()
            .filter(|id| arena.rule(**id).covers(tuple))
            .map(|id| arena.stats(*id).score)
            .max()
            .unwrap_or(0);
        arena.for_each_covering(tuple, max_size, |id| {
            if slots[id] != usize::MAX {
                marginals[slots[id]] += gain(arena.stats(id).score, covered);
            }
        });
    }
    for (slot, id) in pool.iter().enumerate() {
        let count = arena.stats(*id).count;
        arena.stats_mut(*id).settle(count, marginals[slot]);
    }
}

/// Refreshes the marginal bounds of the pool after the `fresh` picks.
fn estimate(
    arena: &mut RuleArena,
    pool: &[RuleId],
    fresh: &[RuleId],
    baseline_empty: bool,
) -> Result<()> {
    for id in pool {
        let rule = arena.rule(*id);
        let stats = *arena.stats(*id);
        let mut lower = stats.latest_counted_marginal_value;
        let mut largest_exact_cut = 0i64;
        for picked in fresh {
            let other = arena.rule(*picked);
            let other_stats = arena.stats(*picked);
            if !is_consistent(rule, other) {
                continue;
            }
            let union = rule_union(rule, other)?;
            let known = arena.get(&union).filter(|u| arena.stats(*u).counted);
            let overlap = match known {
                Some(u) => arena.stats(u).count,
                None => count_upper_bound(arena, &union)?
                    .min(stats.count)
                    .min(other_stats.count),
            };
            let cut = weighted(overlap, i64::from(stats.score.min(other_stats.score)), 0)?;
            lower -= cut;
            if known.is_some() {
                largest_exact_cut = largest_exact_cut.max(cut);
            }
        }
        let mut upper = stats.max_marginal_value.min(stats.latest_counted_marginal_value);
        if baseline_empty {
            upper = upper.min(stats.latest_counted_marginal_value - largest_exact_cut);
        }
        let stats = arena.stats_mut(*id);
        stats.max_marginal_value = upper.max(0);
        stats.min_marginal_value = lower.max(0).min(stats.max_marginal_value);
    }
    Ok(())
}
