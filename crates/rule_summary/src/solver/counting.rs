use super::arena::{RuleArena, RuleId};
use crate::population::Population;
use rand::Rng;
use rustc_hash::FxHashMap;

/// What a tuple adds to the marginal value of a rule scoring `score` when the
/// best solution rule covering it scores `covered`.
pub(crate) fn gain(score: u32, covered: u32) -> i64 {
    i64::from(score - score.min(covered))
}

/// Count and marginal-value accumulators for a batch of rules.
struct Tally {
    counts: Vec<u64>,
    marginals: Vec<i64>,
}

impl Tally {
    fn new(len: usize) -> Self {
        Self {
            counts: vec![0; len],
            marginals: vec![0; len],
        }
    }

    fn add(&mut self, slot: usize, score: u32, covered: u32) {
        self.counts[slot] += 1;
        self.marginals[slot] += gain(score, covered);
    }

    fn settle(self, arena: &mut RuleArena, ids: &[RuleId]) {
        for (slot, id) in ids.iter().enumerate() {
            arena
                .stats_mut(*id)
                .settle(self.counts[slot], self.marginals[slot]);
        }
    }
}

/// Size-two rules: one lookup per column pair of every tuple.
pub(crate) fn count_pairs(
    population: &Population<'_>,
    arena: &mut RuleArena,
    ids: &[RuleId],
    covered: &[u32],
) {
    let mut index: FxHashMap<(usize, i32, usize, i32), usize> = FxHashMap::default();
    for (slot, id) in ids.iter().enumerate() {
        let mut fixed = arena.rule(*id).fixed_values();
        if let (Some((a, va)), Some((b, vb))) = (fixed.next(), fixed.next()) {
            index.insert((a, va, b, vb), slot);
        }
    }
    let scores: Vec<u32> = ids.iter().map(|id| arena.stats(*id).score).collect();
    let mut tally = Tally::new(ids.len());
    let width = population.width();
    for (t, tuple) in population.tuples().enumerate() {
        for a in 0..width {
            for b in a + 1..width {
                if let Some(slot) = index.get(&(a, tuple[a], b, tuple[b])) {
                    tally.add(*slot, scores[*slot], covered[t]);
                }
            }
        }
    }
    tally.settle(arena, ids);
}

/// Rules of `size` counted by walking the adjacency from each tuple's single-column rules.
pub(crate) fn count_lattice(
    population: &Population<'_>,
    arena: &mut RuleArena,
    ids: &[RuleId],
    size: usize,
    covered: &[u32],
) {
    let mut slots = vec![usize::MAX; arena.len()];
    for (slot, id) in ids.iter().enumerate() {
        slots[*id] = slot;
    }
    let mut tally = Tally::new(ids.len());
    for (t, tuple) in population.tuples().enumerate() {
        arena.for_each_covering(tuple, size, |id| {
            let slot = slots[id];
            if slot != usize::MAX {
                tally.add(slot, arena.stats(id).score, covered[t]);
            }
        });
    }
    tally.settle(arena, ids);
}

/// Every rule is bucketed under one of its own fixed columns, chosen
/// uniformly at random, so each covering tuple reaches it exactly once.
pub(crate) fn count_single_hash<R: Rng>(
    population: &Population<'_>,
    arena: &mut RuleArena,
    ids: &[RuleId],
    covered: &[u32],
    rng: &mut R,
) {
    let width = population.width();
    let mut buckets: Vec<FxHashMap<i32, Vec<usize>>> = vec![FxHashMap::default(); width];
    for (slot, id) in ids.iter().enumerate() {
        let rule = arena.rule(*id);
        let fixed: Vec<usize> = rule.fixed_columns().collect();
        if fixed.is_empty() {
            continue;
        }
        let column = fixed[rng.random_range(0..fixed.len())];
        buckets[column]
            .entry(rule.get(column))
            .or_default()
            .push(slot);
    }
    let mut tally = Tally::new(ids.len());
    for (t, tuple) in population.tuples().enumerate() {
        for (column, bucket) in buckets.iter().enumerate() {
            let Some(slots) = bucket.get(&tuple[column]) else {
                continue;
            };
            for slot in slots {
                let id = ids[*slot];
                if arena.rule(id).covers(tuple) {
                    tally.add(*slot, arena.stats(id).score, covered[t]);
                }
            }
        }
    }
    tally.settle(arena, ids);
}
