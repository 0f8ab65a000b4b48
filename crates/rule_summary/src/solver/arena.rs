use crate::rules::{priority, Rule, RuleStats, ScoredRule};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

pub type RuleId = usize;

/// Id-indexed store of the rules met during one search, with their search
/// metadata and the super-rule adjacency. Every rule but the single-column
/// ones is linked under exactly one sub-rule already in the arena, so the
/// adjacency forms a forest rooted at the single-column rules.
#[derive(Debug, Default, Clone)]
pub struct RuleArena {
    rules: Vec<Rule>,
    stats: Vec<RuleStats>,
    super_rules: Vec<Vec<RuleId>>,
    index: FxHashMap<Rule, RuleId>,
    singles: FxHashMap<(usize, i32), RuleId>,
}

impl RuleArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Adds `rule` unless present; returns its id either way.
    pub fn insert(&mut self, rule: Rule, stats: RuleStats) -> RuleId {
        if let Some(id) = self.index.get(&rule) {
            return *id;
        }
        let id = self.rules.len();
        if rule.size() == 1 {
            if let Some(pair) = rule.fixed_values().next() {
                self.singles.insert(pair, id);
            }
        }
        self.index.insert(rule.clone(), id);
        self.rules.push(rule);
        self.stats.push(stats);
        self.super_rules.push(Vec::new());
        id
    }

    pub fn get(&self, rule: &Rule) -> Option<RuleId> {
        self.index.get(rule).copied()
    }

    pub fn single(&self, column: usize, code: i32) -> Option<RuleId> {
        self.singles.get(&(column, code)).copied()
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    pub fn stats(&self, id: RuleId) -> &RuleStats {
        &self.stats[id]
    }

    pub fn stats_mut(&mut self, id: RuleId) -> &mut RuleStats {
        &mut self.stats[id]
    }

    pub fn super_rules(&self, id: RuleId) -> &[RuleId] {
        &self.super_rules[id]
    }

    /// Records `child` under `parent` in the adjacency.
    pub fn link(&mut self, parent: RuleId, child: RuleId) {
        self.super_rules[parent].push(child);
    }

    /// Links a new rule under the first of its immediate sub-rules found in the arena.
    pub fn link_under_sub_rule(&mut self, id: RuleId) -> bool {
        let rule = &self.rules[id];
        let parent = rule
            .fixed_columns()
            .find_map(|c| self.index.get(&rule.without(c)).copied());
        match parent {
            Some(parent) => {
                self.link(parent, id);
                true
            }
            None => false,
        }
    }

    pub fn scored(&self, id: RuleId) -> ScoredRule {
        ScoredRule::new(self.rules[id].clone(), self.stats[id])
    }

    /// Best-first order over ids.
    pub fn cmp_priority(&self, a: RuleId, b: RuleId) -> Ordering {
        priority(&self.rules[a], &self.stats[a], &self.rules[b], &self.stats[b])
    }

    /// Calls `visit` for every arena rule of size at most `max_size` covering
    /// `tuple`, walking the adjacency from the covering single-column rules.
    pub fn for_each_covering<F>(&self, tuple: &[i32], max_size: usize, mut visit: F)
    where
        F: FnMut(RuleId),
    {
        let mut stack: Vec<RuleId> = tuple
            .iter()
            .enumerate()
            .filter_map(|(c, v)| self.single(c, *v))
            .collect();
        while let Some(id) = stack.pop() {
            visit(id);
            if self.rules[id].size() >= max_size {
                continue;
            }
            stack.extend(
                self.super_rules[id]
                    .iter()
                    .copied()
                    .filter(|child| self.rules[*child].covers(tuple)),
            );
        }
    }
}
