use super::arena::{RuleArena, RuleId};
use crate::error::{weighted, Result};
use crate::lattice::is_sub_rule;
use crate::rules::Rule;

/// Upper bounds on the marginal value and the count of a rule and of every
/// super-rule of it scoring at most `max_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bound {
    pub value: i64,
    pub count: u64,
}

impl Bound {
    pub(crate) const OPEN: Bound = Bound {
        value: i64::MAX,
        count: u64::MAX,
    };
}

/// Tightens the bound with every sub-rule of `rule` known to the arena, the
/// immediate ones first. Stops as soon as `settled` accepts the bound.
pub(crate) fn upper_bound<F>(
    arena: &RuleArena,
    rule: &Rule,
    max_score: u32,
    settled: F,
) -> Result<Bound>
where
    F: Fn(&Bound) -> bool,
{
    let mut bound = Bound::OPEN;
    for column in rule.fixed_columns() {
        if let Some(id) = arena.get(&rule.without(column)) {
            tighten(arena, id, max_score, &mut bound)?;
            if settled(&bound) {
                return Ok(bound);
            }
        }
    }
    if rule.size() <= 2 {
        return Ok(bound);
    }
    let deeper = |id: &RuleId| arena.rule(*id).size() + 1 < rule.size();
    let mut stack: Vec<RuleId> = rule
        .fixed_values()
        .filter_map(|(c, v)| arena.single(c, v))
        .collect();
    while let Some(id) = stack.pop() {
        tighten(arena, id, max_score, &mut bound)?;
        if settled(&bound) {
            return Ok(bound);
        }
        stack.extend(
            arena
                .super_rules(id)
                .iter()
                .filter(|child| deeper(child) && is_sub_rule(arena.rule(**child), rule)),
        );
    }
    Ok(bound)
}

/// Smallest count among the known sub-rules of `rule`.
pub(crate) fn count_upper_bound(arena: &RuleArena, rule: &Rule) -> Result<u64> {
    upper_bound(arena, rule, 0, |_| false).map(|b| b.count)
}

fn tighten(arena: &RuleArena, id: RuleId, max_score: u32, bound: &mut Bound) -> Result<()> {
    let stats = arena.stats(id);
    let headroom = i64::from(max_score) - i64::from(stats.score);
    let value = weighted(stats.count, headroom, stats.max_marginal_value)?;
    bound.value = bound.value.min(value);
    bound.count = bound.count.min(stats.count);
    Ok(())
}
