//! Relations and enumerations over the rule lattice.
//!
//! A rule `a` is a sub-rule of `b` when every column fixed by `a` is fixed by
//! `b` to the same code, so `a` covers a superset of `b`'s tuples.

use crate::conf::WILDCARD;
use crate::error::{Result, SummaryError};
use crate::rules::Rule;
use itertools::Itertools;

/// No column is fixed to two different codes.
pub fn is_consistent(a: &Rule, b: &Rule) -> bool {
    a.len() == b.len()
        && a
            .values()
            .iter()
            .zip(b.values())
            .all(|(x, y)| *x == WILDCARD || *y == WILDCARD || x == y)
}

pub fn are_consistent(rules: &[Rule]) -> bool {
    rules
        .iter()
        .tuple_combinations()
        .all(|(a, b)| is_consistent(a, b))
}

/// `sub` fixes a subset of `sup`'s columns, with matching codes.
pub fn is_sub_rule(sub: &Rule, sup: &Rule) -> bool {
    sub.len() == sup.len()
        && sub
            .values()
            .iter()
            .zip(sup.values())
            .all(|(s, p)| *s == WILDCARD || s == p)
}

/// Tuple form of `is_sub_rule`.
pub fn covers(rule: &Rule, tuple: &[i32]) -> bool {
    rule.len() == tuple.len() && rule.covers(tuple)
}

/// The rule fixing every column fixed by either input.
pub fn rule_union(a: &Rule, b: &Rule) -> Result<Rule> {
    if a.len() != b.len() {
        return Err(SummaryError::LengthMismatch {
            expected: a.len(),
            found: b.len(),
        });
    }
    if !is_consistent(a, b) {
        return Err(SummaryError::InvalidArgument(format!(
            "cannot unite inconsistent rules {a} and {b}"
        )));
    }
    let values = a
        .values()
        .iter()
        .zip(b.values())
        .map(|(x, y)| if *x == WILDCARD { *y } else { *x })
        .collect();
    Ok(Rule::from_values_unchecked(values))
}

pub fn rule_union_all(rules: &[Rule]) -> Result<Rule> {
    let (first, rest) = rules
        .split_first()
        .ok_or_else(|| SummaryError::InvalidArgument("union of no rules".to_string()))?;
    rest.iter()
        .try_fold(first.clone(), |acc, rule| rule_union(&acc, rule))
}

/// All sub-rules fixing exactly `size` of the rule's fixed columns.
pub fn find_sub_rules(rule: &Rule, size: usize) -> Vec<Rule> {
    if size > rule.size() {
        return Vec::new();
    }
    if size == rule.size() {
        return vec![rule.clone()];
    }
    rule.fixed_columns()
        .combinations(size)
        .map(|kept| {
            let mut values = vec![WILDCARD; rule.len()];
            for c in kept {
                values[c] = rule.get(c);
            }
            Rule::from_values_unchecked(values)
        })
        .collect()
}

/// All super-rules fixing exactly `size` columns, filling wildcards with every
/// code of the column (`cardinalities[c]` codes in column `c`).
pub fn find_super_rules(rule: &Rule, cardinalities: &[usize], size: usize) -> Vec<Rule> {
    if size > rule.len() || size < rule.size() {
        return Vec::new();
    }
    if size == rule.size() {
        return vec![rule.clone()];
    }
    let open: Vec<usize> = (0..rule.len()).filter(|c| !rule.is_fixed(*c)).collect();
    let mut out = Vec::new();
    for columns in open.into_iter().combinations(size - rule.size()) {
        let domains: Vec<_> = columns
            .iter()
            .map(|c| 0..cardinalities[*c] as i32)
            .collect();
        for codes in domains.into_iter().multi_cartesian_product() {
            let mut values = rule.values().to_vec();
            for (c, v) in columns.iter().zip(codes) {
                values[*c] = v;
            }
            out.push(Rule::from_values_unchecked(values));
        }
    }
    out
}

/// Rules of `size` lying between `sub` and `sup` in the lattice.
pub fn find_sub_super_rules(sub: &Rule, sup: &Rule, size: usize) -> Result<Vec<Rule>> {
    if !is_sub_rule(sub, sup) {
        return Err(SummaryError::InvalidArgument(format!(
            "{sub} is not a sub-rule of {sup}"
        )));
    }
    if size < sub.size() {
        return Ok(Vec::new());
    }
    let mut diff = sup.values().to_vec();
    for c in sub.fixed_columns() {
        diff[c] = WILDCARD;
    }
    let diff = Rule::from_values_unchecked(diff);
    Ok(find_sub_rules(&diff, size - sub.size())
        .into_iter()
        .map(|r| {
            let mut values = r.values().to_vec();
            for (c, v) in sub.fixed_values() {
                values[c] = v;
            }
            Rule::from_values_unchecked(values)
        })
        .collect())
}
