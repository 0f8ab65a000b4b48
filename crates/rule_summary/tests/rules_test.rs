use rule_summary::compound::CompoundRule;
use rule_summary::conf::{SET_VALUE, WILDCARD};
use rule_summary::rules::{Rule, RuleStats, ScoredRule};
use rule_summary::table::Table;
use std::collections::{BTreeMap, BTreeSet, HashSet};

fn build_table() -> Table {
    Table::from_rows(
        &["city", "plan", "device"],
        [
            ["paris", "free", "ios"],
            ["paris", "pro", "android"],
            ["lyon", "free", "ios"],
            ["nice", "free", "web"],
        ],
    )
    .unwrap()
}

fn scored(values: &[i32], count: u64, max_mv: i64, min_mv: i64) -> ScoredRule {
    let stats = RuleStats {
        count,
        score: 1,
        counted: true,
        latest_counted_marginal_value: max_mv,
        min_marginal_value: min_mv,
        max_marginal_value: max_mv,
    };
    ScoredRule::new(Rule::new(values.to_vec()).unwrap(), stats)
}

#[test]
fn test_rule_construction() {
    let r = Rule::new(vec![0, WILDCARD, 2]).unwrap();
    assert_eq!(r.len(), 3);
    assert_eq!(r.size(), 2);
    assert!(r.is_fixed(0));
    assert!(!r.is_fixed(1));
    assert_eq!(r.fixed_columns().collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(r.fixed_values().collect::<Vec<_>>(), vec![(0, 0), (2, 2)]);

    assert!(Rule::new(vec![0, -3]).is_err());
    assert_eq!(Rule::from_pairs(3, &[(0, 0), (2, 2)]).unwrap(), r);
    assert!(Rule::from_pairs(2, &[(4, 0)]).is_err());
    assert_eq!(Rule::empty(4).size(), 0);
    assert_eq!(Rule::from_tuple(&[1, 2]).size(), 2);
}

#[test]
fn test_rule_equality_follows_values() {
    let a = Rule::new(vec![0, WILDCARD]).unwrap();
    let b = Rule::empty(2).with_value(0, 0);
    assert_eq!(a, b);
    let set: HashSet<Rule> = [a.clone(), b].into_iter().collect();
    assert_eq!(set.len(), 1);
    assert_eq!(a.with_value(1, 1).without(1), a);
}

#[test]
fn test_rule_covers_tuples() {
    let r = Rule::new(vec![0, WILDCARD, 1]).unwrap();
    assert!(r.covers(&[0, 5, 1]));
    assert!(!r.covers(&[1, 5, 1]));
    assert!(Rule::empty(3).covers(&[4, 4, 4]));
}

#[test]
fn test_rule_rendering() {
    let table = build_table();
    let r = Rule::new(vec![0, WILDCARD, 1]).unwrap();
    assert_eq!(r.to_string(), "Rule(0, *, 1)");
    assert_eq!(r.rule_string(&table), "paris, *, android");
    assert_eq!(r.sparse_string(&table), "city=paris, device=android");
    assert_eq!(Rule::empty(3).sparse_string(&table), "(all)");
}

#[test]
fn test_priority_order() {
    let mut rules = vec![
        scored(&[0, -1], 3, 10, 10),
        scored(&[1, -1], 9, 12, 4),
        scored(&[-1, 0], 2, 12, 8),
        scored(&[-1, 1], 5, 12, 8),
    ];
    rules.sort_by(|a, b| a.priority_cmp(b));
    let order: Vec<Vec<i32>> = rules.iter().map(|r| r.rule.values().to_vec()).collect();
    assert_eq!(
        order,
        vec![vec![-1, 1], vec![-1, 0], vec![1, -1], vec![0, -1]]
    );
}

#[test]
fn test_uncounted_stats_carry_the_bound() {
    let stats = RuleStats::uncounted(2, 40);
    assert!(!stats.counted);
    assert_eq!(stats.score, 2);
    assert_eq!(stats.max_marginal_value, 40);
    assert_eq!(stats.min_marginal_value, 0);
}

#[test]
fn test_compound_rule() {
    let table = build_table();
    let base = Rule::new(vec![WILDCARD, 0, WILDCARD]).unwrap();
    let sets = BTreeMap::from([(0, BTreeSet::from([1, 2]))]);
    let compound = CompoundRule::new(base.clone(), sets, 2).unwrap();

    assert_eq!(compound.size(), 2);
    assert_eq!(compound.count(), 2);
    assert_eq!(compound.values(), vec![SET_VALUE, 0, WILDCARD]);
    assert!(compound.covers(&[1, 0, 0]));
    assert!(compound.covers(&[2, 0, 2]));
    assert!(!compound.covers(&[0, 0, 0]));
    assert_eq!(compound.rule_string(&table), "lyon or nice, free, *");
    assert_eq!(compound.to_string(), "CompoundRule(1 or 2, 0, *) count=2");
}

#[test]
fn test_compound_rule_rejects_bad_sets() {
    let base = Rule::new(vec![0, WILDCARD]).unwrap();
    let fixed = BTreeMap::from([(0, BTreeSet::from([1]))]);
    assert!(CompoundRule::new(base.clone(), fixed, 1).is_err());
    let empty = BTreeMap::from([(1, BTreeSet::new())]);
    assert!(CompoundRule::new(base.clone(), empty, 1).is_err());
    let out_of_range = BTreeMap::from([(5, BTreeSet::from([0]))]);
    assert!(CompoundRule::new(base, out_of_range, 1).is_err());
}
