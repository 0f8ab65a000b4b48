use rule_summary::drill_down::{
    drill_down_tree, filter_by_column, filter_by_column_list, sort_rules, SortKey,
};
use rule_summary::node::NodeRule;
use rule_summary::rules::{Rule, RuleStats, ScoredRule};
use rule_summary::solver::RuleSolver;
use rule_summary::scorer::Scorer;
use rule_summary::table::Table;
use rule_summary::tree::RuleTree;
use std::collections::HashSet;
use std::sync::Arc;

fn build_table() -> Arc<Table> {
    let table = Table::from_rows(
        &["A", "B", "C", "D"],
        [
            ["x", "0", "p", "hi"],
            ["x", "0", "p", "hi"],
            ["x", "1", "q", "lo"],
            ["x", "0", "q", "lo"],
            ["y", "0", "p", "lo"],
            ["y", "1", "p", "hi"],
            ["y", "0", "q", "hi"],
            ["y", "1", "q", "hi"],
        ],
    )
    .unwrap();
    Arc::new(table)
}

fn scored(table: &Table, pairs: &[(usize, i32)]) -> ScoredRule {
    let rule = Rule::from_pairs(4, pairs).unwrap();
    let stats = RuleStats {
        count: table.count(&rule).unwrap(),
        score: rule.size() as u32,
        counted: true,
        ..RuleStats::default()
    };
    ScoredRule::new(rule, stats)
}

fn sample_rules(table: &Table) -> Vec<ScoredRule> {
    vec![
        scored(table, &[(1, 0)]),
        scored(table, &[(0, 1), (1, 1)]),
        scored(table, &[(0, 0)]),
        scored(table, &[(0, 0), (2, 0)]),
        scored(table, &[(0, 0), (1, 0)]),
        scored(table, &[(2, 0)]),
    ]
}

fn values(rules: &[ScoredRule]) -> Vec<Vec<i32>> {
    rules.iter().map(|r| r.rule.values().to_vec()).collect()
}

/// Every inner node's children add up to its count.
fn assert_exhaustive(tree: &RuleTree) {
    for id in tree.preorder() {
        let node = tree.node(id);
        if node.is_leaf() {
            continue;
        }
        let total: u64 = node.children.iter().map(|c| tree.node(*c).count()).sum();
        assert_eq!(total, node.count(), "children of {:?}", node.rule.base());
    }
}

#[test]
fn test_filter_by_column() {
    let table = build_table();
    let rules = sample_rules(&table);
    let include = HashSet::from([0]);
    let exclude = HashSet::from([2]);
    let kept = filter_by_column(&rules, &include, &exclude);
    assert_eq!(
        values(&kept),
        vec![vec![1, 1, -1, -1], vec![0, -1, -1, -1], vec![0, 0, -1, -1]]
    );
    assert_eq!(
        filter_by_column(&rules, &HashSet::new(), &HashSet::new()).len(),
        rules.len()
    );
}

#[test]
fn test_filter_by_column_list_keeps_prefixes() {
    let table = build_table();
    let rules = sample_rules(&table);
    let exclude = HashSet::from([2, 3]);
    let kept = filter_by_column_list(&rules, &[0, 1], &exclude);
    assert_eq!(
        values(&kept),
        vec![vec![1, 1, -1, -1], vec![0, -1, -1, -1], vec![0, 0, -1, -1]]
    );

    // B alone skips the A level
    let reversed = filter_by_column_list(&rules, &[1, 0], &exclude);
    assert_eq!(
        values(&reversed),
        vec![vec![-1, 0, -1, -1], vec![1, 1, -1, -1], vec![0, 0, -1, -1]]
    );
}

#[test]
fn test_sort_rules() {
    let table = build_table();
    let mut rules = vec![
        scored(&table, &[(0, 1)]),
        scored(&table, &[(0, 0), (1, 0)]),
        scored(&table, &[(1, 0)]),
        scored(&table, &[(0, 0)]),
    ];
    sort_rules(
        &table,
        &mut rules,
        &[
            SortKey::Column {
                column: 0,
                descending: false,
            },
            SortKey::Count { descending: true },
        ],
    );
    // "*" sorts before the labels
    assert_eq!(
        values(&rules),
        vec![
            vec![-1, 0, -1, -1],
            vec![0, -1, -1, -1],
            vec![0, 0, -1, -1],
            vec![1, -1, -1, -1],
        ]
    );

    sort_rules(&table, &mut rules, &[SortKey::Size { descending: true }]);
    assert_eq!(rules[0].rule.values(), &[0, 0, -1, -1]);
}

#[test]
fn test_drill_down_fills_prefixes_and_remainders() {
    let table = build_table();
    let rules = sample_rules(&table);
    let tree = drill_down_tree(Arc::clone(&table), &rules, &[0, 1]).unwrap();
    tree.verify().unwrap();
    assert_eq!(tree.len(), 7);

    let root = tree.root();
    let top: Vec<Rule> = tree
        .children(root)
        .iter()
        .map(|id| tree.node(*id).rule.base().clone())
        .collect();
    assert_eq!(
        top,
        vec![
            Rule::from_pairs(4, &[(0, 0)]).unwrap(),
            Rule::from_pairs(4, &[(0, 1)]).unwrap(),
        ]
    );

    // A=y was never searched: counted on the table, with no score
    let ay = tree.lookup(&Rule::from_pairs(4, &[(0, 1)]).unwrap()).unwrap();
    let ay_rule = tree.node(ay).rule.atomic().unwrap();
    assert_eq!(ay_rule.count(), 4);
    assert_eq!(ay_rule.score(), 0);

    let ax = tree.lookup(&Rule::from_pairs(4, &[(0, 0)]).unwrap()).unwrap();
    let remainder = &tree.node(*tree.children(ax).last().unwrap()).rule;
    match remainder {
        NodeRule::Compound(c) => {
            assert_eq!(c.count(), 1);
            assert_eq!(c.rule_string(&table), "x, 1, *, *");
        }
        NodeRule::Atomic(r) => panic!("expected a compound remainder, found {}", r.rule),
    }
    assert_exhaustive(&tree);
}

#[test]
fn test_drill_down_over_solver_rules() {
    let table = build_table();
    let population = table.population();
    let rules = RuleSolver::default()
        .top_k_rules(&population, &Scorer::Size, 30, 2)
        .unwrap();
    for drill in [vec![0, 1], vec![3, 2], vec![1]] {
        let tree = drill_down_tree(Arc::clone(&table), &rules, &drill).unwrap();
        tree.verify().unwrap();
        assert_exhaustive(&tree);
        for id in tree.preorder() {
            let node = tree.node(id);
            let fixed: Vec<usize> = node.rule.base().fixed_columns().collect();
            let mut expected = drill[..node.rule.base().size()].to_vec();
            expected.sort();
            assert_eq!(fixed, expected);
        }
    }
}

#[test]
fn test_drill_down_without_rules_is_the_root() {
    let table = build_table();
    let tree = drill_down_tree(Arc::clone(&table), &[], &[0]).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.node(tree.root()).count(), 8);
}

#[test]
fn test_drill_down_rejects_bad_columns() {
    let table = build_table();
    let rules = sample_rules(&table);
    assert!(drill_down_tree(Arc::clone(&table), &rules, &[]).is_err());
    assert!(drill_down_tree(Arc::clone(&table), &rules, &[4]).is_err());
    assert!(drill_down_tree(Arc::clone(&table), &rules, &[1, 1]).is_err());
}
