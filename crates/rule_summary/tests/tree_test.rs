use rule_summary::node::{NodeKey, NodeRule};
use rule_summary::rules::{Rule, RuleStats, ScoredRule};
use rule_summary::sample_handler::SampleHandler;
use rule_summary::scorer::Scorer;
use rule_summary::tree::RuleTree;
use rule_summary::table::Table;
use std::collections::HashMap;
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

fn rule(pairs: &[(usize, i32)]) -> Rule {
    Rule::from_pairs(4, pairs).unwrap()
}

fn atomic(pairs: &[(usize, i32)], count: u64) -> NodeRule {
    let stats = RuleStats {
        count,
        counted: true,
        ..RuleStats::default()
    };
    NodeRule::Atomic(ScoredRule::new(rule(pairs), stats))
}

fn handler() -> SampleHandler {
    SampleHandler::new(1000, 100, 50, 1)
}

#[test]
fn test_new_tree_has_only_the_root() {
    let tree = RuleTree::new(build_table());
    assert_eq!(tree.len(), 1);
    let root = tree.node(tree.root());
    assert!(root.is_root());
    assert!(root.is_leaf());
    assert_eq!(root.count(), 8);
    assert_eq!(tree.lookup(&Rule::empty(4)), Some(tree.root()));
    tree.verify().unwrap();
}

#[test]
fn test_expand_row_and_star() {
    let mut tree = RuleTree::new(build_table());
    let mut handler = handler();
    let root_rule = Rule::empty(4);

    let added = tree
        .expand_row(&root_rule, 2, 1, &Scorer::Size, &mut handler)
        .unwrap();
    assert_eq!(added.len(), 2);
    assert_eq!(tree.node(added[0]).rule.base(), &rule(&[(1, 0)]));
    assert_eq!(tree.node(added[0]).count(), 5);
    assert_eq!(tree.node(added[1]).rule.base(), &rule(&[(1, 1)]));
    assert_eq!(tree.child_rule(&root_rule, 1).unwrap().count(), 3);
    assert!(tree.child_rule(&root_rule, 2).is_none());
    tree.verify().unwrap();

    let starred = tree
        .expand_star(&root_rule, 3, 2, 1, &Scorer::Size, &mut handler)
        .unwrap();
    assert_eq!(starred.len(), 2);
    assert!(starred
        .iter()
        .all(|id| tree.node(*id).rule.base().is_fixed(3)));
    assert_eq!(tree.children(tree.root()).len(), 4);
    tree.verify().unwrap();

    let deeper = tree
        .expand_row(&rule(&[(1, 0)]), 2, 2, &Scorer::Size, &mut handler)
        .unwrap();
    assert!(!deeper.is_empty());
    for id in &deeper {
        let node = tree.node(*id);
        assert_eq!(node.depth, 2);
        assert_eq!(node.rule.base().get(1), 0);
        assert_eq!(node.rule.size(), 2);
    }
    tree.verify().unwrap();
}

#[test]
fn test_add_child_moves_existing_rules() {
    let mut tree = RuleTree::new(build_table());
    let root = tree.root();
    let ax = tree.add_child(root, atomic(&[(0, 0)], 4)).unwrap();
    let b0 = tree.add_child(root, atomic(&[(1, 0)], 5)).unwrap();
    let both = tree.add_child(ax, atomic(&[(0, 0), (1, 0)], 3)).unwrap();
    let grandchild = tree
        .add_child(both, atomic(&[(0, 0), (1, 0), (2, 0)], 2))
        .unwrap();
    assert_eq!(tree.node(grandchild).depth, 3);
    tree.verify().unwrap();

    let moved = tree.add_child(b0, atomic(&[(0, 0), (1, 0)], 3)).unwrap();
    assert_eq!(moved, both);
    assert_eq!(tree.node(both).parent, Some(b0));
    assert!(tree.children(ax).is_empty());
    assert_eq!(tree.children(b0), &[both]);
    assert_eq!(tree.node(grandchild).depth, 3);
    assert_eq!(tree.len(), 5);
    tree.verify().unwrap();
}

#[test]
fn test_add_child_refuses_cycles() {
    let mut tree = RuleTree::new(build_table());
    let root = tree.root();
    let ax = tree.add_child(root, atomic(&[(0, 0)], 4)).unwrap();
    let both = tree.add_child(ax, atomic(&[(0, 0), (1, 0)], 3)).unwrap();

    assert_eq!(tree.add_child(both, atomic(&[(0, 0)], 4)), None);
    assert_eq!(tree.add_child(both, atomic(&[(0, 0), (1, 0)], 3)), None);
    assert_eq!(tree.add_child(ax, atomic(&[], 8)), None);
    assert_eq!(tree.node(both).parent, Some(ax));
    tree.verify().unwrap();
}

#[test]
fn test_contract_and_delete() {
    let mut tree = RuleTree::new(build_table());
    let root = tree.root();
    let ax = tree.add_child(root, atomic(&[(0, 0)], 4)).unwrap();
    let ay = tree.add_child(root, atomic(&[(0, 1)], 4)).unwrap();
    let both = tree.add_child(ax, atomic(&[(0, 0), (1, 0)], 3)).unwrap();
    tree.add_child(both, atomic(&[(0, 0), (1, 0), (2, 0)], 2))
        .unwrap();
    assert_eq!(tree.len(), 5);

    tree.contract_row(&rule(&[(0, 0)]));
    assert_eq!(tree.len(), 3);
    assert!(tree.node(ax).is_leaf());
    assert!(!tree.contains(&rule(&[(0, 0), (1, 0)])));
    assert!(tree.get(both).is_none());
    tree.verify().unwrap();

    // released slots are reused
    let again = tree.add_child(ay, atomic(&[(0, 1), (3, 0)], 3)).unwrap();
    assert!(again < 5);
    tree.verify().unwrap();

    tree.delete_child(&Rule::empty(4), 0);
    assert!(!tree.contains(&rule(&[(0, 0)])));
    assert_eq!(tree.children(root), &[ay]);
    tree.delete_child(&Rule::empty(4), 5);
    assert_eq!(tree.len(), 3);
    tree.verify().unwrap();
}

#[test]
#[should_panic(expected = "is not in the tree")]
fn test_missing_rule_panics() {
    let mut tree = RuleTree::new(build_table());
    tree.contract_row(&rule(&[(2, 1)]));
}

#[test]
fn test_sort_children_by_count() {
    let mut tree = RuleTree::new(build_table());
    let root = tree.root();
    let d_lo = tree.add_child(root, atomic(&[(3, 1)], 3)).unwrap();
    let b0 = tree.add_child(root, atomic(&[(1, 0)], 5)).unwrap();
    let ax = tree.add_child(root, atomic(&[(0, 0)], 4)).unwrap();
    tree.sort_children();
    assert_eq!(tree.children(root), &[b0, ax, d_lo]);
    assert_eq!(tree.preorder(), vec![root, b0, ax, d_lo]);
}

#[test]
fn test_outline_and_tree_info() {
    let mut tree = RuleTree::new(build_table());
    let root = tree.root();
    let ax = tree.add_child(root, atomic(&[(0, 0)], 4)).unwrap();
    tree.add_child(ax, atomic(&[(0, 0), (3, 1)], 2)).unwrap();
    tree.add_child(root, atomic(&[(1, 1)], 3)).unwrap();

    assert_eq!(
        tree.outline(),
        "(all) [8]\n  A=x [4]\n    A=x, D=lo [2]\n  B=1 [3]\n"
    );
    let info = tree.tree_info();
    assert!(info.starts_with("=== Rule Tree ===\n"));
    assert!(info.contains("Total nodes: 4\n"));
    assert!(info.contains("Leaves: 2\n"));
    assert!(info.contains("Maximum depth: 2\n"));
    assert!(info.ends_with("=================\n"));
}

#[test]
fn test_from_children() {
    let table = build_table();
    let root = atomic(&[], 8);
    let mut listing: HashMap<NodeKey, Vec<NodeRule>> = HashMap::new();
    listing.insert(
        root.key(),
        vec![atomic(&[(0, 0)], 4), atomic(&[(0, 1)], 4)],
    );
    listing.insert(
        atomic(&[(0, 1)], 4).key(),
        vec![atomic(&[(0, 1), (1, 1)], 2)],
    );
    let tree = RuleTree::from_children(Arc::clone(&table), root.clone(), &listing).unwrap();
    assert_eq!(tree.len(), 4);
    let ay = tree.lookup(&rule(&[(0, 1)])).unwrap();
    assert_eq!(tree.children(ay).len(), 1);
    tree.verify().unwrap();

    listing.insert(atomic(&[(0, 0)], 4).key(), vec![atomic(&[(0, 1)], 4)]);
    assert!(RuleTree::from_children(table, root, &listing).is_err());
}
