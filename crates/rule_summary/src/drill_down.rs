use crate::compound::CompoundRule;
use crate::error::{Result, SummaryError};
use crate::node::{NodeKey, NodeRule};
use crate::rules::{Rule, RuleStats, ScoredRule};
use crate::table::Table;
use crate::tree::RuleTree;
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

// -------------------
// Rule filters
// -------------------

/// Rules fixing every column of `include` and none of `exclude`.
pub fn filter_by_column(
    rules: &[ScoredRule],
    include: &HashSet<usize>,
    exclude: &HashSet<usize>,
) -> Vec<ScoredRule> {
    rules
        .iter()
        .filter(|r| {
            (0..r.rule.len()).all(|c| {
                let fixed = r.rule.is_fixed(c);
                !(exclude.contains(&c) && fixed) && !(include.contains(&c) && !fixed)
            })
        })
        .cloned()
        .collect()
}

/// Rules whose fixed columns among `include` form a prefix of it and that
/// fix none of `exclude`.
pub fn filter_by_column_list(
    rules: &[ScoredRule],
    include: &[usize],
    exclude: &HashSet<usize>,
) -> Vec<ScoredRule> {
    rules
        .iter()
        .filter(|r| {
            if exclude.iter().any(|c| r.rule.is_fixed(*c)) {
                return false;
            }
            let prefix = include.iter().take_while(|c| r.rule.is_fixed(**c)).count();
            include[prefix..].iter().all(|c| !r.rule.is_fixed(*c))
        })
        .cloned()
        .collect()
}

/// One level of a rule ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// By the label shown for the column (`*` when the rule leaves it free).
    Column { column: usize, descending: bool },
    Count { descending: bool },
    Size { descending: bool },
}

impl SortKey {
    fn compare(&self, table: &Table, a: &ScoredRule, b: &ScoredRule) -> Ordering {
        let (ord, descending) = match *self {
            SortKey::Column { column, descending } => (
                table
                    .label(column, a.rule.get(column))
                    .cmp(&table.label(column, b.rule.get(column))),
                descending,
            ),
            SortKey::Count { descending } => (a.count().cmp(&b.count()), descending),
            SortKey::Size { descending } => (a.rule.size().cmp(&b.rule.size()), descending),
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// Stable sort by the keys in order; ties fall through to the next key.
pub fn sort_rules(table: &Table, rules: &mut [ScoredRule], keys: &[SortKey]) {
    rules.sort_by(|a, b| {
        keys.iter()
            .map(|k| k.compare(table, a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

// -------------------
// Static drill-down
// -------------------

/// Builds a tree from already computed rules without running the solver.
///
/// Only rules whose fixed columns are exactly a non-empty prefix of
/// `drill_columns` are placed; each hangs under the rule fixing one column
/// less. Prefixes that are needed as parents but missing from `rules` are
/// counted on the table. Wherever the children of a node do not add up to the
/// node's count, a compound child collects the values of the next drill
/// column that have no rule, so every inner node is exhaustively covered.
pub fn drill_down_tree(
    table: Arc<Table>,
    rules: &[ScoredRule],
    drill_columns: &[usize],
) -> Result<RuleTree> {
    check_drill_columns(&table, drill_columns)?;
    let width = table.num_columns();
    let drill_set: HashSet<usize> = drill_columns.iter().copied().collect();
    let exclude: HashSet<usize> = (0..width).filter(|c| !drill_set.contains(c)).collect();

    let mut known: HashMap<Rule, ScoredRule> = HashMap::new();
    for rule in filter_by_column_list(rules, drill_columns, &exclude) {
        if rule.rule.len() == width && rule.rule.size() > 0 {
            known.entry(rule.rule.clone()).or_insert(rule);
        }
    }

    let missing: BTreeSet<Rule> = known
        .keys()
        .flat_map(|r| (1..r.size()).map(move |depth| prefix_rule(r, drill_columns, depth)))
        .filter(|p| !known.contains_key(p))
        .collect();
    if !missing.is_empty() {
        debug!("counting {} missing drill-down prefixes", missing.len());
        for (rule, count) in count_exactly(&table, &missing) {
            let stats = RuleStats {
                count,
                counted: true,
                ..RuleStats::default()
            };
            known.insert(rule.clone(), ScoredRule::new(rule, stats));
        }
    }

    let mut placed: Vec<ScoredRule> = known.into_values().collect();
    let mut keys: Vec<SortKey> = drill_columns
        .iter()
        .map(|c| SortKey::Column {
            column: *c,
            descending: false,
        })
        .collect();
    keys.push(SortKey::Count { descending: true });
    sort_rules(&table, &mut placed, &keys);

    let root_rule = Rule::empty(width);
    let root = ScoredRule::new(
        root_rule.clone(),
        RuleStats {
            count: table.len() as u64,
            counted: true,
            ..RuleStats::default()
        },
    );

    let mut grouped: BTreeMap<Rule, Vec<ScoredRule>> = BTreeMap::new();
    for rule in placed {
        let parent = prefix_rule(&rule.rule, drill_columns, rule.rule.size() - 1);
        grouped.entry(parent).or_default().push(rule);
    }

    let mut counts: HashMap<&Rule, u64> = HashMap::new();
    counts.insert(&root_rule, root.count());
    for listed in grouped.values() {
        for r in listed {
            counts.insert(&r.rule, r.count());
        }
    }

    let mut children: HashMap<NodeKey, Vec<NodeRule>> = HashMap::new();
    for (parent, listed) in &grouped {
        let depth = parent.size();
        let column = drill_columns[depth];
        let parent_count = counts.get(parent).copied().unwrap_or(0);
        let covered: u64 = listed.iter().map(|r| r.count()).sum();
        let present: HashSet<i32> = listed.iter().map(|r| r.rule.get(column)).collect();
        let absent: BTreeSet<i32> = (0..table.cardinality(column) as i32)
            .filter(|v| !present.contains(v))
            .collect();

        let mut row: Vec<NodeRule> = listed.iter().cloned().map(NodeRule::Atomic).collect();
        if covered > parent_count {
            warn!("children of {parent} count {covered} tuples, more than its {parent_count}");
        } else if covered < parent_count {
            if absent.is_empty() {
                warn!(
                    "children of {parent} cover every value of column {column} but only {covered} of {parent_count} tuples"
                );
            } else {
                let sets = BTreeMap::from([(column, absent)]);
                let remainder = CompoundRule::new(parent.clone(), sets, parent_count - covered)?;
                row.push(NodeRule::Compound(remainder));
            }
        }
        children.insert(NodeKey::Atomic(parent.clone()), row);
    }

    RuleTree::from_children(table, NodeRule::Atomic(root), &children)
}

fn check_drill_columns(table: &Table, drill_columns: &[usize]) -> Result<()> {
    if drill_columns.is_empty() {
        return Err(SummaryError::InvalidArgument(
            "at least one drill column is needed".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for c in drill_columns {
        if *c >= table.num_columns() || !seen.insert(*c) {
            return Err(SummaryError::InvalidArgument(format!(
                "bad drill column {c} in {drill_columns:?}"
            )));
        }
    }
    Ok(())
}

/// `rule` restricted to its first `depth` drill columns.
fn prefix_rule(rule: &Rule, drill_columns: &[usize], depth: usize) -> Rule {
    drill_columns[depth..]
        .iter()
        .fold(rule.clone(), |r, c| r.without(*c))
}

fn count_exactly(table: &Table, rules: &BTreeSet<Rule>) -> Vec<(Rule, u64)> {
    let mut counts: Vec<(Rule, u64)> = rules.iter().map(|r| (r.clone(), 0)).collect();
    for tuple in table.rows() {
        for (rule, count) in counts.iter_mut() {
            if rule.covers(tuple) {
                *count += 1;
            }
        }
    }
    counts
}
