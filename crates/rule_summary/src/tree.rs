use crate::error::{Result, SummaryError};
use crate::lattice::is_sub_rule;
use crate::node::{NodeId, NodeKey, NodeRule, RuleNode};
use crate::rules::{Rule, RuleStats, ScoredRule};
use crate::sample_handler::SampleHandler;
use crate::scorer::Scorer;
use crate::solver::RuleSolver;
use crate::table::Table;
use log::{debug, info};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Drill-down tree of rules. The root is the empty rule covering the whole
/// table; expanding a row adds the best rules refining it as children. Every
/// live node is in the node map under its key and nowhere else.
#[derive(Debug, Clone)]
pub struct RuleTree {
    table: Arc<Table>,
    nodes: Vec<Option<RuleNode>>,
    free: Vec<NodeId>,
    node_map: HashMap<NodeKey, NodeId>,
    root: NodeId,
    solver: RuleSolver,
}

impl RuleTree {
    pub fn new(table: Arc<Table>) -> Self {
        let empty = Rule::empty(table.num_columns());
        let stats = RuleStats {
            count: table.len() as u64,
            counted: true,
            ..RuleStats::default()
        };
        let root = NodeRule::Atomic(ScoredRule::new(empty, stats));
        Self::with_root(table, root)
    }

    fn with_root(table: Arc<Table>, root: NodeRule) -> Self {
        let mut node_map = HashMap::new();
        node_map.insert(root.key(), 0);
        Self {
            table,
            nodes: vec![Some(RuleNode::new(root, None, 0))],
            free: Vec::new(),
            node_map,
            root: 0,
            solver: RuleSolver::default(),
        }
    }

    /// Builds a tree from a parent-key -> children listing, reaching nodes
    /// breadth-first from `root`. Listings for unreachable keys are ignored.
    pub fn from_children(
        table: Arc<Table>,
        root: NodeRule,
        children: &HashMap<NodeKey, Vec<NodeRule>>,
    ) -> Result<Self> {
        let mut tree = Self::with_root(table, root);
        let mut queue = VecDeque::from([tree.root]);
        while let Some(id) = queue.pop_front() {
            let key = tree.node(id).rule.key();
            let Some(listed) = children.get(&key) else {
                continue;
            };
            for child in listed {
                if tree.node_map.contains_key(&child.key()) {
                    return Err(SummaryError::Invariant(format!(
                        "{:?} is listed twice",
                        child.key()
                    )));
                }
                let child_id = tree.alloc(child.clone(), id);
                queue.push_back(child_id);
            }
        }
        Ok(tree)
    }

    pub fn with_solver(mut self, solver: RuleSolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn solver_mut(&mut self) -> &mut RuleSolver {
        &mut self.solver
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&RuleNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> &RuleNode {
        self.get(id)
            .unwrap_or_else(|| panic!("node {id} is not in the tree"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut RuleNode {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("node {id} is not in the tree"))
    }

    pub fn lookup(&self, rule: &Rule) -> Option<NodeId> {
        self.node_map.get(&NodeKey::Atomic(rule.clone())).copied()
    }

    pub fn contains(&self, rule: &Rule) -> bool {
        self.lookup(rule).is_some()
    }

    fn require(&self, rule: &Rule) -> NodeId {
        self.lookup(rule)
            .unwrap_or_else(|| panic!("rule {rule} is not in the tree"))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// The `index`-th child row of `rule`.
    pub fn child_rule(&self, rule: &Rule, index: usize) -> Option<&NodeRule> {
        let id = self.require(rule);
        self.node(id)
            .children
            .get(index)
            .map(|child| &self.node(*child).rule)
    }

    /// Adds the best `rule_nums` refinements of `rule` as its children.
    pub fn expand_row(
        &mut self,
        rule: &Rule,
        rule_nums: usize,
        max_score: u32,
        scorer: &Scorer,
        sample_handler: &mut SampleHandler,
    ) -> Result<Vec<NodeId>> {
        self.expand(rule, None, rule_nums, max_score, scorer, sample_handler)
    }

    /// Like `expand_row`, but every child fixes `column`.
    pub fn expand_star(
        &mut self,
        rule: &Rule,
        column: usize,
        rule_nums: usize,
        max_score: u32,
        scorer: &Scorer,
        sample_handler: &mut SampleHandler,
    ) -> Result<Vec<NodeId>> {
        self.expand(rule, Some(column), rule_nums, max_score, scorer, sample_handler)
    }

    fn expand(
        &mut self,
        rule: &Rule,
        column: Option<usize>,
        rule_nums: usize,
        max_score: u32,
        scorer: &Scorer,
        sample_handler: &mut SampleHandler,
    ) -> Result<Vec<NodeId>> {
        let parent = self.require(rule);
        let table = Arc::clone(&self.table);
        let found = self.solver.solve(
            &table,
            rule,
            rule_nums,
            max_score,
            scorer,
            column,
            sample_handler,
        )?;
        info!("expanding {rule} with {} rules", found.len());
        Ok(found
            .into_iter()
            .filter_map(|r| self.add_child(parent, NodeRule::Atomic(r)))
            .collect())
    }

    /// Attaches `rule` under `parent`. A rule already in the tree moves over
    /// with its subtree; moving the parent itself or one of its ancestors is
    /// refused.
    pub fn add_child(&mut self, parent: NodeId, rule: NodeRule) -> Option<NodeId> {
        let key = rule.key();
        let Some(&existing) = self.node_map.get(&key) else {
            return Some(self.alloc(rule, parent));
        };
        if existing == parent || self.is_ancestor(existing, parent) {
            debug!("not moving {key:?} under its own descendant");
            return None;
        }
        if let Some(old) = self.node(existing).parent {
            self.node_mut(old).children.retain(|c| *c != existing);
        }
        let node = self.node_mut(existing);
        node.parent = Some(parent);
        node.rule = rule;
        self.node_mut(parent).children.push(existing);
        self.refresh_depths(existing);
        Some(existing)
    }

    /// Drops every descendant of `rule`.
    pub fn contract_row(&mut self, rule: &Rule) {
        let id = self.require(rule);
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.release_subtree(child);
        }
    }

    /// Drops the `index`-th child of `rule` with its subtree.
    pub fn delete_child(&mut self, rule: &Rule, index: usize) {
        let id = self.require(rule);
        let children = &mut self.node_mut(id).children;
        if index < children.len() {
            let child = children.remove(index);
            self.release_subtree(child);
        }
    }

    /// Orders every child list by count, largest first.
    pub fn sort_children(&mut self) {
        for id in self.preorder() {
            let mut children = std::mem::take(&mut self.node_mut(id).children);
            children.sort_by_key(|c| std::cmp::Reverse(self.node(*c).count()));
            self.node_mut(id).children = children;
        }
    }

    /// Node ids in display order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.node(id).children.iter().rev());
        }
        order
    }

    /// Indented listing of the rows with labels and counts.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for id in self.preorder() {
            let node = self.node(id);
            let text = match &node.rule {
                NodeRule::Atomic(r) => r.rule.sparse_string(&self.table),
                NodeRule::Compound(c) => c.rule_string(&self.table),
            };
            out.push_str(&format!(
                "{}{} [{}]\n",
                "  ".repeat(node.depth),
                text,
                node.count()
            ));
        }
        out
    }

    pub fn tree_info(&self) -> String {
        let mut info = String::new();
        info.push_str("=== Rule Tree ===\n");
        info.push_str(&format!("Total nodes: {}\n", self.len()));
        let leaves = self
            .preorder()
            .into_iter()
            .filter(|id| self.node(*id).is_leaf())
            .count();
        info.push_str(&format!("Leaves: {leaves}\n"));
        let max_depth = self.preorder().iter().map(|id| self.node(*id).depth).max();
        info.push_str(&format!("Maximum depth: {}\n", max_depth.unwrap_or(0)));
        info.push_str(&self.outline());
        info.push_str("=================\n");
        info
    }

    /// Checks map/tree agreement, parent links, depths and that atomic
    /// children refine their parent.
    pub fn verify(&self) -> Result<()> {
        let live = self.nodes.iter().filter(|n| n.is_some()).count();
        if live != self.node_map.len() {
            return Err(SummaryError::Invariant(format!(
                "{live} live nodes but {} map entries",
                self.node_map.len()
            )));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            let Some(node) = node else { continue };
            if self.node_map.get(&node.rule.key()) != Some(&id) {
                return Err(SummaryError::Invariant(format!("node {id} is not mapped")));
            }
            match node.parent {
                None if id != self.root => {
                    return Err(SummaryError::Invariant(format!("node {id} has no parent")));
                }
                None if node.depth != 0 => {
                    return Err(SummaryError::Invariant("root depth is not 0".to_string()));
                }
                None => {}
                Some(p) => {
                    let parent = self.get(p).ok_or_else(|| {
                        SummaryError::Invariant(format!("node {id} has a dangling parent"))
                    })?;
                    if !parent.children.contains(&id) {
                        return Err(SummaryError::Invariant(format!(
                            "node {id} is missing from its parent's children"
                        )));
                    }
                    if node.depth != parent.depth + 1 {
                        return Err(SummaryError::Invariant(format!(
                            "node {id} has depth {} under depth {}",
                            node.depth, parent.depth
                        )));
                    }
                    if !is_sub_rule(parent.rule.base(), node.rule.base()) {
                        return Err(SummaryError::Invariant(format!(
                            "node {id} does not refine its parent"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn alloc(&mut self, rule: NodeRule, parent: NodeId) -> NodeId {
        let depth = self.node(parent).depth + 1;
        let key = rule.key();
        let node = RuleNode::new(rule, Some(parent), depth);
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.node_map.insert(key, id);
        self.node_mut(parent).children.push(id);
        id
    }

    fn release_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes[current].take() {
                self.node_map.remove(&node.rule.key());
                stack.extend(node.children);
                self.free.push(current);
            }
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.node(id).parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.node(p).parent;
        }
        false
    }

    fn refresh_depths(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let depth = match self.node(current).parent {
                Some(p) => self.node(p).depth + 1,
                None => 0,
            };
            let node = self.node_mut(current);
            node.depth = depth;
            stack.extend(node.children.iter().copied());
        }
    }
}
