use crate::compound::CompoundRule;
use crate::rules::{Rule, ScoredRule};
use crate::table::Table;

pub type NodeId = usize;

/// What a tree row shows: a searched rule or a synthesized compound row.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeRule {
    Atomic(ScoredRule),
    Compound(CompoundRule),
}

/// Identity of a row in the tree's node map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Atomic(Rule),
    /// Base rule plus the columns carrying value sets.
    Compound(Rule, Vec<usize>),
}

impl NodeRule {
    pub fn count(&self) -> u64 {
        match self {
            NodeRule::Atomic(r) => r.count(),
            NodeRule::Compound(c) => c.count(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            NodeRule::Atomic(r) => r.rule.size(),
            NodeRule::Compound(c) => c.size(),
        }
    }

    /// The atomic rule, or the base rule of a compound row.
    pub fn base(&self) -> &Rule {
        match self {
            NodeRule::Atomic(r) => &r.rule,
            NodeRule::Compound(c) => c.base(),
        }
    }

    pub fn atomic(&self) -> Option<&ScoredRule> {
        match self {
            NodeRule::Atomic(r) => Some(r),
            NodeRule::Compound(_) => None,
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, NodeRule::Compound(_))
    }

    pub fn key(&self) -> NodeKey {
        match self {
            NodeRule::Atomic(r) => NodeKey::Atomic(r.rule.clone()),
            NodeRule::Compound(c) => {
                NodeKey::Compound(c.base().clone(), c.value_sets().keys().copied().collect())
            }
        }
    }

    pub fn rule_string(&self, table: &Table) -> String {
        match self {
            NodeRule::Atomic(r) => r.rule.rule_string(table),
            NodeRule::Compound(c) => c.rule_string(table),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleNode {
    pub rule: NodeRule,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub children: Vec<NodeId>,
}

impl RuleNode {
    pub fn new(rule: NodeRule, parent: Option<NodeId>, depth: usize) -> Self {
        Self {
            rule,
            parent,
            depth,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn count(&self) -> u64 {
        self.rule.count()
    }
}
