use crate::conf::SummarizerConfig;
use crate::dataframe::SummaryDataFrameExt;
use crate::drill_down::drill_down_tree;
use crate::error::{Result, SummaryError};
use crate::node::NodeRule;
use crate::rules::{Rule, ScoredRule};
use crate::sample_handler::SampleHandler;
use crate::scorer::Scorer;
use crate::solver::RuleSolver;
use crate::table::Table;
use crate::tree::RuleTree;
use log::info;
use polars::prelude::*;
use std::sync::Arc;

/// Interactive summarizer: owns the table, the drill-down tree and the
/// sample pool, and forwards expand/contract requests with its configured
/// scorer and limits.
pub struct TableSummarizer {
    pub config: SummarizerConfig,
    table: Option<Arc<Table>>,
    tree: Option<RuleTree>,
    sample_handler: Option<SampleHandler>,
}

impl Default for TableSummarizer {
    fn default() -> Self {
        Self::new(SummarizerConfig::default())
    }
}

impl TableSummarizer {
    pub fn new(config: SummarizerConfig) -> Self {
        TableSummarizer {
            config,
            table: None,
            tree: None,
            sample_handler: None,
        }
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let table = df.to_table()?;
        self.fit_table(table)
    }

    /// Resets the tree and the sample pool around a new table.
    pub fn fit_table(&mut self, table: Table) -> Result<&mut Self> {
        if table.num_columns() == 0 {
            return Err(SummaryError::InvalidArgument(
                "cannot summarize a table without columns".to_string(),
            ));
        }
        info!(
            "fitting summarizer on {} tuples over {} columns",
            table.len(),
            table.num_columns()
        );
        let table = Arc::new(table);
        let solver = RuleSolver::new(self.config.solver.clone());
        self.tree = Some(RuleTree::new(Arc::clone(&table)).with_solver(solver));
        self.sample_handler = Some(SampleHandler::from_config(&self.config.sampling));
        self.table = Some(table);
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.tree.is_some()
    }

    pub fn table(&self) -> Result<&Table> {
        self.table.as_deref().ok_or(SummaryError::NotFitted)
    }

    pub fn tree(&self) -> Result<&RuleTree> {
        self.tree.as_ref().ok_or(SummaryError::NotFitted)
    }

    /// Expands the root: the best rules over the whole table.
    pub fn summarize(&mut self) -> Result<Vec<ScoredRule>> {
        let root = Rule::empty(self.table()?.num_columns());
        self.expand(&root)
    }

    pub fn expand(&mut self, rule: &Rule) -> Result<Vec<ScoredRule>> {
        let (rule_nums, max_score, scorer) = self.limits();
        let (tree, handler) = self.parts(rule)?;
        let ids = tree.expand_row(rule, rule_nums, max_score, &scorer, handler)?;
        Ok(atomic_rules(tree, &ids))
    }

    /// Expands `rule` with every child fixing `column`.
    pub fn expand_star(&mut self, rule: &Rule, column: usize) -> Result<Vec<ScoredRule>> {
        let (rule_nums, max_score, scorer) = self.limits();
        let (tree, handler) = self.parts(rule)?;
        let ids = tree.expand_star(rule, column, rule_nums, max_score, &scorer, handler)?;
        Ok(atomic_rules(tree, &ids))
    }

    pub fn contract(&mut self, rule: &Rule) -> Result<()> {
        let (tree, _) = self.parts(rule)?;
        tree.contract_row(rule);
        Ok(())
    }

    /// Static drill-down over `rules` on the fitted table.
    pub fn drill_down(&self, rules: &[ScoredRule], drill_columns: &[usize]) -> Result<RuleTree> {
        let table = self.table.as_ref().ok_or(SummaryError::NotFitted)?;
        drill_down_tree(Arc::clone(table), rules, drill_columns)
    }

    pub fn tree_info(&self) -> String {
        match &self.tree {
            Some(t) => t.tree_info(),
            None => "Summarizer not fitted".to_string(),
        }
    }

    fn limits(&self) -> (usize, u32, Scorer) {
        (
            self.config.rule_nums,
            self.config.max_score,
            self.config.scorer.clone(),
        )
    }

    fn parts(&mut self, rule: &Rule) -> Result<(&mut RuleTree, &mut SampleHandler)> {
        match (self.tree.as_mut(), self.sample_handler.as_mut()) {
            (Some(tree), Some(handler)) => {
                if !tree.contains(rule) {
                    return Err(SummaryError::InvalidArgument(format!(
                        "{rule} is not a row of the tree"
                    )));
                }
                Ok((tree, handler))
            }
            _ => Err(SummaryError::NotFitted),
        }
    }
}

fn atomic_rules(tree: &RuleTree, ids: &[usize]) -> Vec<ScoredRule> {
    ids.iter()
        .filter_map(|id| match &tree.node(*id).rule {
            NodeRule::Atomic(r) => Some(r.clone()),
            NodeRule::Compound(_) => None,
        })
        .collect()
}
