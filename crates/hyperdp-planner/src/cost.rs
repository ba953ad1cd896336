//! Reference evaluator: coarse cardinality estimates and C_out costing.
//!
//! Cardinalities come from per-relation row counts and fixed per-join-kind
//! factors. A plan's cost is the sum of every intermediate result it builds
//! (scans are free), so cheaper plans are the ones that keep joins small.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use hyperdp_core::tree::{JoinCondition, JoinKind, Relation};

use crate::evaluate::JoinEvaluator;

/// Fraction of rows kept per extra equality condition on an inner join.
const EQUALITY_SELECTIVITY: f64 = 0.1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CostError {
    #[error("relation '{0}' has no row count and no default is configured")]
    MissingStatistics(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "lowercase")]
pub enum PlanNode {
    Scan {
        relation: String,
        rows: u64,
    },
    Join {
        kind: JoinKind,
        conditions: Vec<String>,
        rows: u64,
        cost: u64,
        left: Arc<PlanNode>,
        right: Arc<PlanNode>,
    },
}

impl PlanNode {
    /// Estimated output cardinality.
    pub fn rows(&self) -> u64 {
        match self {
            PlanNode::Scan { rows, .. } | PlanNode::Join { rows, .. } => *rows,
        }
    }

    /// C_out: sum of all join outputs below and including this node.
    pub fn cost(&self) -> u64 {
        match self {
            PlanNode::Scan { .. } => 0,
            PlanNode::Join { cost, .. } => *cost,
        }
    }

    /// Scanned relation names, left to right.
    pub fn relations(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_relations(&mut out);
        out
    }

    fn collect_relations<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            PlanNode::Scan { relation, .. } => out.push(relation),
            PlanNode::Join { left, right, .. } => {
                left.collect_relations(out);
                right.collect_relations(out);
            }
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            PlanNode::Scan { relation, rows } => writeln!(f, "{pad}Scan {relation} (rows={rows})"),
            PlanNode::Join {
                kind,
                conditions,
                rows,
                cost,
                left,
                right,
            } => {
                write!(f, "{pad}Join {kind}")?;
                if !conditions.is_empty() {
                    write!(f, " on [{}]", conditions.join(" AND "))?;
                }
                writeln!(f, " (rows={rows}, cost={cost})")?;
                left.fmt_indented(f, depth + 1)?;
                right.fmt_indented(f, depth + 1)
            }
        }
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Estimate join output from input sizes, kind, and predicate count.
pub fn estimate_join_rows(left: u64, right: u64, kind: JoinKind, conditions: usize) -> u64 {
    match kind {
        JoinKind::Inner if conditions == 0 => left.saturating_mul(right),
        JoinKind::Inner => {
            // sqrt(L * R) for many-to-many, capped at min(L, R) for one-to-many.
            let base = ((left as f64 * right as f64).sqrt() as u64)
                .max(1)
                .min(left.min(right));
            let extra = (conditions - 1) as i32;
            let scaled = base as f64 * EQUALITY_SELECTIVITY.powi(extra);
            if base == 0 {
                0
            } else {
                (scaled as u64).max(1)
            }
        }
        JoinKind::Left => (left as f64 * 1.2) as u64,
        JoinKind::Full => (left.max(right) as f64 * 1.5) as u64,
        JoinKind::Semi | JoinKind::Anti => (left as f64 * 0.5) as u64,
    }
}

/// Builds `PlanNode` trees and keeps the cheaper one per plan class.
#[derive(Debug, Clone, Default)]
pub struct CostEvaluator {
    default_rows: Option<u64>,
}

impl CostEvaluator {
    /// Every relation must carry `rows`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Relations without `rows` are assumed to hold `rows` rows.
    pub fn with_default_rows(rows: u64) -> Self {
        Self {
            default_rows: Some(rows),
        }
    }
}

impl JoinEvaluator for CostEvaluator {
    type Plan = Arc<PlanNode>;
    type Error = CostError;

    fn evaluate_table(&mut self, relation: &Relation) -> Result<Arc<PlanNode>, CostError> {
        let rows = relation
            .rows
            .or(self.default_rows)
            .ok_or_else(|| CostError::MissingStatistics(relation.name.clone()))?;
        Ok(Arc::new(PlanNode::Scan {
            relation: relation.name.clone(),
            rows,
        }))
    }

    fn evaluate_join(
        &mut self,
        left: &Arc<PlanNode>,
        right: &Arc<PlanNode>,
        existing: Option<&Arc<PlanNode>>,
        kind: JoinKind,
        conditions: &[JoinCondition],
    ) -> Result<Arc<PlanNode>, CostError> {
        let rows = estimate_join_rows(left.rows(), right.rows(), kind, conditions.len());
        let cost = rows
            .saturating_add(left.cost())
            .saturating_add(right.cost());
        if let Some(existing) = existing {
            if existing.cost() <= cost {
                return Ok(Arc::clone(existing));
            }
        }
        Ok(Arc::new(PlanNode::Join {
            kind,
            conditions: conditions.iter().map(ToString::to_string).collect(),
            rows,
            cost,
            left: Arc::clone(left),
            right: Arc::clone(right),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(name: &str, rows: u64) -> Arc<PlanNode> {
        CostEvaluator::new()
            .evaluate_table(&Relation::new(name).with_rows(rows))
            .unwrap()
    }

    #[test]
    fn join_kind_heuristics() {
        assert_eq!(estimate_join_rows(100, 10_000, JoinKind::Inner, 1), 100);
        assert_eq!(estimate_join_rows(400, 900, JoinKind::Inner, 1), 400);
        assert_eq!(estimate_join_rows(10_000, 10_000, JoinKind::Inner, 2), 1_000);
        assert_eq!(estimate_join_rows(3, 4, JoinKind::Inner, 0), 12);
        assert_eq!(estimate_join_rows(100, 5, JoinKind::Left, 1), 120);
        assert_eq!(estimate_join_rows(100, 200, JoinKind::Full, 1), 300);
        assert_eq!(estimate_join_rows(100, 200, JoinKind::Semi, 1), 50);
        assert_eq!(estimate_join_rows(100, 200, JoinKind::Anti, 1), 50);
    }

    #[test]
    fn missing_rows_is_an_error_without_default() {
        let err = CostEvaluator::new()
            .evaluate_table(&Relation::new("t"))
            .unwrap_err();
        assert_eq!(err, CostError::MissingStatistics("t".into()));

        let plan = CostEvaluator::with_default_rows(7)
            .evaluate_table(&Relation::new("t"))
            .unwrap();
        assert_eq!(plan.rows(), 7);
    }

    #[test]
    fn keeps_cheaper_plan_and_existing_on_tie() {
        let mut ev = CostEvaluator::new();
        let on = [JoinCondition::eq("a.k", "b.k").unwrap()];
        let (a, b) = (scan("a", 10), scan("b", 10));
        let first = ev.evaluate_join(&a, &b, None, JoinKind::Inner, &on).unwrap();
        let second = ev
            .evaluate_join(&b, &a, Some(&first), JoinKind::Inner, &on)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let pricey = Arc::new(PlanNode::Join {
            kind: JoinKind::Inner,
            conditions: vec![],
            rows: 10,
            cost: 1_000,
            left: Arc::clone(&a),
            right: Arc::clone(&b),
        });
        let better = ev
            .evaluate_join(&a, &b, Some(&pricey), JoinKind::Inner, &on)
            .unwrap();
        assert_eq!(better.cost(), 10);
    }

    #[test]
    fn explain_output_is_indented() {
        let mut ev = CostEvaluator::new();
        let on = [JoinCondition::eq("a.k", "b.k").unwrap()];
        let plan = ev
            .evaluate_join(&scan("a", 4), &scan("b", 9), None, JoinKind::Inner, &on)
            .unwrap();
        assert_eq!(
            plan.to_string(),
            "Join inner on [a.k = b.k] (rows=4, cost=4)\n  Scan a (rows=4)\n  Scan b (rows=9)\n"
        );
        assert_eq!(plan.relations(), vec!["a", "b"]);
    }
}
