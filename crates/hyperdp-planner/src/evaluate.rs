//! The cost-model capability the enumerator drives.
//!
//! The enumerator decides *which* relation sets to join and in which operand
//! order; an evaluator decides what a plan for that join looks like and
//! whether it beats the plan already known for the combined set.

use hyperdp_core::tree::{JoinCondition, JoinKind, Relation};

pub trait JoinEvaluator {
    /// Opaque plan value stored per relation set.
    type Plan;
    /// Failure passed back to the caller of `solve` unchanged.
    type Error;

    /// Base plan for a single leaf. Called exactly once per relation.
    fn evaluate_table(&mut self, relation: &Relation) -> Result<Self::Plan, Self::Error>;

    /// Plan joining two solved sets in the given operand order.
    ///
    /// `existing` is the best plan currently stored for the combined set, if
    /// any. The returned plan replaces it, so an evaluator that finds the new
    /// candidate worse should hand back (a clone of) `existing`.
    fn evaluate_join(
        &mut self,
        left: &Self::Plan,
        right: &Self::Plan,
        existing: Option<&Self::Plan>,
        kind: JoinKind,
        conditions: &[JoinCondition],
    ) -> Result<Self::Plan, Self::Error>;
}

impl<E: JoinEvaluator + ?Sized> JoinEvaluator for &mut E {
    type Plan = E::Plan;
    type Error = E::Error;

    fn evaluate_table(&mut self, relation: &Relation) -> Result<Self::Plan, Self::Error> {
        (**self).evaluate_table(relation)
    }

    fn evaluate_join(
        &mut self,
        left: &Self::Plan,
        right: &Self::Plan,
        existing: Option<&Self::Plan>,
        kind: JoinKind,
        conditions: &[JoinCondition],
    ) -> Result<Self::Plan, Self::Error> {
        (**self).evaluate_join(left, right, existing, kind, conditions)
    }
}
