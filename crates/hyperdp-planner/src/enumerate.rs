//! DPhyp: dynamic programming over connected subgraphs of the hypergraph.
//!
//! See "Dynamic Programming Strikes Back" (Moerkotte & Neumann, SIGMOD 2008).
//! Every connected subgraph (csg) is grown exactly once, starting from its
//! lowest-indexed relation, and for each csg every connected complement (cmp)
//! whose members all sit above the csg's minimum is grown exactly once. Each
//! csg/cmp pair linked by a hyperedge is handed to the evaluator, and the
//! result is kept as the plan class for their union.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hyperdp_core::config::EnumeratorConfig;
use hyperdp_core::error::Error;
use hyperdp_core::id::{NodeId, OperatorId};
use hyperdp_core::relset::RelSet;
use hyperdp_core::tree::JoinTree;

use crate::evaluate::JoinEvaluator;
use crate::hypergraph::Hypergraph;
use crate::store::PlanStore;
use crate::trace::{EnumerationTrace, NoopTrace};

#[derive(Debug, Error)]
pub enum SolveError<E> {
    /// Malformed input or a broken hypergraph; never retried.
    #[error(transparent)]
    Precondition(#[from] Error),

    /// The evaluator failed; its error is passed through unchanged.
    #[error("plan evaluation failed: {0}")]
    Evaluate(#[source] E),
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Solution<P> {
    /// Best plan joining every relation.
    Complete(P),
    /// No predicate path links all relations. `components` are maximal,
    /// pairwise-disjoint solved sets covering every relation, largest first,
    /// for a caller that wants to fall back to cross joins.
    Disconnected { components: Vec<RelSet> },
}

impl<P> Solution<P> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Solution::Complete(_))
    }

    pub fn plan(&self) -> Option<&P> {
        match self {
            Solution::Complete(p) => Some(p),
            Solution::Disconnected { .. } => None,
        }
    }

    pub fn into_plan(self) -> Option<P> {
        match self {
            Solution::Complete(p) => Some(p),
            Solution::Disconnected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationStats {
    pub tables_evaluated: u64,
    pub csg_cmp_pairs: u64,
    pub joins_evaluated: u64,
    pub plan_classes: usize,
}

/// One optimization run: owns its hypergraph, plan store, and trace hook.
pub struct DPhyp<'t, P, T = NoopTrace> {
    tree: &'t JoinTree,
    graph: Hypergraph,
    config: EnumeratorConfig,
    store: PlanStore<P>,
    trace: T,
    stats: EnumerationStats,
}

impl<'t, P> DPhyp<'t, P, NoopTrace> {
    pub fn new(tree: &'t JoinTree, root: NodeId, config: EnumeratorConfig) -> Result<Self, Error> {
        Self::with_trace(tree, root, config, NoopTrace)
    }

    /// Build and solve in one step, handing back the run for inspection.
    pub fn run<E>(
        tree: &'t JoinTree,
        root: NodeId,
        config: EnumeratorConfig,
        evaluator: &mut E,
    ) -> Result<(Self, Solution<P>), SolveError<E::Error>>
    where
        E: JoinEvaluator<Plan = P>,
        P: Clone,
    {
        let mut dp = Self::new(tree, root, config)?;
        let solution = dp.solve(evaluator)?;
        Ok((dp, solution))
    }
}

impl<'t, P, T: EnumerationTrace> DPhyp<'t, P, T> {
    /// Validate the config and build the hypergraph for `root`.
    pub fn with_trace(
        tree: &'t JoinTree,
        root: NodeId,
        config: EnumeratorConfig,
        mut trace: T,
    ) -> Result<Self, Error> {
        config.validate()?;
        let graph = Hypergraph::build(tree, root, &config)?;
        if config.trace_edges {
            for (op, edge) in graph.hyperedges() {
                trace.edge(op, edge);
            }
        }
        let store = PlanStore::for_relations(graph.relation_count(), &config);
        Ok(Self {
            tree,
            graph,
            config,
            store,
            trace,
            stats: EnumerationStats::default(),
        })
    }

    pub fn hypergraph(&self) -> &Hypergraph {
        &self.graph
    }

    pub fn store(&self) -> &PlanStore<P> {
        &self.store
    }

    pub fn stats(&self) -> EnumerationStats {
        self.stats
    }

    pub fn trace(&self) -> &T {
        &self.trace
    }

    pub fn into_trace(self) -> T {
        self.trace
    }

    pub fn into_store(self) -> PlanStore<P> {
        self.store
    }

    /// Run the search and return the plan for all relations.
    ///
    /// A second call starts over with an empty plan store.
    pub fn solve<E>(&mut self, evaluator: &mut E) -> Result<Solution<P>, SolveError<E::Error>>
    where
        E: JoinEvaluator<Plan = P>,
        P: Clone,
    {
        let n = self.graph.relation_count();
        self.store = PlanStore::for_relations(n, &self.config);
        self.stats = EnumerationStats::default();

        let tree: &'t JoinTree = self.tree;
        for i in 0..n {
            let node = self.graph.relations()[i];
            let relation = tree
                .node(node)?
                .as_relation()
                .ok_or_else(|| Error::Invariant(format!("{node} is not a leaf")))?;
            let plan = evaluator
                .evaluate_table(relation)
                .map_err(SolveError::Evaluate)?;
            self.stats.tables_evaluated += 1;
            self.store_plan(RelSet::of(i), plan);
        }

        for i in (0..n).rev() {
            let s = RelSet::of(i);
            self.emit_csg(s, evaluator)?;
            self.enumerate_csg_rec(s, RelSet::through(i), evaluator)?;
        }

        let all = self.graph.all();
        match self.store.get(all) {
            Some(plan) => Ok(Solution::Complete(plan.clone())),
            None => Ok(Solution::Disconnected {
                components: self.components(),
            }),
        }
    }

    /// Minimal set of relations reachable from `s` in one hyperedge step
    /// without entering `exclude`: one representative (the lowest index) per
    /// far side.
    pub fn neighborhood(&self, s: RelSet, exclude: RelSet) -> RelSet {
        let exclude = exclude | s;
        let edges = self.graph.edges();
        let mut result = RelSet::EMPTY;
        for e in 0..edges.len() {
            let (near, far) = (edges[e], edges[e ^ 1]);
            if near.is_empty() || far.is_empty() {
                continue;
            }
            if near.is_subset(s) && !far.overlaps(exclude) {
                result |= far.min_subset();
            }
        }
        result
    }

    /// Operators whose hyperedge has one side inside `s1` and the other
    /// inside `s2`. The flag is set when the operator's left input lies in
    /// `s2`.
    fn connecting_operators(
        &self,
        s1: RelSet,
        s2: RelSet,
    ) -> impl Iterator<Item = (OperatorId, bool)> + '_ {
        let edges = self.graph.edges();
        (0..edges.len()).filter_map(move |e| {
            let (near, far) = (edges[e], edges[e ^ 1]);
            let live = !near.is_empty() && !far.is_empty();
            (live && near.is_subset(s1) && far.is_subset(s2))
                .then(|| (OperatorId::new((e / 2) as u32), e % 2 == 1))
        })
    }

    fn connected(&self, s1: RelSet, s2: RelSet) -> bool {
        self.connecting_operators(s1, s2).next().is_some()
    }

    fn enumerate_csg_rec<E>(
        &mut self,
        s1: RelSet,
        exclude: RelSet,
        evaluator: &mut E,
    ) -> Result<(), SolveError<E::Error>>
    where
        E: JoinEvaluator<Plan = P>,
    {
        let neighborhood = self.neighborhood(s1, exclude);
        if neighborhood.is_empty() {
            return Ok(());
        }
        for subset in neighborhood.subsets() {
            let next = s1 | subset;
            if self.store.contains(next) {
                self.emit_csg(next, evaluator)?;
            }
        }
        let exclude = exclude | neighborhood;
        for subset in neighborhood.subsets() {
            self.enumerate_csg_rec(s1 | subset, exclude, evaluator)?;
        }
        Ok(())
    }

    /// Seed every connected complement of `s1` that lies entirely above
    /// `min(s1)`.
    fn emit_csg<E>(&mut self, s1: RelSet, evaluator: &mut E) -> Result<(), SolveError<E::Error>>
    where
        E: JoinEvaluator<Plan = P>,
    {
        let Some(min) = s1.min() else {
            return Ok(());
        };
        let exclude = s1 | RelSet::through(min);
        let neighborhood = self.neighborhood(s1, exclude);
        if neighborhood.is_empty() {
            return Ok(());
        }
        // Descending, and each seed excludes the neighbors at or below it, so
        // a complement reachable from two seeds is grown from one only.
        for v in neighborhood.iter().rev() {
            let s2 = RelSet::of(v);
            if self.connected(s1, s2) {
                self.emit_csg_cmp(s1, s2, evaluator)?;
            }
            let seed_exclude = exclude | (neighborhood & RelSet::through(v));
            self.enumerate_cmp_rec(s1, s2, seed_exclude, evaluator)?;
        }
        Ok(())
    }

    /// Grow complement `s2` of `s1`, emitting each solved, connected extension.
    fn enumerate_cmp_rec<E>(
        &mut self,
        s1: RelSet,
        s2: RelSet,
        exclude: RelSet,
        evaluator: &mut E,
    ) -> Result<(), SolveError<E::Error>>
    where
        E: JoinEvaluator<Plan = P>,
    {
        let neighborhood = self.neighborhood(s2, exclude);
        if neighborhood.is_empty() {
            return Ok(());
        }
        for subset in neighborhood.subsets() {
            let next = s2 | subset;
            if self.store.contains(next) && self.connected(s1, next) {
                self.emit_csg_cmp(s1, next, evaluator)?;
            }
        }
        let exclude = exclude | neighborhood;
        for subset in neighborhood.subsets() {
            self.enumerate_cmp_rec(s1, s2 | subset, exclude, evaluator)?;
        }
        Ok(())
    }

    /// The join point: cost `s1 ⋈ s2` (both orders if the operator commutes)
    /// and keep the evaluator's choice as the plan for `s1 ∪ s2`.
    fn emit_csg_cmp<E>(
        &mut self,
        s1: RelSet,
        s2: RelSet,
        evaluator: &mut E,
    ) -> Result<(), SolveError<E::Error>>
    where
        E: JoinEvaluator<Plan = P>,
    {
        let (op, flipped) = self.single_operator(s1, s2)?;
        let node = self
            .graph
            .operator_node(op)
            .ok_or_else(|| Error::Invariant(format!("{op} has no join node")))?;
        let tree: &'t JoinTree = self.tree;
        let join = tree
            .node(node)?
            .as_join()
            .ok_or_else(|| Error::Invariant(format!("{node} is not a join")))?;
        self.stats.csg_cmp_pairs += 1;
        self.trace.csg_cmp_pair(s1, s2, op);

        // Operator order first: (left input, right input).
        let (l, r) = if flipped { (s2, s1) } else { (s1, s2) };
        let s = s1 | s2;
        let (Some(pl), Some(pr)) = (self.store.get(l), self.store.get(r)) else {
            return Err(Error::Invariant(format!("unsolved operand in {s1} x {s2}")).into());
        };

        let plan = evaluator
            .evaluate_join(pl, pr, self.store.get(s), join.kind, &join.conditions)
            .map_err(SolveError::Evaluate)?;
        self.stats.joins_evaluated += 1;
        self.trace.join_evaluated(l, r, join.kind);

        let plan = if join.kind.is_commutative() {
            let swapped = evaluator
                .evaluate_join(pr, pl, Some(&plan), join.kind, &join.conditions)
                .map_err(SolveError::Evaluate)?;
            self.stats.joins_evaluated += 1;
            self.trace.join_evaluated(r, l, join.kind);
            swapped
        } else {
            plan
        };

        self.store_plan(s, plan);
        Ok(())
    }

    /// Exactly one hyperedge may link a csg/cmp pair.
    fn single_operator(&self, s1: RelSet, s2: RelSet) -> Result<(OperatorId, bool), Error> {
        let mut ops = self.connecting_operators(s1, s2);
        match (ops.next(), ops.next()) {
            (Some(found), None) => Ok(found),
            (None, _) => Err(Error::EdgeMatch {
                left: s1,
                right: s2,
                matches: 0,
            }),
            (Some(_), Some(_)) => Err(Error::EdgeMatch {
                left: s1,
                right: s2,
                matches: 2 + ops.count(),
            }),
        }
    }

    fn store_plan(&mut self, set: RelSet, plan: P) {
        let first = self.store.insert(set, plan).is_none();
        self.stats.plan_classes = self.store.len();
        self.trace.plan_class(set, first);
    }

    /// Greedy cover of all relations by the largest disjoint solved sets.
    fn components(&self) -> Vec<RelSet> {
        let mut solved = self.store.classes();
        solved.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let mut covered = RelSet::EMPTY;
        let mut out = Vec::new();
        for set in solved {
            if !set.overlaps(covered) {
                covered |= set;
                out.push(set);
            }
            if covered == self.graph.all() {
                break;
            }
        }
        out
    }
}

/// Build the hypergraph for `root` and solve it with the default config.
pub fn solve<E>(
    tree: &JoinTree,
    root: NodeId,
    evaluator: &mut E,
) -> Result<Solution<E::Plan>, SolveError<E::Error>>
where
    E: JoinEvaluator,
    E::Plan: Clone,
{
    DPhyp::new(tree, root, EnumeratorConfig::default())?.solve(evaluator)
}
