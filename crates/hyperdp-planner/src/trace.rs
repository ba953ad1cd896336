//! Observability hooks for one enumeration run.
//!
//! The enumerator is generic over `EnumerationTrace`; every method defaults to
//! a no-op, so `NoopTrace` compiles away entirely. `LogTrace` forwards to
//! `tracing` (feature: `tracing`), and `RecordingTrace` keeps everything in
//! memory for tests and the CLI.

use hyperdp_core::id::OperatorId;
use hyperdp_core::relset::RelSet;
use hyperdp_core::tree::JoinKind;

use crate::hypergraph::Hyperedge;

pub trait EnumerationTrace {
    /// A hyperedge produced by the builder (only when `trace_edges` is on).
    fn edge(&mut self, _op: OperatorId, _edge: Hyperedge) {}

    /// A plan was stored for `set`; `first` is true the first time.
    fn plan_class(&mut self, _set: RelSet, _first: bool) {}

    /// A connected subgraph / connected complement pair reached the join point.
    fn csg_cmp_pair(&mut self, _csg: RelSet, _cmp: RelSet, _op: OperatorId) {}

    /// `evaluate_join` was called with this operand order.
    fn join_evaluated(&mut self, _left: RelSet, _right: RelSet, _kind: JoinKind) {}
}

impl<T: EnumerationTrace + ?Sized> EnumerationTrace for &mut T {
    fn edge(&mut self, op: OperatorId, edge: Hyperedge) {
        (**self).edge(op, edge)
    }

    fn plan_class(&mut self, set: RelSet, first: bool) {
        (**self).plan_class(set, first)
    }

    fn csg_cmp_pair(&mut self, csg: RelSet, cmp: RelSet, op: OperatorId) {
        (**self).csg_cmp_pair(csg, cmp, op)
    }

    fn join_evaluated(&mut self, left: RelSet, right: RelSet, kind: JoinKind) {
        (**self).join_evaluated(left, right, kind)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTrace;

impl EnumerationTrace for NoopTrace {}

/// Emits `tracing` events at TRACE level, rendering sets with relation names.
#[derive(Debug, Clone, Default)]
pub struct LogTrace {
    names: Vec<String>,
}

impl LogTrace {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    fn render(&self, set: RelSet) -> String {
        set.display_with(&self.names).to_string()
    }
}

#[cfg(feature = "tracing")]
impl EnumerationTrace for LogTrace {
    fn edge(&mut self, op: OperatorId, edge: Hyperedge) {
        tracing::trace!(
            op = op.get(),
            left = %self.render(edge.left),
            right = %self.render(edge.right),
            "hyperedge"
        );
    }

    fn plan_class(&mut self, set: RelSet, first: bool) {
        tracing::trace!(set = %self.render(set), first, "plan class");
    }

    fn csg_cmp_pair(&mut self, csg: RelSet, cmp: RelSet, op: OperatorId) {
        tracing::trace!(
            csg = %self.render(csg),
            cmp = %self.render(cmp),
            op = op.get(),
            "csg-cmp pair"
        );
    }

    fn join_evaluated(&mut self, left: RelSet, right: RelSet, kind: JoinKind) {
        tracing::trace!(
            left = %self.render(left),
            right = %self.render(right),
            %kind,
            "evaluate join"
        );
    }
}

#[cfg(not(feature = "tracing"))]
impl EnumerationTrace for LogTrace {}

/// Keeps every event in order of arrival.
#[derive(Debug, Clone, Default)]
pub struct RecordingTrace {
    pub edges: Vec<(OperatorId, Hyperedge)>,
    /// Sets in the order they were first stored.
    pub plan_classes: Vec<RelSet>,
    pub pairs: Vec<(RelSet, RelSet, OperatorId)>,
    pub evaluations: Vec<(RelSet, RelSet, JoinKind)>,
}

impl RecordingTrace {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnumerationTrace for RecordingTrace {
    fn edge(&mut self, op: OperatorId, edge: Hyperedge) {
        self.edges.push((op, edge));
    }

    fn plan_class(&mut self, set: RelSet, first: bool) {
        if first {
            self.plan_classes.push(set);
        }
    }

    fn csg_cmp_pair(&mut self, csg: RelSet, cmp: RelSet, op: OperatorId) {
        self.pairs.push((csg, cmp, op));
    }

    fn join_evaluated(&mut self, left: RelSet, right: RelSet, kind: JoinKind) {
        self.evaluations.push((left, right, kind));
    }
}
