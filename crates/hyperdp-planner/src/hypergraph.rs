//! Join tree → hypergraph.
//!
//! Each leaf gets a dense index in tree order. Each join operator gets a
//! total eligibility set (TES): the relations that must be present before it
//! may fire. The TES starts as the relations its predicate references inside
//! its own subtree and grows whenever reordering the operator past a
//! descendant would change the result. The final TES is split by the right
//! subtree into one hyperedge per operator.
//!
//! Edges are stored flat: operator `e` owns `edges[2e]` (left side) and
//! `edges[2e + 1]` (right side), so `edges[i ^ 1]` is always the opposite side.

use std::collections::HashMap;

use hyperdp_core::config::EnumeratorConfig;
use hyperdp_core::error::{Error, Result};
use hyperdp_core::id::{NodeId, OperatorId};
use hyperdp_core::relset::{RelSet, MAX_RELATIONS};
use hyperdp_core::tree::{JoinCondition, JoinOp, JoinTree, NodeKind};

/// One operator's reordering constraint, split into the part drawn from its
/// left input and the part drawn from its right input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hyperedge {
    pub left: RelSet,
    pub right: RelSet,
}

impl Hyperedge {
    /// The operator's total eligibility set.
    pub fn tes(&self) -> RelSet {
        self.left | self.right
    }

    /// An edge with an empty side relates nothing and never connects sets.
    pub fn is_inert(&self) -> bool {
        self.left.is_empty() || self.right.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Hypergraph {
    relations: Vec<NodeId>,
    operators: Vec<NodeId>,
    edges: Vec<RelSet>,
}

impl Hypergraph {
    /// Build the hypergraph for the tree rooted at `root`.
    ///
    /// Fails before any analysis if the tree holds more relations than
    /// `config.max_relations`, or if `root` is not a proper root.
    pub fn build(tree: &JoinTree, root: NodeId, config: &EnumeratorConfig) -> Result<Self> {
        tree.check_root(root)?;
        let relations = tree.leaves(root)?;
        let max = config.max_relations.min(MAX_RELATIONS);
        if relations.len() > max {
            return Err(Error::TooManyRelations {
                count: relations.len(),
                max,
            });
        }

        let mut builder = Builder::new(tree, &relations)?;
        builder.init_ses(root)?;
        builder.calc_tes(root)?;

        let Builder {
            operators, edges, ..
        } = builder;
        Ok(Self {
            relations,
            operators,
            edges,
        })
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Leaf nodes, indexed by relation index.
    pub fn relations(&self) -> &[NodeId] {
        &self.relations
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    /// Join nodes, indexed by `OperatorId` (children before parents).
    pub fn operators(&self) -> &[NodeId] {
        &self.operators
    }

    pub fn operator_node(&self, op: OperatorId) -> Option<NodeId> {
        self.operators.get(op.index()).copied()
    }

    /// Flat edge array: `edges[2e]`, `edges[2e + 1]` belong to operator `e`.
    pub fn edges(&self) -> &[RelSet] {
        &self.edges
    }

    /// `None` for an operator this graph does not hold.
    pub fn edge(&self, op: OperatorId) -> Option<Hyperedge> {
        let e = op.index() * 2;
        Some(Hyperedge {
            left: *self.edges.get(e)?,
            right: *self.edges.get(e + 1)?,
        })
    }

    pub fn hyperedges(&self) -> impl Iterator<Item = (OperatorId, Hyperedge)> + '_ {
        self.edges.chunks_exact(2).enumerate().map(|(e, pair)| {
            let edge = Hyperedge {
                left: pair[0],
                right: pair[1],
            };
            (OperatorId::new(e as u32), edge)
        })
    }

    /// Every relation of the run.
    pub fn all(&self) -> RelSet {
        RelSet::full(self.relations.len())
    }

    /// Relation names by index, for rendering sets.
    pub fn relation_names<'t>(&self, tree: &'t JoinTree) -> Vec<&'t str> {
        self.relations
            .iter()
            .map(|id| {
                tree.get(*id)
                    .and_then(|n| n.as_relation())
                    .map(|r| r.name.as_str())
                    .unwrap_or("?")
            })
            .collect()
    }
}

/// Scratch state for one build; dropped once the edges are emitted.
struct Builder<'t> {
    tree: &'t JoinTree,
    by_name: HashMap<&'t str, usize>,
    leaf_index: HashMap<NodeId, usize>,
    // Indexed by NodeId.
    ses: Vec<RelSet>,
    tes: Vec<RelSet>,
    operators: Vec<NodeId>,
    edges: Vec<RelSet>,
}

impl<'t> Builder<'t> {
    fn new(tree: &'t JoinTree, relations: &[NodeId]) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(relations.len());
        let mut leaf_index = HashMap::with_capacity(relations.len());
        for (i, id) in relations.iter().enumerate() {
            let rel = tree
                .node(*id)?
                .as_relation()
                .ok_or_else(|| Error::Invariant(format!("{id} is not a leaf")))?;
            if by_name.insert(rel.name.as_str(), i).is_some() {
                return Err(Error::MalformedTree(format!(
                    "relation name '{}' appears more than once",
                    rel.name
                )));
            }
            leaf_index.insert(*id, i);
        }
        let n = tree.len();
        Ok(Self {
            tree,
            by_name,
            leaf_index,
            ses: vec![RelSet::EMPTY; n],
            tes: vec![RelSet::EMPTY; n],
            operators: Vec::new(),
            edges: Vec::new(),
        })
    }

    fn join(&self, id: NodeId) -> Result<&'t JoinOp> {
        let tree: &'t JoinTree = self.tree;
        tree.node(id)?
            .as_join()
            .ok_or_else(|| Error::Invariant(format!("{id} is not a join")))
    }

    /// Syntactic tables bottom-up; the initial TES is SES ∩ PES.
    fn init_ses(&mut self, id: NodeId) -> Result<RelSet> {
        let tree = self.tree;
        let set = match &tree.node(id)?.kind {
            NodeKind::Relation(_) => {
                let i = self.leaf_index.get(&id).copied().ok_or_else(|| {
                    Error::Invariant(format!("leaf {id} missing from relation list"))
                })?;
                RelSet::of(i)
            }
            NodeKind::Join(op) => {
                let set = self.init_ses(op.left)? | self.init_ses(op.right)?;
                let pes = self.predicate_tables(&op.conditions);
                self.tes[id.index()] = set & pes;
                set
            }
        };
        self.ses[id.index()] = set;
        Ok(set)
    }

    /// Relations referenced by a predicate. Names outside the tree are ignored.
    fn predicate_tables(&self, conditions: &[JoinCondition]) -> RelSet {
        conditions
            .iter()
            .flat_map(|c| c.columns())
            .filter_map(|c| self.by_name.get(c.relation.as_str()).copied())
            .collect()
    }

    /// Extend TES by reordering conflicts, then emit the operator's edge.
    fn calc_tes(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;
        let NodeKind::Join(op) = &tree.node(id)?.kind else {
            return Ok(());
        };
        self.calc_tes(op.left)?;
        self.calc_tes(op.right)?;
        self.add_conflicts(id, op.left, true)?;
        self.add_conflicts(id, op.right, false)?;

        let tes = self.tes[id.index()];
        let right = tes & self.ses[op.right.index()];
        let left = tes - right;
        self.operators.push(id);
        self.edges.push(left);
        self.edges.push(right);
        Ok(())
    }

    /// Fold conflicting descendants of `o1` found under `sub` into its TES.
    fn add_conflicts(&mut self, o1: NodeId, sub: NodeId, left: bool) -> Result<()> {
        let tree = self.tree;
        let Some(o2_op) = tree.node(sub)?.as_join() else {
            return Ok(());
        };
        let conflict = if left {
            self.left_conflict(sub, o1)?
        } else {
            self.right_conflict(o1, sub)?
        };
        if conflict {
            let grown = self.tes[o1.index()] | self.tes[sub.index()];
            self.tes[o1.index()] = grown;
        }
        self.add_conflicts(o1, o2_op.left, left)?;
        self.add_conflicts(o1, o2_op.right, left)
    }

    /// `o2` sits in the left subtree of `o1`.
    fn left_conflict(&self, o2: NodeId, o1: NodeId) -> Result<bool> {
        let (k1, k2) = (self.join(o1)?.kind, self.join(o2)?.kind);
        Ok(self.tes[o2.index()].overlaps(self.right_tables(o1, o2)?) && k2.conflicts_with(k1))
    }

    /// `o2` sits in the right subtree of `o1`.
    fn right_conflict(&self, o1: NodeId, o2: NodeId) -> Result<bool> {
        let (k1, k2) = (self.join(o1)?.kind, self.join(o2)?.kind);
        Ok(self.tes[o2.index()].overlaps(self.left_tables(o1, o2)?) && k1.conflicts_with(k2))
    }

    /// Left-input tables on the path from `o2` (inclusive) up to `o1` (exclusive).
    fn left_tables(&self, o1: NodeId, o2: NodeId) -> Result<RelSet> {
        self.path_tables(o1, o2, |op| op.left, |op| op.right)
    }

    /// Right-input tables on the path from `o2` (inclusive) up to `o1` (exclusive).
    fn right_tables(&self, o1: NodeId, o2: NodeId) -> Result<RelSet> {
        self.path_tables(o1, o2, |op| op.right, |op| op.left)
    }

    /// Walk parent links from `o2` to `o1`, collecting the `side` input of
    /// every join passed. A commutative `o2` may swap inputs, so its
    /// `opposite` input counts too.
    fn path_tables(
        &self,
        o1: NodeId,
        o2: NodeId,
        side: impl Fn(&JoinOp) -> NodeId,
        opposite: impl Fn(&JoinOp) -> NodeId,
    ) -> Result<RelSet> {
        let mut result = RelSet::EMPTY;
        let mut o3 = o2;
        while o3 != o1 {
            let op = self.join(o3)?;
            result |= self.ses[side(op).index()];
            o3 = self.tree.parent(o3).ok_or_else(|| {
                Error::MalformedTree(format!("{o2} is not below {o1}"))
            })?;
        }
        let op2 = self.join(o2)?;
        if op2.kind.is_commutative() {
            result |= self.ses[opposite(op2).index()];
        }
        Ok(result)
    }
}
