//! Join trees: the input to hypergraph construction.
//!
//! The tree lives in an arena. A node is either a leaf relation (base table,
//! derived table, or a sub-join handled atomically) or a binary join operator.
//! Children are created before their parent, so an arena built through
//! [`JoinTree::join`] cannot hold a cycle, and every node records its parent
//! exactly once when it is attached. A deserialized arena carries no such
//! guarantee; [`JoinTree::leaves`] rejects one that is not a proper tree.
//! The parent link is a back-reference only; the arena owns every node.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::id::NodeId;

/// Join operator semantics relevant to reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    Left,
    Full,
    Semi,
    Anti,
}

impl JoinKind {
    /// Operands may be swapped without changing the result.
    pub fn is_commutative(self) -> bool {
        matches!(self, JoinKind::Inner | JoinKind::Full)
    }

    /// Does parent operator `self` conflict with a `child` operator below it?
    ///
    /// Inner only conflicts with full-outer children, left-outer with anything
    /// but another left-outer, full-outer with inner children. Everything else
    /// is treated as conflicting.
    pub fn conflicts_with(self, child: JoinKind) -> bool {
        match self {
            JoinKind::Inner => child == JoinKind::Full,
            JoinKind::Left => child != JoinKind::Left,
            JoinKind::Full => child == JoinKind::Inner,
            JoinKind::Semi | JoinKind::Anti => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Full => "full",
            JoinKind::Semi => "semi",
            JoinKind::Anti => "anti",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinKind::Inner),
            "left" | "left_outer" | "left outer" => Ok(JoinKind::Left),
            "full" | "full_outer" | "full outer" => Ok(JoinKind::Full),
            "semi" => Ok(JoinKind::Semi),
            "anti" => Ok(JoinKind::Anti),
            other => Err(Error::MalformedTree(format!("unknown join kind '{other}'"))),
        }
    }
}

/// `relation.column`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub relation: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            column: column.into(),
        }
    }
}

impl FromStr for ColumnRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('.') {
            Some((rel, col)) if !rel.is_empty() && !col.is_empty() => {
                Ok(ColumnRef::new(rel.trim(), col.trim()))
            }
            _ => Err(Error::MalformedTree(format!(
                "invalid column reference '{s}', expected relation.column"
            ))),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.relation, self.column)
    }
}

/// One conjunct of a join predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinCondition {
    Eq(ColumnRef, ColumnRef),
    /// Any other predicate; only the columns it mentions matter here.
    Expr {
        text: String,
        columns: Vec<ColumnRef>,
    },
}

impl JoinCondition {
    /// Equality between two `relation.column` references.
    pub fn eq(left: &str, right: &str) -> Result<Self> {
        Ok(JoinCondition::Eq(left.parse()?, right.parse()?))
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnRef> + '_ {
        let (pair, rest): (Option<[&ColumnRef; 2]>, &[ColumnRef]) = match self {
            JoinCondition::Eq(l, r) => (Some([l, r]), &[]),
            JoinCondition::Expr { columns, .. } => (None, columns.as_slice()),
        };
        pair.into_iter().flatten().chain(rest.iter())
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, JoinCondition::Eq(..))
    }
}

impl fmt::Display for JoinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinCondition::Eq(l, r) => write!(f, "{l} = {r}"),
            JoinCondition::Expr { text, .. } => f.write_str(text),
        }
    }
}

/// Leaf of the join tree. Opaque to the enumerator apart from its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    /// Row-count estimate for cost models; unused by enumeration itself.
    #[serde(default)]
    pub rows: Option<u64>,
}

impl Relation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: None,
        }
    }

    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = Some(rows);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOp {
    pub kind: JoinKind,
    pub left: NodeId,
    pub right: NodeId,
    pub conditions: Vec<JoinCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Relation(Relation),
    Join(JoinOp),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    parent: Option<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn as_join(&self) -> Option<&JoinOp> {
        match &self.kind {
            NodeKind::Join(op) => Some(op),
            NodeKind::Relation(_) => None,
        }
    }

    pub fn as_relation(&self) -> Option<&Relation> {
        match &self.kind {
            NodeKind::Relation(rel) => Some(rel),
            NodeKind::Join(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinTree {
    nodes: Vec<Node>,
}

impl JoinTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a leaf relation.
    pub fn relation(&mut self, relation: Relation) -> NodeId {
        self.push(NodeKind::Relation(relation))
    }

    /// Add a join over two existing, still-unattached nodes.
    pub fn join(
        &mut self,
        kind: JoinKind,
        left: NodeId,
        right: NodeId,
        conditions: Vec<JoinCondition>,
    ) -> Result<NodeId> {
        if left == right {
            return Err(Error::MalformedTree(format!(
                "{left} used as both join inputs"
            )));
        }
        for child in [left, right] {
            if let Some(parent) = self.node(child)?.parent {
                return Err(Error::MalformedTree(format!(
                    "{child} is already an input of {parent}"
                )));
            }
        }
        let id = self.push(NodeKind::Join(JoinOp {
            kind,
            left,
            right,
            conditions,
        }));
        self.nodes[left.index()].parent = Some(id);
        self.nodes[right.index()].parent = Some(id);
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id)
            .ok_or_else(|| Error::MalformedTree(format!("unknown node {id}")))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    /// Nodes with no parent.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(i, _)| NodeId::new(i as u32))
    }

    /// The single root, if the arena holds exactly one tree.
    pub fn root(&self) -> Result<NodeId> {
        let mut roots = self.roots();
        match (roots.next(), roots.next()) {
            (Some(root), None) => Ok(root),
            (None, _) => Err(Error::MalformedTree("empty join tree".into())),
            (Some(_), Some(_)) => Err(Error::MalformedTree(
                "arena holds more than one unattached tree".into(),
            )),
        }
    }

    /// Check that `root` exists and is not attached under another join.
    pub fn check_root(&self, root: NodeId) -> Result<()> {
        match self.node(root)?.parent {
            None => Ok(()),
            Some(parent) => Err(Error::MalformedTree(format!(
                "{root} is not a root; its parent is {parent}"
            ))),
        }
    }

    /// Leaves under `root`, left to right.
    ///
    /// Also checks the shape a deserialized arena may lack: every node is
    /// reached at most once, and every child's parent link names the join
    /// that references it.
    pub fn leaves(&self, root: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if std::mem::replace(&mut seen[id.index()], true) {
                return Err(Error::MalformedTree(format!(
                    "{id} is reached more than once under {root}"
                )));
            }
            match &node.kind {
                NodeKind::Relation(_) => out.push(id),
                NodeKind::Join(op) => {
                    for child in [op.right, op.left] {
                        if self.node(child)?.parent != Some(id) {
                            return Err(Error::MalformedTree(format!(
                                "{child} is an input of {id} but not linked to it"
                            )));
                        }
                        stack.push(child);
                    }
                }
            }
        }
        Ok(out)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Node { kind, parent: None });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_links_are_set_on_attach() {
        let mut t = JoinTree::new();
        let a = t.relation(Relation::new("a"));
        let b = t.relation(Relation::new("b"));
        let j = t
            .join(JoinKind::Inner, a, b, vec![JoinCondition::eq("a.k", "b.k").unwrap()])
            .unwrap();
        assert_eq!(t.parent(a), Some(j));
        assert_eq!(t.parent(b), Some(j));
        assert_eq!(t.root().unwrap(), j);
        assert_eq!(t.leaves(j).unwrap(), vec![a, b]);
    }

    #[test]
    fn child_cannot_be_attached_twice() {
        let mut t = JoinTree::new();
        let a = t.relation(Relation::new("a"));
        let b = t.relation(Relation::new("b"));
        let c = t.relation(Relation::new("c"));
        t.join(JoinKind::Inner, a, b, vec![]).unwrap();
        let err = t.join(JoinKind::Inner, b, c, vec![]).unwrap_err();
        assert!(matches!(err, Error::MalformedTree(_)));
        assert!(t.join(JoinKind::Inner, c, c, vec![]).is_err());
        assert!(t.join(JoinKind::Inner, c, NodeId::new(99), vec![]).is_err());
    }

    #[test]
    fn deserialized_cycle_is_malformed() {
        // Join 0 reads join 1, which reads join 0 back.
        let src = r#"{"nodes": [
            {"kind": {"Join": {"kind": "inner", "left": 1, "right": 2, "conditions": []}}, "parent": null},
            {"kind": {"Join": {"kind": "inner", "left": 0, "right": 2, "conditions": []}}, "parent": 0},
            {"kind": {"Relation": {"name": "a", "rows": null}}, "parent": 1}
        ]}"#;
        let t: JoinTree = serde_json::from_str(src).unwrap();
        let root = NodeId::new(0);
        assert!(t.check_root(root).is_ok());
        assert!(matches!(t.leaves(root), Err(Error::MalformedTree(_))));
    }

    #[test]
    fn deserialized_stale_parent_link_is_malformed() {
        let mut t = JoinTree::new();
        let a = t.relation(Relation::new("a"));
        let b = t.relation(Relation::new("b"));
        t.join(JoinKind::Inner, a, b, vec![]).unwrap();
        // Drop b's parent link, as a hand-edited document might.
        let mut json = serde_json::to_value(&t).unwrap();
        json["nodes"][1]["parent"] = serde_json::Value::Null;
        let t: JoinTree = serde_json::from_value(json).unwrap();
        let err = t.leaves(NodeId::new(2)).unwrap_err();
        assert!(matches!(err, Error::MalformedTree(_)));
    }

    #[test]
    fn conflict_table() {
        use JoinKind::*;
        assert!(Inner.conflicts_with(Full));
        assert!(!Inner.conflicts_with(Left));
        assert!(!Left.conflicts_with(Left));
        assert!(Left.conflicts_with(Inner));
        assert!(Full.conflicts_with(Inner));
        assert!(!Full.conflicts_with(Full));
        assert!(Semi.conflicts_with(Semi));
        assert!(Inner.is_commutative() && Full.is_commutative());
        assert!(!Left.is_commutative());
    }

    #[test]
    fn parse_kinds_and_columns() {
        assert_eq!("LEFT".parse::<JoinKind>().unwrap(), JoinKind::Left);
        assert_eq!("full_outer".parse::<JoinKind>().unwrap(), JoinKind::Full);
        assert!("cross".parse::<JoinKind>().is_err());
        let c: ColumnRef = "orders.o_custkey".parse().unwrap();
        assert_eq!(c.relation, "orders");
        assert!("nodot".parse::<ColumnRef>().is_err());
    }
}
