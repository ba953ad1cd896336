//! YAML → `JoinTree` parser.
//!
//! Example:
//! ```yaml
//! config: { dense_store_max_relations: 12 }
//! relations:
//!   - { name: orders,   rows: 150000 }
//!   - { name: customer, rows: 15000 }
//!   - { name: nation,   rows: 25 }
//! tree:
//!   join: inner
//!   on: ["customer.c_nationkey = nation.n_nationkey"]
//!   left:
//!     join: inner
//!     on: ["orders.o_custkey = customer.c_custkey"]
//!     left:  { scan: orders }
//!     right: { scan: customer }
//!   right: { scan: nation }
//! ```
//!
//! Conditions of the form `a.x = b.y` become equalities; anything else is
//! kept as free text and scanned for `relation.column` references.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hyperdp_core::config::EnumeratorConfig;
use hyperdp_core::error::Error;
use hyperdp_core::id::NodeId;
use hyperdp_core::tree::{ColumnRef, JoinCondition, JoinKind, JoinTree, Relation};

#[derive(Debug, Error)]
pub enum DslError {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown join kind '{0}'")]
    UnknownJoinKind(String),

    #[error("scan of undeclared relation '{0}'")]
    UnknownRelation(String),

    #[error("relation '{0}' is scanned more than once")]
    DuplicateScan(String),

    #[error(transparent)]
    Tree(#[from] Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinTreeDoc {
    #[serde(default)]
    pub config: Option<EnumeratorConfig>,
    #[serde(default)]
    pub relations: Option<Vec<Relation>>,
    pub tree: TreeDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeDef {
    Scan {
        scan: String,
        #[serde(default)]
        rows: Option<u64>,
    },
    Join {
        join: String,
        #[serde(default)]
        on: Vec<String>,
        left: Box<TreeDef>,
        right: Box<TreeDef>,
    },
}

#[derive(Debug, Clone)]
pub struct ParsedJoinTree {
    pub tree: JoinTree,
    pub root: NodeId,
    /// The document's `config:` block, already validated.
    pub config: Option<EnumeratorConfig>,
}

impl ParsedJoinTree {
    /// The document's config if it has one, else `base`.
    pub fn config_or(&self, base: EnumeratorConfig) -> EnumeratorConfig {
        self.config.clone().unwrap_or(base)
    }
}

pub fn parse_yaml_join_tree(yaml_src: &str) -> Result<ParsedJoinTree, DslError> {
    let doc: JoinTreeDoc = serde_yaml::from_str(yaml_src)?;
    if let Some(cfg) = &doc.config {
        cfg.validate()?;
    }

    let declared = match &doc.relations {
        Some(rels) => {
            let mut by_name = HashMap::with_capacity(rels.len());
            for rel in rels {
                if by_name.insert(rel.name.as_str(), rel).is_some() {
                    return Err(Error::MalformedTree(format!(
                        "relation '{}' is declared more than once",
                        rel.name
                    ))
                    .into());
                }
            }
            Some(by_name)
        }
        None => None,
    };

    let mut builder = TreeBuilder {
        tree: JoinTree::new(),
        declared,
        scanned: HashSet::new(),
    };
    let root = builder.build(&doc.tree)?;
    Ok(ParsedJoinTree {
        tree: builder.tree,
        root,
        config: doc.config,
    })
}

struct TreeBuilder<'d> {
    tree: JoinTree,
    declared: Option<HashMap<&'d str, &'d Relation>>,
    scanned: HashSet<String>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, def: &TreeDef) -> Result<NodeId, DslError> {
        match def {
            TreeDef::Scan { scan, rows } => {
                if !self.scanned.insert(scan.clone()) {
                    return Err(DslError::DuplicateScan(scan.clone()));
                }
                let mut relation = match &self.declared {
                    Some(decl) => decl
                        .get(scan.as_str())
                        .map(|r| (*r).clone())
                        .ok_or_else(|| DslError::UnknownRelation(scan.clone()))?,
                    None => Relation::new(scan.as_str()),
                };
                if rows.is_some() {
                    relation.rows = *rows;
                }
                Ok(self.tree.relation(relation))
            }
            TreeDef::Join {
                join,
                on,
                left,
                right,
            } => {
                let kind: JoinKind = join
                    .parse()
                    .map_err(|_| DslError::UnknownJoinKind(join.clone()))?;
                let conditions = on
                    .iter()
                    .map(String::as_str)
                    .map(parse_condition)
                    .collect::<Result<Vec<_>, _>>()?;
                let l = self.build(left)?;
                let r = self.build(right)?;
                Ok(self.tree.join(kind, l, r, conditions)?)
            }
        }
    }
}

/// `a.x = b.y` becomes an equality; anything else is free text whose
/// `relation.column` references are collected.
pub fn parse_condition(src: &str) -> Result<JoinCondition, Error> {
    let text = src.trim();
    if text.is_empty() {
        return Err(Error::MalformedTree("empty join condition".into()));
    }
    let plain_eq = !text.contains(['!', '<', '>']) && text.matches('=').count() == 1;
    if plain_eq {
        if let Some((l, r)) = text.split_once('=') {
            if let (Ok(l), Ok(r)) = (l.parse::<ColumnRef>(), r.parse::<ColumnRef>()) {
                if is_identifier_ref(&l) && is_identifier_ref(&r) {
                    return Ok(JoinCondition::Eq(l, r));
                }
            }
        }
    }
    Ok(JoinCondition::Expr {
        text: text.to_string(),
        columns: column_refs(text),
    })
}

fn is_identifier_ref(c: &ColumnRef) -> bool {
    is_identifier(&c.relation) && is_identifier(&c.column)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Every `ident.ident` token in `text`, in order of appearance.
fn column_refs(text: &str) -> Vec<ColumnRef> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .filter_map(|tok| {
            let (rel, col) = tok.split_once('.')?;
            (is_identifier(rel) && is_identifier(col)).then(|| ColumnRef::new(rel, col))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_and_expression_conditions() {
        let c = parse_condition("orders.o_custkey = customer.c_custkey").unwrap();
        assert!(c.is_equality());

        let c = parse_condition("a.x + 1 > b.y AND b.y < 2.5").unwrap();
        let cols: Vec<String> = c.columns().map(|c| c.to_string()).collect();
        assert_eq!(cols, vec!["a.x", "b.y", "b.y"]);
        assert!(!c.is_equality());

        assert!(parse_condition("  ").is_err());
    }

    #[test]
    fn parses_nested_tree_with_stats() {
        let src = r#"
relations:
  - { name: a, rows: 10 }
  - { name: b, rows: 20 }
  - { name: c }
tree:
  join: left
  on: ["b.k = c.k"]
  left:
    join: inner
    on: ["a.k = b.k"]
    left: { scan: a }
    right: { scan: b }
  right: { scan: c, rows: 5 }
"#;
        let parsed = parse_yaml_join_tree(src).unwrap();
        assert!(parsed.config.is_none());
        let leaves = parsed.tree.leaves(parsed.root).unwrap();
        let rows: Vec<Option<u64>> = leaves
            .iter()
            .map(|id| parsed.tree.node(*id).unwrap().as_relation().unwrap().rows)
            .collect();
        assert_eq!(rows, vec![Some(10), Some(20), Some(5)]);
        let top = parsed.tree.node(parsed.root).unwrap().as_join().unwrap();
        assert_eq!(top.kind, JoinKind::Left);
    }

    #[test]
    fn rejects_bad_documents() {
        let dup = "tree: { join: inner, left: { scan: a }, right: { scan: a } }";
        assert!(matches!(
            parse_yaml_join_tree(dup),
            Err(DslError::DuplicateScan(name)) if name == "a"
        ));

        let kind = "tree: { join: cross, left: { scan: a }, right: { scan: b } }";
        assert!(matches!(
            parse_yaml_join_tree(kind),
            Err(DslError::UnknownJoinKind(_))
        ));

        let undeclared = "relations: [{ name: a }]\ntree: { join: inner, left: { scan: a }, right: { scan: b } }";
        assert!(matches!(
            parse_yaml_join_tree(undeclared),
            Err(DslError::UnknownRelation(name)) if name == "b"
        ));

        assert!(matches!(
            parse_yaml_join_tree("tree: [1, 2"),
            Err(DslError::Yaml(_))
        ));
    }

    #[test]
    fn config_block_is_validated() {
        let ok = "config: { dense_store_max_relations: 4 }\ntree: { scan: a }";
        let parsed = parse_yaml_join_tree(ok).unwrap();
        let cfg = parsed.config_or(EnumeratorConfig::default());
        assert_eq!(cfg.dense_store_max_relations, 4);
        assert_eq!(cfg.max_relations, 64);

        let bad = "config: { dense_store_max_relations: 40 }\ntree: { scan: a }";
        assert!(matches!(
            parse_yaml_join_tree(bad),
            Err(DslError::Tree(Error::Config(_)))
        ));
    }
}
