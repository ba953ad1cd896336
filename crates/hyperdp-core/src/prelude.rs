//! Convenient re-exports for downstream crates.

pub use crate::config::EnumeratorConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{NodeId, OperatorId};
pub use crate::relset::{RelSet, MAX_RELATIONS};
pub use crate::tree::{ColumnRef, JoinCondition, JoinKind, JoinOp, JoinTree, Node, NodeKind, Relation};
