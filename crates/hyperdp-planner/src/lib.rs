#![forbid(unsafe_code)]
//! hyperdp-planner: join tree → hypergraph → best join order.
//!
//! Design:
//! - `hypergraph` turns a `JoinTree` into one hyperedge per join operator,
//!   widened wherever outer/semi/anti joins forbid reordering.
//! - `enumerate` runs DPhyp over that hypergraph, handing every
//!   csg/cmp pair to a caller-supplied `JoinEvaluator`.
//! - `cost` is a ready-made evaluator with coarse cardinality estimates.
//! - `dsl` reads join trees from YAML.
//!
//! Enumeration is single-threaded and owns all of its state; separate runs
//! share nothing.

pub mod cost;
pub mod dsl;
pub mod enumerate;
pub mod evaluate;
pub mod hypergraph;
pub mod store;
pub mod trace;

pub use cost::{estimate_join_rows, CostError, CostEvaluator, PlanNode};
pub use dsl::yaml::{parse_yaml_join_tree, DslError, ParsedJoinTree};
pub use enumerate::{solve, DPhyp, EnumerationStats, Solution, SolveError};
pub use evaluate::JoinEvaluator;
pub use hypergraph::{Hyperedge, Hypergraph};
pub use store::PlanStore;
pub use trace::{EnumerationTrace, LogTrace, NoopTrace, RecordingTrace};
