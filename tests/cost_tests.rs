//! Reference evaluator tests


use hyperdp_core::prelude::*;
use hyperdp_planner::{solve, CostEvaluator, DPhyp, PlanNode, Solution};
use tree_gen::{chain, eq};

fn plan(solution: Solution<std::sync::Arc<PlanNode>>) -> std::sync::Arc<PlanNode> {
    solution.into_plan().expect("complete plan")
}

#[test]
fn small_relation_is_joined_first() {
    // big ⋈ mid ⋈ tiny as written; tiny should meet mid before big does.
    let mut t = JoinTree::new();
    let big = t.relation(Relation::new("big").with_rows(1_000_000));
    let mid = t.relation(Relation::new("mid").with_rows(10_000));
    let tiny = t.relation(Relation::new("tiny").with_rows(10));
    let on_bm = vec![JoinCondition::eq("big.k", "mid.k").unwrap()];
    let on_mt = vec![JoinCondition::eq("mid.j", "tiny.j").unwrap()];
    let bm = t.join(JoinKind::Inner, big, mid, on_bm).unwrap();
    let root = t.join(JoinKind::Inner, bm, tiny, on_mt).unwrap();

    let best = plan(solve(&t, root, &mut CostEvaluator::new()).unwrap());
    // big ⋈ (mid ⋈ tiny): 10 + 10 beats (big ⋈ mid) ⋈ tiny: 10_000 + 10.
    assert_eq!(best.cost(), 20);
    let PlanNode::Join { left, right, .. } = best.as_ref() else {
        panic!("expected a join at the root");
    };
    let mut sides = vec![left.relations(), right.relations()];
    sides.sort();
    assert_eq!(sides, vec![vec!["big"], vec!["mid", "tiny"]]);
}

#[test]
fn best_plan_covers_every_relation_once() {
    let (t, root) = chain(6);
    let best = plan(solve(&t, root, &mut CostEvaluator::new()).unwrap());
    let mut rels = best.relations();
    rels.sort();
    assert_eq!(rels, vec!["r0", "r1", "r2", "r3", "r4", "r5"]);
}

#[test]
fn plan_cost_never_exceeds_the_written_order() {
    let (t, root) = chain(7);
    let written = {
        // The written left-deep order, costed the same way.
        let mut cost = 0u64;
        let mut rows = 1000u64;
        for i in 1..7u64 {
            rows = hyperdp_planner::estimate_join_rows(rows, 1000 + 10 * i, JoinKind::Inner, 1);
            cost += rows;
        }
        cost
    };
    let best = plan(solve(&t, root, &mut CostEvaluator::new()).unwrap());
    assert!(best.cost() <= written);
}

#[test]
fn default_rows_fill_missing_statistics() {
    let mut t = JoinTree::new();
    let a = t.relation(Relation::new("r0"));
    let b = t.relation(Relation::new("r1").with_rows(400));
    let root = t.join(JoinKind::Left, a, b, vec![eq(0, 1)]).unwrap();
    let mut ev = CostEvaluator::with_default_rows(100);
    let (dp, solution) = DPhyp::run(&t, root, EnumeratorConfig::default(), &mut ev).unwrap();
    let best = plan(solution);
    assert_eq!(best.rows(), 120);
    assert_eq!(dp.stats().joins_evaluated, 1);
}

#[test]
fn explain_json_has_stable_shape() {
    let mut t = JoinTree::new();
    let a = t.relation(Relation::new("a").with_rows(4));
    let b = t.relation(Relation::new("b").with_rows(9));
    let on = vec![JoinCondition::eq("a.k", "b.k").unwrap()];
    let root = t.join(JoinKind::Semi, a, b, on).unwrap();
    let best = plan(solve(&t, root, &mut CostEvaluator::new()).unwrap());
    let json = serde_json::to_value(best.as_ref()).unwrap();
    assert_eq!(json["node"], "join");
    assert_eq!(json["kind"], "semi");
    assert_eq!(json["rows"], 2);
    assert_eq!(json["conditions"][0], "a.k = b.k");
    assert_eq!(json["left"]["relation"], "a");
}
