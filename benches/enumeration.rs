use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hyperdp_core::prelude::*;
use hyperdp_planner::{CostEvaluator, DPhyp, Hypergraph};

fn eq(a: usize, b: usize) -> JoinCondition {
    JoinCondition::Eq(
        ColumnRef::new(format!("r{a}"), "k"),
        ColumnRef::new(format!("r{b}"), "k"),
    )
}

fn left_deep(n: usize, on: impl Fn(usize) -> Vec<JoinCondition>) -> (JoinTree, NodeId) {
    let mut t = JoinTree::new();
    let mut cur = t.relation(Relation::new("r0").with_rows(1_000));
    for i in 1..n {
        let r = t.relation(Relation::new(format!("r{i}")).with_rows(1_000 * (i as u64 % 7 + 1)));
        cur = t.join(JoinKind::Inner, cur, r, on(i)).unwrap();
    }
    (t, cur)
}

fn bench_shapes(c: &mut Criterion) {
    let shapes: [(&str, usize, fn(usize) -> Vec<JoinCondition>); 3] = [
        ("chain", 20, |i| vec![eq(i - 1, i)]),
        ("star", 12, |i| vec![eq(0, i)]),
        ("clique_like", 12, |i| (0..i).map(|j| eq(j, i)).collect()),
    ];
    let mut group = c.benchmark_group("dphyp");
    for (name, n, on) in shapes {
        let (tree, root) = left_deep(n, on);
        group.bench_with_input(BenchmarkId::new(name, n), &n, |b, _| {
            b.iter(|| {
                let (_, solution) = DPhyp::run(
                    &tree,
                    root,
                    EnumeratorConfig::default(),
                    &mut CostEvaluator::new(),
                )
                .unwrap();
                assert!(solution.is_complete());
            })
        });
    }
    group.finish();
}

fn bench_hypergraph_build(c: &mut Criterion) {
    let (tree, root) = left_deep(64, |i| vec![eq(i - 1, i)]);
    c.bench_function("hypergraph_build_64", |b| {
        b.iter(|| {
            let g = Hypergraph::build(&tree, root, &EnumeratorConfig::default()).unwrap();
            assert_eq!(g.operator_count(), 63);
        })
    });
}

criterion_group!(benches, bench_shapes, bench_hypergraph_build);
criterion_main!(benches);
