//! Benchmarks for belief base and unification operations.

use bdi_rust::{AgentBuilder, Expression, Literal, Path, Term, Unifier};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn point(x: i64, y: i64) -> Literal {
    Literal::new("point", vec![Term::int(x), Term::int(y)])
}

fn goal() -> Literal {
    Literal::new("point", vec![Term::var("X"), Term::var("Y")])
}

fn bench_value_hash(c: &mut Criterion) {
    let values = vec![
        Term::literal(Literal::new("sub", vec![Term::int(3)])),
        Term::literal(Literal::new("data", vec![Term::literal(Literal::new(
            "value",
            vec![Term::string("data string")],
        ))])),
        Term::var("X"),
    ];

    c.bench_function("literal_new_nested", |b| {
        b.iter(|| Literal::new("foo", black_box(values.clone())))
    });
}

fn bench_beliefbase_add(c: &mut Criterion) {
    c.bench_function("beliefbase_add_1000", |b| {
        b.iter(|| {
            let agent = AgentBuilder::new().build().unwrap();
            for i in 0..1000 {
                agent.add(point(i, i));
            }
            black_box(agent.beliefbase().size())
        })
    });
}

fn bench_query(c: &mut Criterion) {
    let agent = AgentBuilder::new()
        .beliefs((0..1000).map(|i| point(i, i)))
        .build()
        .unwrap();
    let path = Path::new("point");

    c.bench_function("query_1000", |b| {
        b.iter(|| agent.query(false, black_box(&path)).count())
    });
}

fn bench_unify_first(c: &mut Criterion) {
    let agent = AgentBuilder::new()
        .beliefs((0..1000).map(|i| point(i, i)))
        .build()
        .unwrap();
    let goal = goal();

    c.bench_function("unify_first_of_1000", |b| {
        b.iter(|| {
            let mut ctx = agent.context();
            Unifier.unify(&mut ctx, black_box(&goal), None, false).unwrap()
        })
    });
}

fn bench_unify_guarded(c: &mut Criterion) {
    let agent = AgentBuilder::new()
        .beliefs((0..1000).map(|i| point(i, i)))
        .build()
        .unwrap();
    let goal = goal();
    let guard = Expression::binary(">", Expression::var("X"), Expression::constant(990)).unwrap();

    c.bench_function("unify_guarded_sequential", |b| {
        b.iter(|| {
            let mut ctx = agent.context();
            Unifier.unify(&mut ctx, black_box(&goal), Some(&guard), false).unwrap()
        })
    });

    c.bench_function("unify_guarded_parallel", |b| {
        b.iter(|| {
            let mut ctx = agent.context();
            Unifier.unify(&mut ctx, black_box(&goal), Some(&guard), true).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_value_hash,
    bench_beliefbase_add,
    bench_query,
    bench_unify_first,
    bench_unify_guarded
);
criterion_main!(benches);
