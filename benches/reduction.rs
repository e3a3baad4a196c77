use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lamdag::dag::{new_app, new_prim, DAG, DAGPtr};
use lamdag::prim::{Nat, Suc};
use lamdag::term::Term;
use num_bigint::BigUint;
use std::collections::BTreeMap;

fn church(n: u64) -> Term {
    let mut bod = Term::var("x", 0);
    for _ in 0..n {
        bod = Term::app(Term::var("f", 1), bod);
    }
    Term::lam("f", Term::lam("x", bod))
}

fn mul(a: Term, b: Term) -> Term {
    // λ n m s => m (n s)
    let mul = Term::lam(
        "n",
        Term::lam(
            "m",
            Term::lam(
                "s",
                Term::app(
                    Term::var("m", 1),
                    Term::app(Term::var("n", 2), Term::var("s", 0)),
                ),
            ),
        ),
    );
    Term::app(Term::app(mul, a), b)
}

// Drive a Church numeral all the way to a primitive literal: the successor
// primitive forces its argument, so head reduction performs the whole
// computation.
fn run_to_nat(term: &Term) -> String {
    let numeral = DAG::from_term_inner(term, 0, BTreeMap::new(), None);
    let partial = new_app(numeral, DAGPtr::Prim(new_prim(Box::new(Suc))));
    let zero = DAGPtr::Prim(new_prim(Box::new(Nat(BigUint::from(0u64)))));
    let full = new_app(DAGPtr::App(partial), zero);
    let mut dag = DAG::new(DAGPtr::App(full));
    dag.hnf();
    let sym = dag.get_prim().expect("numeral did not reduce").symbol();
    dag.free();
    sym
}

pub fn church_mul(c: &mut Criterion) {
    let n100 = mul(church(10), church(10));
    let n1k = mul(church(10), mul(church(10), church(10)));
    c.bench_function("church 10*10", |b| {
        b.iter(|| {
            assert_eq!(run_to_nat(black_box(&n100)), "#100");
        })
    });
    c.bench_function("church 10*10*10", |b| {
        b.iter(|| {
            assert_eq!(run_to_nat(black_box(&n1k)), "#1000");
        })
    });
}

pub fn church_norm(c: &mut Criterion) {
    let n64 = mul(mul(church(4), church(4)), church(4));
    c.bench_function("normalize 4*4*4", |b| {
        b.iter(|| {
            let mut dag = DAG::from_term(black_box(&n64));
            dag.norm();
            dag.free();
        })
    });
}

criterion_group!(benches, church_mul, church_norm);
criterion_main!(benches);
