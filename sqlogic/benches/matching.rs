use criterion::{Criterion, black_box, criterion_group, criterion_main};

use sqlogic::{
    matching::{MatchConditions, MatchProgram},
    op::{Function, SchemaVariable},
    parser::parse_term,
    services::Services,
    sort::{Sort, SortDeclaration},
    term::Term,
};

fn services() -> Services {
    let services = Services::default();
    let int = services.sorts().declare(SortDeclaration::new("int")).unwrap();
    for (name, arity) in [("add", 2), ("c", 0), ("d", 0)] {
        services
            .declare_function(Function::new(name, int.clone(), vec![int.clone(); arity]))
            .unwrap();
    }
    services
        .declare_function(Function::new("p", Sort::formula(), [int.clone()]))
        .unwrap();
    services.declare_program_variable("i", int.clone()).unwrap();
    services.declare_schema_variable(SchemaVariable::formula("phi")).unwrap();
    services.declare_schema_variable(SchemaVariable::formula("psi")).unwrap();
    services.declare_schema_variable(SchemaVariable::term("t", int.clone())).unwrap();
    services.declare_schema_variable(SchemaVariable::variable("x", int)).unwrap();
    services
}

/// A conjunction of `n` copies of a small quantified formula.
fn wide_formula(services: &Services, n: usize) -> Term {
    let conjunct = "\\forall int y; p(add(y, {i := c}i))";
    let src = vec![conjunct; n].join(" & ");
    parse_term(services, &src).unwrap()
}

fn bench_matching(c: &mut Criterion) {
    let services = services();
    let term = wide_formula(&services, 32);
    let and_pattern = MatchProgram::compile(&parse_term(&services, "phi & psi").unwrap());
    let deep_pattern = MatchProgram::compile(&parse_term(&services, "\\forall x; p(add(x, t))").unwrap());
    let conjunct = term.sub(1).clone();

    c.bench_function("match_top_level_junctor", |b| {
        b.iter(|| and_pattern.run(black_box(&term), MatchConditions::new(), &services))
    });
    c.bench_function("match_under_binder", |b| {
        b.iter(|| deep_pattern.run(black_box(&conjunct), MatchConditions::new(), &services))
    });
    c.bench_function("match_every_position", |b| {
        b.iter(|| {
            term.positions()
                .into_iter()
                .filter(|(_, t)| deep_pattern.run(t, MatchConditions::new(), &services).is_some())
                .count()
        })
    });
}

fn bench_compile(c: &mut Criterion) {
    let services = services();
    let pattern = wide_formula(&services, 8);
    c.bench_function("compile_pattern", |b| b.iter(|| MatchProgram::compile(black_box(&pattern))));
}

criterion_group!(benches, bench_matching, bench_compile);
criterion_main!(benches);
