mod common;

use std::sync::Arc;

use rand::Rng;
use sqlogic::{
    inst::SVInstantiations,
    matching::{MatchConditions, MatchProgram, match_term},
    op::SchemaVariable,
    parser::parse_term,
    term::{PosInTerm, Term},
};

#[test]
fn schema_variables_bind_consistently() {
    let services = common::services();
    let pattern = parse_term(&services, "phi -> t = t").unwrap();

    let hit = parse_term(&services, "q -> add(c, 1) = add(c, 1)").unwrap();
    let found = match_term(&pattern, &hit, &services).unwrap();
    assert_eq!(found.instantiations().term("phi").unwrap().to_string(), "q");
    assert_eq!(found.instantiations().term("t").unwrap().to_string(), "add(c, 1)");

    let miss = parse_term(&services, "q -> c = d").unwrap();
    assert!(match_term(&pattern, &miss, &services).is_none());
}

#[test]
fn bound_variables_match_up_to_renaming() {
    let services = common::services();
    let pattern = parse_term(&services, "\\forall x; p(t)").unwrap();
    let term = parse_term(&services, "\\forall int y; p(add(y, c))").unwrap();
    let found = match_term(&pattern, &term, &services).unwrap();
    assert_eq!(found.instantiations().term("t").unwrap().to_string(), "add(y, c)");

    let body = parse_term(&services, "\\forall int x; \\exists int y; lt(x, y)").unwrap();
    let swapped = parse_term(&services, "\\forall int a; \\exists int b; lt(b, a)").unwrap();
    assert!(match_term(&body, &body, &services).is_some());
    assert!(match_term(&body, &swapped, &services).is_none());
}

#[test]
fn updates_and_programs_are_matched() {
    let services = common::services();
    let pattern = parse_term(&services, "{u}\\modality{#m}{ #v = #se; #slist; }\\endmodality phi").unwrap();
    let term = parse_term(&services, "{i := 1}[{ j = i + 1; skip; i = 0; }] p(j)").unwrap();
    let found = match_term(&pattern, &term, &services).unwrap();
    let inst = found.instantiations();
    assert_eq!(inst.term("u").unwrap().to_string(), "i := 1");
    assert_eq!(inst.term("phi").unwrap().to_string(), "p(j)");
    assert_eq!(inst.get("#v").unwrap().to_string(), "j");
    assert_eq!(inst.get("#se").unwrap().to_string(), "i + 1");
}

#[test]
fn compiled_programs_are_reusable() {
    let services = common::services();
    let pattern = parse_term(&services, "phi & psi").unwrap();
    let program = MatchProgram::compile(&pattern);
    assert!(!program.is_empty());

    let first = parse_term(&services, "q & p(c)").unwrap();
    let second = parse_term(&services, "p(d) & q").unwrap();
    let a = program.run(&first, MatchConditions::new(), &services).unwrap();
    let b = program.run(&second, MatchConditions::new(), &services).unwrap();
    assert_eq!(a.instantiations().term("psi").unwrap().to_string(), "p(c)");
    assert_eq!(b.instantiations().term("psi").unwrap().to_string(), "q");
    assert_eq!(program.run(&first, MatchConditions::new(), &services), Some(a));
}

#[test]
fn prior_instantiations_constrain_the_match() {
    let services = common::services();
    let pattern = parse_term(&services, "phi & psi").unwrap();
    let term = parse_term(&services, "q & p(c)").unwrap();
    let phi = services.schema_variable("phi").unwrap();
    let q = parse_term(&services, "q").unwrap();
    let pc = parse_term(&services, "p(c)").unwrap();

    let agreeing = SVInstantiations::new()
        .add_term(&phi, q, services.sorts())
        .unwrap();
    let conflicting = SVInstantiations::new()
        .add_term(&phi, pc, services.sorts())
        .unwrap();
    let program = MatchProgram::compile(&pattern);
    assert!(
        program
            .run(&term, MatchConditions::with_instantiations(agreeing), &services)
            .is_some()
    );
    assert!(
        program
            .run(&term, MatchConditions::with_instantiations(conflicting), &services)
            .is_none()
    );
}

/// Replaces closed sub-terms of random formulas by fresh schema variables
/// and expects the matcher to recover exactly the replaced sub-terms.
#[test]
fn random_abstractions_are_recovered() {
    let services = common::services();
    let int = common::int(&services);
    let tf = services.term_factory();
    let tb = services.tb();

    for seed in 0..48 {
        let mut generator = common::TermGen::new(&services, seed);
        let term = generator.formula(5);

        let mut chosen: Vec<PosInTerm> = Vec::new();
        for (pos, sub) in term.positions() {
            let candidate = sub.is_closed() && (sub.is_formula() || sub.sort() == &int);
            if !candidate || chosen.iter().any(|c| c.is_prefix_of(&pos) || pos.is_prefix_of(c)) {
                continue;
            }
            if generator.rng().random_bool(0.3) {
                chosen.push(pos);
            }
        }

        let mut pattern = term.clone();
        let mut expected: Vec<(String, Term)> = Vec::new();
        for (n, pos) in chosen.iter().enumerate() {
            let original = term.subterm(pos.indices()).unwrap().clone();
            let sv: Arc<SchemaVariable> = if original.is_formula() {
                SchemaVariable::formula(format!("phi_{n}"))
            } else {
                SchemaVariable::term(format!("t_{n}"), int.clone())
            };
            pattern = tf.replace_at(&pattern, pos.indices(), tb.sv(&sv).unwrap()).unwrap();
            expected.push((sv.name().to_string(), original));
        }

        let found = match_term(&pattern, &term, &services)
            .unwrap_or_else(|| panic!("seed {seed}: `{pattern}` does not match `{term}`"));
        for (name, original) in &expected {
            assert_eq!(
                found.instantiations().term(name),
                Some(original),
                "seed {seed}: wrong instantiation of {name}"
            );
        }
        assert_eq!(found.instantiations().len(), expected.len());
    }
}
