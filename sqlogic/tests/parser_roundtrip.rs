mod common;

use sqlogic::{
    Error,
    parser::{parse_formula, parse_program, parse_sequent, parse_term, parse_update},
    pretty::PrettyPrint,
    services::Services,
};

fn roundtrip(services: &Services, src: &str) -> String {
    let term = parse_term(services, src).unwrap();
    let printed = term.to_string();
    let reparsed = parse_term(services, &printed).unwrap();
    assert!(
        term.equals_mod_renaming(&reparsed),
        "`{src}` printed as `{printed}` reads back differently"
    );
    printed
}

#[test]
fn formulas_print_canonically() {
    let services = common::services();
    assert_eq!(roundtrip(&services, "p(c) & q -> !q | p(add(c, 1))"), "p(c) & q -> !q | p(add(c, 1))");
    assert_eq!(roundtrip(&services, "((q & q)) & (q)"), "q & q & q");
    assert_eq!(roundtrip(&services, "q & (q & q)"), "q & (q & q)");
    assert_eq!(roundtrip(&services, "(q <-> q) <-> q"), "q <-> q <-> q");
    assert_eq!(roundtrip(&services, "c = -1"), "c = -1");
    assert_eq!(
        roundtrip(&services, "\\if (q) \\then (c) \\else (neg(d)) = c"),
        "\\if (q) \\then (c) \\else (neg(d)) = c"
    );
}

#[test]
fn quantifiers_extend_to_the_right() {
    let services = common::services();
    assert_eq!(
        roundtrip(&services, "\\forall int x; p(x) <-> \\exists int y; !p(y)"),
        "(\\forall int x; p(x)) <-> \\exists int y; !p(y)"
    );
    assert_eq!(
        roundtrip(&services, "q & \\forall int x; p(x) & q"),
        "q & (\\forall int x; p(x)) & q"
    );
    assert_eq!(
        roundtrip(&services, "(\\forall int x; p(x)) & q"),
        "(\\forall int x; p(x)) & q"
    );
    assert_eq!(
        roundtrip(&services, "{\\subst int x; add(c, 1)}p(x)"),
        "{\\subst int x; add(c, 1)}p(x)"
    );
}

#[test]
fn updates_and_modalities() {
    let services = common::services();
    assert_eq!(
        roundtrip(&services, "{i := 1 || j := i}(i = j)"),
        "{i := 1 || j := i}i = j"
    );
    assert_eq!(roundtrip(&services, "({i := 1}i) = j"), "({i := 1}i) = j");
    assert_eq!(
        roundtrip(&services, "<{ i = i + 1; if (i > 0) { skip; } else { j = -1; } }> i = j"),
        "<{ i = i + 1; if (i > 0) { skip; } else { j = -1; } }> i = j"
    );
    assert_eq!(
        roundtrip(&services, "[{ while (i < j) { i = i * 2; } }] q"),
        "[{ while (i < j) { i = i * 2; } }] q"
    );
}

#[test]
fn binders_on_the_left_keep_their_scope() {
    let services = common::services();
    for (src, printed) in [
        ("(\\exists int x; p(x)) -> q", "(\\exists int x; p(x)) -> q"),
        ("({\\subst int x; c}p(x)) | q", "({\\subst int x; c}p(x)) | q"),
        ("({i := 1}q) & q", "({i := 1}q) & q"),
        ("([{ skip; }] q) <-> q", "([{ skip; }] q) <-> q"),
        ("!(\\forall int x; p(x)) & q", "!(\\forall int x; p(x)) & q"),
    ] {
        assert_eq!(roundtrip(&services, src), printed);
    }
}

#[test]
fn schema_syntax_reads_back() {
    let services = common::services();
    assert_eq!(roundtrip(&services, "phi & t = s"), "phi & t = s");
    assert_eq!(roundtrip(&services, "{u}\\forall x; phi"), "{u}\\forall x; phi");
    assert_eq!(
        roundtrip(&services, "\\modality{#m}{ #v = #se; #slist; }\\endmodality phi"),
        "\\modality{#m}{ #v = #se; #slist; }\\endmodality phi"
    );
    assert_eq!(roundtrip(&services, "c<<origin>> = d"), "c<<origin>> = d");
}

#[test]
fn update_syntax_on_its_own() {
    let services = common::services();
    let u = parse_update(&services, "i := 1 || j := 2 || \\skip").unwrap();
    assert_eq!(u.to_string(), "i := 1 || j := 2 || \\skip");
    assert!(parse_update(&services, "q").is_err());
}

#[test]
fn formulas_are_checked_for_sort() {
    let services = common::services();
    assert!(parse_formula(&services, "p(c)").is_ok());
    assert!(parse_formula(&services, "add(c, d)").is_err());
    assert!(parse_term(&services, "p(q)").is_err());
}

#[test]
fn sequents_drop_duplicate_formulas() {
    let services = common::services();
    let seq = parse_sequent(&services, "q, p(c), q ==> p(d)").unwrap();
    assert_eq!(seq.antecedent().len(), 2);
    assert_eq!(seq.succedent().len(), 1);
    assert_eq!(seq.to_string(), "q, p(c) ==> p(d)");
    let empty = parse_sequent(&services, "==>").unwrap();
    assert!(empty.is_empty());
}

#[test]
fn programs_print_as_blocks() {
    let services = common::services();
    let program = parse_program(&services, "i = 1; { j = i; } skip;").unwrap();
    assert_eq!(program.statements().len(), 3);
    assert_eq!(program.pretty_string(80), "{ i = 1; { j = i; } skip; }");
}

#[test]
fn errors_carry_positions() {
    let services = common::services();
    for src in ["p(c", "q &", "c = d = c", "\\forall int x p(x)"] {
        match parse_term(&services, src) {
            Err(Error::Parse { messages }) => assert!(!messages.is_empty(), "{src}"),
            other => panic!("`{src}` should not parse: {other:?}"),
        }
    }
}

#[test]
fn random_formulas_survive_printing() {
    let services = common::services();
    for seed in 0..64 {
        let mut generator = common::TermGen::new(&services, seed);
        let term = generator.formula(5);
        let printed = term.to_string();
        let reparsed = parse_term(&services, &printed)
            .unwrap_or_else(|e| panic!("seed {seed}: `{printed}` does not parse: {e}"));
        assert!(
            term.equals_mod_renaming(&reparsed),
            "seed {seed}: `{printed}` reads back as `{reparsed}`"
        );
    }
}
