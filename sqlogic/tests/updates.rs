mod common;

use sqlogic::{
    parser::{parse_term, parse_update},
    services::Services,
    update::{apply_update_on_rigid, drop_effectless_elementaries, elementary_updates, program_variables},
};

fn drop_effectless(services: &Services, update: &str, target: &str) -> Option<String> {
    let u = parse_update(services, update).unwrap();
    let t = parse_term(services, target).unwrap();
    drop_effectless_elementaries(&u, &t, services)
        .unwrap()
        .map(|r| r.to_string())
}

#[test]
fn relevant_updates_are_kept() {
    let services = common::services();
    assert_eq!(drop_effectless(&services, "i := i", "i = 0"), None);
    assert_eq!(drop_effectless(&services, "i := 1 || j := 2", "i = j"), None);
}

#[test]
fn irrelevant_and_overwritten_updates_are_dropped() {
    let services = common::services();
    assert_eq!(
        drop_effectless(&services, "i := j || j := i", "i = 0").as_deref(),
        Some("{i := j}i = 0")
    );
    assert_eq!(
        drop_effectless(&services, "j := 5 || j := j", "i = 0").as_deref(),
        Some("i = 0")
    );
    assert_eq!(
        drop_effectless(&services, "i := i || i := 0", "i = 0").as_deref(),
        Some("{i := 0}i = 0")
    );
}

#[test]
fn dropping_is_idempotent() {
    let services = common::services();
    let u = parse_update(&services, "i := 1 || j := 2 || i := j").unwrap();
    let t = parse_term(&services, "p(i)").unwrap();
    let once = drop_effectless_elementaries(&u, &t, &services).unwrap().unwrap();
    assert_eq!(once.to_string(), "{i := j}p(i)");
    assert_eq!(
        drop_effectless_elementaries(once.sub(0), once.sub(1), &services).unwrap(),
        None
    );
}

#[test]
fn updates_distribute_over_rigid_operators() {
    let services = common::services();
    let u = parse_update(&services, "i := 1").unwrap();
    let t = parse_term(&services, "p(i) & i = j").unwrap();
    let pushed = apply_update_on_rigid(&u, &t, &services).unwrap().unwrap();
    // One level per application.
    assert_eq!(pushed.to_string(), "({i := 1}p(i)) & {i := 1}i = j");
    let equation = pushed.sub(1);
    let pushed = apply_update_on_rigid(equation.sub(0), equation.sub(1), &services)
        .unwrap()
        .unwrap();
    assert_eq!(pushed.to_string(), "({i := 1}i) = ({i := 1}j)");

    let constant = parse_term(&services, "c").unwrap();
    assert_eq!(apply_update_on_rigid(&u, &constant, &services).unwrap(), Some(constant));

    let pv = parse_term(&services, "i").unwrap();
    assert_eq!(apply_update_on_rigid(&u, &pv, &services).unwrap(), None);
}

#[test]
fn binders_do_not_capture_update_variables() {
    let services = common::services();
    let tb = services.tb();
    let quantified = parse_term(&services, "\\forall int x; {i := x}(i = x)").unwrap();
    let x = quantified.bound_vars()[0].as_logic().unwrap().clone();
    let update = quantified.sub(0).sub(0).clone();
    assert!(update.has_free_var(&x));

    let p = services.function("p").unwrap();
    let target = tb.ex(&x, tb.func(&p, [tb.var(&x).unwrap()]).unwrap()).unwrap();
    let pushed = apply_update_on_rigid(&update, &target, &services).unwrap().unwrap();
    let binder = pushed.bound_vars()[0].as_logic().unwrap();
    assert_ne!(binder, &x);
    assert!(pushed.has_free_var(&x));
    assert!(!pushed.has_free_var(binder));
    assert_eq!(pushed.to_string(), "\\exists int x_0; {i := x}p(x_0)");
}

#[test]
fn update_helpers_see_through_nesting() {
    let services = common::services();
    let u = parse_update(&services, "i := 1 || (j := 2 || \\skip)").unwrap();
    assert_eq!(elementary_updates(&u).unwrap().len(), 2);
    let t = parse_term(&services, "{i := j}<{ i = i + 1; }> p(i)").unwrap();
    let pvs: Vec<String> = program_variables(&t).into_iter().collect();
    assert_eq!(pvs, ["i", "j"]);
}
