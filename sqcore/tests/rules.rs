use std::sync::Arc;

use sqcore::{
    proof::{Proof, ProofScript},
    prover::{Prover, StopReason},
    rules::{ExternalVerdictRule, GoalTemplate, RuleApp, RuleBase, Taclet, TruthTableSolver},
    settings::StrategySettings,
    tests_utils::{first_order_env, first_order_loader, proof_for},
};
use sqlogic::{
    parser::{parse_sequent, parse_term},
    sequent::Side,
    services::Services,
};

// Helpers
fn with_truth_table() -> (Services, Arc<RuleBase>) {
    let mut loader = first_order_loader();
    loader
        .load_str(
            "smt.toml",
            r#"
            [[builtins]]
            name = "truthTable"
            solver = "truth_table"
            rule_sets = ["closure"]
            "#,
        )
        .unwrap();
    let loaded = loader.finish();
    (loaded.services, loaded.rules)
}

fn applied_rules(proof: &Proof) -> Vec<String> {
    proof
        .history()
        .iter()
        .map(|id| proof.node(*id).unwrap().applied().unwrap().app.rule_name().to_string())
        .collect()
}

#[test]
fn solver_verdict_closes_in_one_step() {
    let (services, rules) = with_truth_table();
    let mut proof = proof_for(&services, &rules, "q -> r, r -> q ==> (q <-> r) | !q");
    let run = Prover::new(&StrategySettings::default())
        .unwrap()
        .run(&mut proof)
        .unwrap();
    assert_eq!(run.reason, StopReason::Closed);
    assert_eq!(run.steps, 1);
    assert_eq!(applied_rules(&proof), ["truthTable"]);

    // Built-in steps replay by name.
    let replayed = ProofScript::from_proof(&proof)
        .unwrap()
        .replay(rules.clone(), services.for_proof())
        .unwrap();
    assert!(replayed.is_closed());
}

#[test]
fn solver_is_not_offered_on_invalid_goals() {
    let (services, rules) = with_truth_table();
    let proof = proof_for(&services, &rules, "q | r ==> q");
    let apps = proof.applicable_at(proof.root(), None).unwrap();
    assert!(apps.iter().all(|a| a.rule_name().as_str() != "truthTable"));
}

#[test]
fn verdict_rules_can_be_added_in_code() {
    let (services, _) = first_order_env();
    let mut base = RuleBase::new();
    let rule = ExternalVerdictRule::new("tt", Arc::new(TruthTableSolver::with_max_atoms(4))).in_rule_set("closure");
    base.add_builtin(Arc::new(rule)).unwrap();
    let rules = Arc::new(base);

    let mut proof = proof_for(&services, &rules, "q ==> q | r");
    let root = proof.root();
    let app = proof
        .applicable_at(root, None)
        .unwrap()
        .into_iter()
        .find(|a| matches!(a, RuleApp::BuiltIn(_)))
        .unwrap();
    let info = proof.apply(root, app).unwrap();
    assert!(info.closed_goal());
    assert!(proof.is_closed());
}

#[test]
fn assignment_is_executed_symbolically() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "p(j) ==> <{ i = j; }> p(i)");
    let run = Prover::new(&StrategySettings::default())
        .unwrap()
        .run(&mut proof)
        .unwrap();
    assert_eq!(run.reason, StopReason::Closed, "{:?}", applied_rules(&proof));

    let rules_used = applied_rules(&proof);
    assert_eq!(rules_used.first().map(String::as_str), Some("assignment"));
    assert!(rules_used.iter().any(|r| r == "emptyModality"));
    assert!(rules_used.iter().any(|r| r == "applyElementaryOnPV"));
    assert_eq!(rules_used.last().map(String::as_str), Some("close"));
}

#[test]
fn rewrite_taclets_must_agree_on_formulas() {
    let (services, _) = first_order_env();
    let phi = parse_term(&services, "phi").unwrap();
    let t = parse_term(&services, "t").unwrap();
    let err = Taclet::builder("mixed")
        .find_term(phi)
        .goal(GoalTemplate::new().replace_term(t))
        .build()
        .unwrap_err();
    assert!(err.is_invariant_violation());
    assert!(err.to_string().contains("mixed"));
}

#[test]
fn sequent_replacements_need_a_sequent_find() {
    let (services, _) = first_order_env();
    let psi = parse_term(&services, "psi").unwrap();
    let goal = GoalTemplate::new().replace_sequent(parse_sequent(&services, "==> psi").unwrap());
    assert!(Taclet::builder("rewriteToSequent").find_term(psi).goal(goal.clone()).build().is_err());

    let phi = parse_term(&services, "phi").unwrap();
    let taclet = Taclet::builder("swap")
        .find_formula(Side::Succedent, phi)
        .goal(goal)
        .build()
        .unwrap();
    assert!(taclet.kind().is_succedent());
}
