use sqcore::{
    proof::{NodeId, Proof, ProofScript},
    prover::Prover,
    rules::RuleApp,
    settings::StrategySettings,
    tests_utils::{first_order_env, proof_for},
    utils::error::ProofError,
};
use sqlogic::{parser::parse_term, sequent::PosInOccurrence};

// Helpers
fn prove(proof: &mut Proof) {
    Prover::new(&StrategySettings::default())
        .unwrap()
        .run(proof)
        .unwrap();
}

fn rule_at(proof: &Proof, goal: NodeId, rule: &str) -> RuleApp {
    let node = proof.node(goal).unwrap();
    for (side, index, f) in node.sequent().iter() {
        let pos = PosInOccurrence::top_level(side, index, f.clone());
        let apps = proof.applicable_at(goal, Some(pos)).unwrap();
        if let Some(app) = apps.into_iter().find(|a| a.rule_name().as_str() == rule) {
            return app;
        }
    }
    panic!("`{rule}` is not applicable on {goal}");
}

fn leaf_sequents(proof: &Proof) -> Vec<String> {
    proof
        .nodes()
        .filter(|n| n.is_leaf())
        .map(|n| n.sequent().to_string())
        .collect()
}

#[test]
fn unproven_problem_survives_save_and_reload() {
    let (services, rules) = first_order_env();
    let proof = proof_for(&services, &rules, "true, false ==> false, false");
    let text = ProofScript::from_proof(&proof).unwrap().to_toml_string().unwrap();

    let script = ProofScript::from_toml_str(&text, "saved.toml").unwrap();
    assert!(script.steps.is_empty());
    let reloaded = script.replay(rules.clone(), services.for_proof()).unwrap();
    let original = proof.node(proof.root()).unwrap().sequent();
    let root = reloaded.node(reloaded.root()).unwrap().sequent();
    assert_eq!(root, original);
    // Duplicate formulas are dropped when a semisequent is built.
    assert_eq!(root.to_string(), "true, false ==> false");
}

#[test]
fn closed_proof_replays_closed() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "true, false ==> false, false");
    prove(&mut proof);
    assert!(proof.is_closed());

    let script = ProofScript::from_proof(&proof).unwrap();
    assert_eq!(script.steps.len(), 1);
    assert_eq!(script.steps[0].rule, "closeFalse");

    let text = script.to_toml_string().unwrap();
    let replayed = ProofScript::from_toml_str(&text, "saved.toml")
        .unwrap()
        .replay(rules.clone(), services.for_proof())
        .unwrap();
    assert!(replayed.is_closed());
    assert_eq!(replayed.history().len(), 1);
}

#[test]
fn skolem_names_are_stable_across_replay() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "==> \\forall int x; (p(x) -> p(x))");
    prove(&mut proof);
    assert!(proof.is_closed());

    let script = ProofScript::from_proof(&proof).unwrap();
    let replayed = script.replay(rules.clone(), services.for_proof()).unwrap();
    assert!(replayed.is_closed());
    assert_eq!(leaf_sequents(&replayed), leaf_sequents(&proof));
}

#[test]
fn interactive_instantiations_are_recorded() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "r -> q, r ==> q");
    let root = proof.root();
    let cut = proof
        .applicable_at(root, None)
        .unwrap()
        .into_iter()
        .find(|a| a.rule_name().as_str() == "cut")
        .unwrap();
    let phi = parse_term(proof.services(), "q").unwrap();
    let app = cut
        .as_taclet_app()
        .unwrap()
        .with_term("phi", phi, proof.services())
        .unwrap();
    proof.apply(root, RuleApp::Taclet(app)).unwrap();
    prove(&mut proof);
    assert!(proof.is_closed());

    let script = ProofScript::from_proof(&proof).unwrap();
    assert_eq!(script.steps[0].rule, "cut");
    assert_eq!(script.steps[0].instantiations.get("phi").map(String::as_str), Some("q"));
    let replayed = script.replay(rules.clone(), services.for_proof()).unwrap();
    assert!(replayed.is_closed());
    assert_eq!(replayed.history().len(), proof.history().len());
}

#[test]
fn scripts_round_trip_through_files() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "p(c) & q ==> q & p(c)");
    prove(&mut proof);
    let script = ProofScript::from_proof(&proof).unwrap();

    let path = std::env::temp_dir()
        .join(format!("sq-scripts-{}", proof.id()))
        .join("proof.toml");
    script.save_to_toml(&path).unwrap();
    let mut loaded = ProofScript::load_from_toml(&path).unwrap();
    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

    assert_eq!(loaded.source, Some(path.display().to_string()));
    assert_eq!(loaded.steps, script.steps);
    assert!(loaded.replay(rules.clone(), services.for_proof()).unwrap().is_closed());

    // Replay errors point at the file, not at the proof name.
    loaded.steps[0].rule = "noSuchRule".into();
    let err = loaded.replay(rules.clone(), services.for_proof()).unwrap_err();
    let ProofError::ProofInput { file, .. } = err else {
        panic!("expected an input error, got {err:?}");
    };
    assert_eq!(file, path.display().to_string());
}

#[test]
fn scripts_replay_after_pruning() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "p(c) ==> p(c) & p(c)");
    let root = proof.root();
    let split = rule_at(&proof, root, "andRight");
    proof.apply(root, split).unwrap();
    proof.prune(root).unwrap();
    let split = rule_at(&proof, root, "andRight");
    let goals = proof.apply(root, split).unwrap().new_goals;
    let close = rule_at(&proof, goals[0], "close");
    proof.apply(goals[0], close).unwrap();

    let script = ProofScript::from_proof(&proof).unwrap();
    let nodes: Vec<u32> = script.steps.iter().map(|s| s.node).collect();
    assert_eq!(nodes, [0, 1]);
    let replayed = script.replay(rules.clone(), services.for_proof()).unwrap();
    assert_eq!(replayed.open_goals().len(), 1);
    assert_eq!(leaf_sequents(&replayed), leaf_sequents(&proof));
}

#[test]
fn pruned_skolem_names_are_reused() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "==> \\forall int x; (p(x) -> p(x))");
    let root = proof.root();
    let all = rule_at(&proof, root, "allRight");
    proof.apply(root, all).unwrap();
    let first = proof.node(root).unwrap().introduced().to_vec();
    assert_eq!(first.len(), 1);

    proof.prune(root).unwrap();
    assert!(proof.services().function(first[0].as_str()).is_none());
    let all = rule_at(&proof, root, "allRight");
    proof.apply(root, all).unwrap();
    assert_eq!(proof.node(root).unwrap().introduced(), first.as_slice());

    prove(&mut proof);
    assert!(proof.is_closed());
    let replayed = ProofScript::from_proof(&proof)
        .unwrap()
        .replay(rules.clone(), services.for_proof())
        .unwrap();
    assert!(replayed.is_closed());
    assert_eq!(leaf_sequents(&replayed), leaf_sequents(&proof));
}

#[test]
fn steps_on_unknown_goals_are_rejected() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "p(c) ==> p(c)");
    prove(&mut proof);
    let mut script = ProofScript::from_proof(&proof).unwrap();
    script.steps[0].node = 7;

    let err = script.replay(rules.clone(), services.for_proof()).unwrap_err();
    let ProofError::ProofInput { item, message, .. } = err else {
        panic!("expected an input error, got {err:?}");
    };
    assert_eq!(item, "step 0 (close)");
    assert!(message.contains("not an open goal"));
}

#[test]
fn malformed_scripts_name_the_file() {
    let err = ProofScript::from_toml_str("name = 3", "broken.toml").unwrap_err();
    let ProofError::ProofInput { file, item, .. } = err else {
        panic!("expected an input error, got {err:?}");
    };
    assert_eq!(file, "broken.toml");
    assert_eq!(item, "script");
}
