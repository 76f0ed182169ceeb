use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sqcore::{
    proof::{Node, NodeId, Proof, ProofEvent},
    rules::RuleApp,
    tests_utils::{first_order_env, proof_for},
};
use sqlogic::sequent::{PosInOccurrence, Side};

// Helpers
fn assert_goal_invariant(proof: &Proof) {
    let leaves: Vec<NodeId> = proof
        .nodes()
        .filter(|n| n.is_leaf() && !n.is_closed())
        .map(Node::id)
        .collect();
    assert_eq!(leaves, proof.open_goals());
    assert_eq!(proof.is_closed(), leaves.is_empty());
}

/// Complete applications on `goal`, at every top-level formula and goal-wide.
fn complete_apps(proof: &Proof, goal: NodeId) -> Vec<RuleApp> {
    let node = proof.node(goal).unwrap();
    let mut apps = proof.applicable_at(goal, None).unwrap();
    for (side, index, f) in node.sequent().iter() {
        let pos = PosInOccurrence::top_level(side, index, f.clone());
        apps.extend(proof.applicable_at(goal, Some(pos)).unwrap());
    }
    apps.retain(|a| a.as_taclet_app().is_none_or(|t| t.is_complete()));
    apps
}

fn named(proof: &Proof, goal: NodeId, rule: &str) -> RuleApp {
    complete_apps(proof, goal)
        .into_iter()
        .find(|a| a.rule_name().as_str() == rule)
        .unwrap_or_else(|| panic!("`{rule}` is not applicable on {goal}"))
}

#[test]
fn branching_rule_yields_two_children() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "==> q & r");
    let root = proof.root();
    let info = proof.apply(root, named(&proof, root, "andRight")).unwrap();

    assert_eq!(info.new_goals.len(), 2);
    assert!(proof.goal(root).is_none());
    for child in &info.new_goals {
        let node = proof.node(*child).unwrap();
        assert_eq!(node.parent(), Some(root));
        assert!(proof.goal(*child).is_some());
    }
    assert_eq!(proof.node(root).unwrap().children(), info.new_goals.as_slice());

    let labels: Vec<_> = info
        .new_goals
        .iter()
        .map(|g| proof.node(*g).unwrap().branch_label().map(str::to_string))
        .collect();
    assert_eq!(labels, vec![Some("left".to_string()), Some("right".to_string())]);

    let left = proof.node(info.new_goals[0]).unwrap().sequent();
    assert_eq!(left.to_string(), "==> q");
    assert!(info.events.iter().any(|e| matches!(e, ProofEvent::GoalReplaced { goal, by } if *goal == root && by.len() == 2)));
    assert_goal_invariant(&proof);
}

#[test]
fn random_applications_keep_goals_and_leaves_aligned() {
    let (services, rules) = first_order_env();
    for seed in 0..8u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut proof = proof_for(
            &services,
            &rules,
            "p(c) | q, q -> r ==> (r & p(c)) | !q, \\forall int x; p(x)",
        );
        for _ in 0..25 {
            let goals = proof.open_goals();
            if goals.is_empty() {
                break;
            }
            let goal = goals[rng.random_range(0..goals.len())];
            let apps = complete_apps(&proof, goal);
            if apps.is_empty() {
                continue;
            }
            let app = apps[rng.random_range(0..apps.len())].clone();
            proof.apply(goal, app).unwrap();
            assert_goal_invariant(&proof);
        }

        // Pruning anywhere keeps the invariant as well.
        let inner: Vec<NodeId> = proof.nodes().filter(|n| !n.is_leaf()).map(Node::id).collect();
        if let Some(&node) = inner.get(rng.random_range(0..inner.len().max(1))) {
            proof.prune(node).unwrap();
            assert!(proof.goal(node).is_some());
            assert_goal_invariant(&proof);
        }
    }
}

#[test]
fn prune_of_a_goal_is_a_no_op() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "==> q & r");
    let removed = proof.prune(proof.root()).unwrap();
    assert!(removed.is_empty());
    assert_eq!(proof.open_goals(), vec![proof.root()]);
}

#[test]
fn unknown_nodes_are_invariant_violations() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "==> q");
    let bogus = NodeId::from_serial(42);
    assert!(proof.node(bogus).unwrap_err().is_invariant_violation());
    assert!(proof.set_automatic(bogus, false).unwrap_err().is_invariant_violation());
}

#[test]
fn interactive_cut_needs_its_formula() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "==> q");
    let root = proof.root();
    let cut = proof
        .applicable_at(root, None)
        .unwrap()
        .into_iter()
        .find(|a| a.rule_name().as_str() == "cut")
        .unwrap();
    let app = cut.as_taclet_app().unwrap();
    assert!(!app.is_complete());
    let missing: Vec<String> = app.missing().iter().map(|sv| sv.name().to_string()).collect();
    assert_eq!(missing, vec!["phi".to_string()]);

    let r = sqlogic::parser::parse_term(proof.services(), "r").unwrap();
    let app = app.with_term("phi", r, proof.services()).unwrap();
    let info = proof.apply(root, RuleApp::Taclet(app)).unwrap();
    assert_eq!(info.new_goals.len(), 2);
    let sequents: Vec<String> = info
        .new_goals
        .iter()
        .map(|g| proof.node(*g).unwrap().sequent().to_string())
        .collect();
    assert_eq!(sequents, vec!["r ==> q".to_string(), "==> q, r".to_string()]);
    let (side, _, _) = proof.node(info.new_goals[1]).unwrap().sequent().iter().last().unwrap();
    assert_eq!(side, Side::Succedent);
}
