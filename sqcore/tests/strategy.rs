use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sqcore::{
    prover::{Prover, StepOutcome},
    rules::{RuleDiscovery, Scope},
    settings::{GoalChooserKind, StrategySettings},
    strategy::{GoalView, RuleAppCost, RuleAppQueue, create_strategy},
    tests_utils::{first_order_env, proof_for},
};

// Helpers
fn history(problem: &str, settings: &StrategySettings) -> Vec<(u32, String)> {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, problem);
    Prover::new(settings).unwrap().run(&mut proof).unwrap();
    proof
        .history()
        .iter()
        .map(|id| {
            let node = proof.node(*id).unwrap();
            (id.serial(), node.applied().unwrap().app.rule_name().to_string())
        })
        .collect()
}

const ATOMS: [&str; 4] = ["q", "r", "p(c)", "p(d)"];

fn random_formula(depth: u32, rng: &mut ChaCha8Rng) -> String {
    if depth == 0 {
        return ATOMS[rng.random_range(0..ATOMS.len())].to_string();
    }
    let a = random_formula(depth - 1, rng);
    let b = random_formula(depth - 1, rng);
    match rng.random_range(0..4) {
        0 => format!("({a} & {b})"),
        1 => format!("({a} | {b})"),
        2 => format!("({a} -> {b})"),
        _ => format!("!{a}"),
    }
}

fn random_problem(rng: &mut ChaCha8Rng) -> String {
    let left = random_formula(2, rng);
    let right = random_formula(3, rng);
    format!("{left} ==> {right}")
}

#[test]
fn cheaper_applications_are_applied_first() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "q | r, p(c) & q ==> q & p(c), p(d) -> q");
    let settings = StrategySettings::default();
    let strategy = create_strategy(&settings).unwrap();
    let mut prover = Prover::new(&settings).unwrap();

    for _ in 0..12 {
        // The queue of every open goal, computed from scratch before the step.
        let mut best: Option<RuleAppCost> = None;
        for goal in proof.open_goals() {
            let node = proof.node(goal).unwrap();
            let branch = proof.applied_on_branch(goal).unwrap();
            let view = GoalView {
                node: goal,
                sequent: node.sequent(),
                branch: &branch,
            };
            let discovery = RuleDiscovery::new(proof.rules(), proof.services()).with_local_rules(node.local_rules());
            let queue = RuleAppQueue::fill(strategy.as_ref(), &discovery, &view, proof.services()).unwrap();
            if let Some(cost) = queue.best_cost() {
                best = Some(best.map_or(cost, |b| b.min(cost)));
            }
        }

        let StepOutcome::Applied(info) = prover.step(&mut proof).unwrap() else {
            break;
        };
        let node = proof.node(info.node).unwrap();
        let branch = proof.applied_on_branch(info.node).unwrap();
        let above = &branch[..branch.len() - 1];
        let view = GoalView {
            node: info.node,
            sequent: node.sequent(),
            branch: above,
        };
        let applied = &node.applied().unwrap().app;
        let cost = strategy.cost(applied, &view, proof.services());
        assert_eq!(Some(cost), best, "`{}` was not the cheapest application", info.rule);
    }
    assert!(proof.is_closed());
}

#[test]
fn runs_are_reproducible() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..10 {
        let problem = random_problem(&mut rng);
        for chooser in [GoalChooserKind::Default, GoalChooserKind::DepthFirst] {
            let settings = StrategySettings {
                goal_chooser: chooser,
                max_steps: 200,
                ..StrategySettings::default()
            };
            let first = history(&problem, &settings);
            let second = history(&problem, &settings);
            assert_eq!(first, second, "diverging runs on `{problem}`");
        }
    }
}

#[test]
fn incremental_queues_match_fresh_discovery() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "p(c) & q, r ==> q & r, p(d) | p(c)");
    let settings = StrategySettings::default();
    let strategy = create_strategy(&settings).unwrap();
    let mut prover = Prover::new(&settings).unwrap();

    while let StepOutcome::Applied(info) = prover.step(&mut proof).unwrap() {
        for goal in &info.new_goals {
            let node = proof.node(*goal).unwrap();
            let branch = proof.applied_on_branch(*goal).unwrap();
            let view = GoalView {
                node: *goal,
                sequent: node.sequent(),
                branch: &branch,
            };
            let discovery = RuleDiscovery::new(proof.rules(), proof.services()).with_local_rules(node.local_rules());
            let fresh = discovery.discover(node.sequent(), Scope::All).unwrap();
            let fresh_queued = fresh
                .iter()
                .filter(|a| !strategy.cost(a, &view, proof.services()).is_top())
                .count();
            let derived = prover.agenda(*goal).unwrap();
            assert_eq!(derived.len(), fresh_queued, "queue of {goal} after `{}`", info.rule);
            for entry in derived.iter() {
                assert!(fresh.iter().any(|a| a.same_application(&entry.app)));
            }
        }
    }
    assert!(proof.is_closed());
}

#[test]
fn gamma_instances_are_not_repeated() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "\\forall int x; p(x) ==> p(c) & p(d)");
    let settings = StrategySettings {
        max_steps: 50,
        ..StrategySettings::default()
    };
    let run = Prover::new(&settings).unwrap().run(&mut proof).unwrap();
    assert!(proof.is_closed(), "stopped with {:?}", run.reason);
    assert!(run.steps < 10);
}
