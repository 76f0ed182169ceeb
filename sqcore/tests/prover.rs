use sqcore::{
    prover::{
        Prover, StopReason,
        side::{SideProofJob, run_side_proofs},
    },
    settings::{ProofSettings, StrategySettings},
    tests_utils::{first_order_env, proof_for},
};

#[test]
fn zero_timeout_stops_before_the_first_step() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "p(c) ==> p(c)");
    let settings = StrategySettings {
        timeout_ms: Some(0),
        ..StrategySettings::default()
    };
    let run = Prover::new(&settings).unwrap().run(&mut proof).unwrap();
    assert_eq!(run.reason, StopReason::Timeout);
    assert_eq!(run.steps, 0);
    assert_eq!(run.open_goals, 1);
}

#[test]
fn first_stuck_goal_ends_the_run_when_asked() {
    let problem = "==> (q -> q) & r";
    let (services, rules) = first_order_env();

    let mut eager = proof_for(&services, &rules, problem);
    let settings = StrategySettings {
        stop_at_first_open_goal: true,
        ..StrategySettings::default()
    };
    let run = Prover::new(&settings).unwrap().run(&mut eager).unwrap();
    assert_eq!(run.reason, StopReason::NoApplicableRule);
    assert_eq!(run.steps, 1);
    assert_eq!(run.open_goals, 2);

    // Without the flag the provable branch is still closed.
    let mut patient = proof_for(&services, &rules, problem);
    let run = Prover::new(&StrategySettings::default())
        .unwrap()
        .run(&mut patient)
        .unwrap();
    assert_eq!(run.reason, StopReason::NoApplicableRule);
    assert_eq!(run.open_goals, 1);
    assert_eq!(run.closed_goals, 1);
    let open = patient.open_goals();
    assert_eq!(patient.node(open[0]).unwrap().sequent().to_string(), "==> r");
}

#[test]
fn reset_flag_lets_the_prover_continue() {
    let (services, rules) = first_order_env();
    let mut proof = proof_for(&services, &rules, "q & r ==> r & q");
    let mut prover = Prover::new(&StrategySettings::default()).unwrap();
    let flag = prover.stop_flag();

    flag.stop();
    assert_eq!(prover.run(&mut proof).unwrap().reason, StopReason::Cancelled);
    flag.reset();
    let run = prover.run(&mut proof).unwrap();
    assert_eq!(run.reason, StopReason::Closed);
    assert!(proof.is_closed());
}

#[test]
fn side_proofs_come_back_in_job_order() {
    let (services, rules) = first_order_env();
    let problems = [
        "p(c) ==> p(c)",
        "q & r ==> r & q",
        "==> \\forall int x; (p(x) -> p(x))",
        "q ==> r",
        "q -> r, q ==> r",
    ];
    let jobs = problems
        .iter()
        .enumerate()
        .map(|(i, p)| SideProofJob::new(format!("job{i}"), proof_for(&services, &rules, p)))
        .collect();
    let settings = ProofSettings {
        side_proof_workers: 2,
        ..ProofSettings::default()
    };

    let results = run_side_proofs(jobs, &settings).unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["job0", "job1", "job2", "job3", "job4"]);
    let closed: Vec<bool> = results.iter().map(|r| r.is_closed()).collect();
    assert_eq!(closed, [true, true, true, false, true]);
    let stuck = results[3].outcome.as_ref().unwrap();
    assert_eq!(stuck.reason, StopReason::NoApplicableRule);
}

#[test]
fn side_proofs_report_strategy_errors_per_job() {
    let (services, rules) = first_order_env();
    let jobs = vec![SideProofJob::new("only", proof_for(&services, &rules, "q ==> q"))];
    let mut settings = ProofSettings::default();
    settings.strategy.name = "nonexistent".into();

    let results = run_side_proofs(jobs, &settings).unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].outcome.as_ref().unwrap_err().is_unknown_strategy());
    assert!(!results[0].is_closed());
    assert!(run_side_proofs(Vec::new(), &settings).unwrap().is_empty());
}
