use sqcore::{
    loader::RuleLoader,
    rules::ApplicationRestriction,
    settings::{GoalChooserKind, ProofSettings},
    tests_utils::first_order_loader,
    utils::error::ProofError,
};
use sqlogic::services::Services;

// Helpers
fn input_error(err: ProofError) -> (String, String, String) {
    match err {
        ProofError::ProofInput { file, item, message } => (file, item, message),
        other => panic!("expected an input error, got {other:?}"),
    }
}

fn load_extra(text: &str) -> (String, String, String) {
    let mut loader = first_order_loader();
    input_error(loader.load_str("extra.toml", text).unwrap_err())
}

#[test]
fn unknown_sorts_are_named() {
    let (file, item, message) = load_extra(
        r#"
        [[functions]]
        name = "len"
        sort = "nat"
        args = ["int"]
        "#,
    );
    assert_eq!(file, "extra.toml");
    assert_eq!(item, "function len");
    assert!(message.contains("nat"), "{message}");
}

#[test]
fn unparsable_patterns_point_at_their_part() {
    let (_, item, _) = load_extra(
        r#"
        [[taclets]]
        name = "broken"
        find = "==> phi &"
        "#,
    );
    assert_eq!(item, "taclet broken: find");

    let (_, item, _) = load_extra(
        r#"
        [[taclets]]
        name = "brokenGoal"
        find = "==> phi"

        [[taclets.goals]]
        label = "only"
        replacewith = "==> phi |"
        "#,
    );
    assert_eq!(item, "taclet brokenGoal: only");
}

#[test]
fn rule_names_are_unique_across_files() {
    let (_, item, message) = load_extra(
        r#"
        [[taclets]]
        name = "close"
        find = "==> phi"
        assumes = "phi ==>"
        "#,
    );
    assert_eq!(item, "rule close");
    assert!(message.contains("already exists"));
}

#[test]
fn variable_conditions_are_checked() {
    let (_, item, message) = load_extra(
        r#"
        [[taclets]]
        name = "odd"
        find = "{u}phi"
        goals = [{ replacewith = "psi" }]

        [[taclets.varcond]]
        kind = "is_pure"
        args = ["phi"]
        "#,
    );
    assert_eq!(item, "taclet odd");
    assert!(message.contains("is_pure"));

    let (_, _, message) = load_extra(
        r#"
        [[taclets]]
        name = "short"
        find = "{u}phi"
        goals = [{ replacewith = "psi" }]

        [[taclets.varcond]]
        kind = "drop_effectless"
        args = ["u", "phi"]
        "#,
    );
    assert!(message.contains("takes 3 arguments"), "{message}");
}

#[test]
fn inconsistent_taclets_are_input_errors() {
    // A formula find rewritten to a term.
    let (_, item, message) = load_extra(
        r#"
        [[taclets]]
        name = "mixed"
        find = "phi"
        goals = [{ replacewith = "t" }]
        "#,
    );
    assert_eq!(item, "taclet mixed");
    assert!(message.contains("both be formulas"), "{message}");
}

#[test]
fn restrictions_are_read_by_name() {
    let loader = first_order_loader();
    let split = loader.rules().taclet("ifElseSplit").unwrap();
    assert_eq!(
        split.restriction(),
        ApplicationRestriction::SAME_UPDATE_LEVEL | ApplicationRestriction::SUCCEDENT_POLARITY
    );

    let (_, item, message) = load_extra(
        r#"
        [[taclets]]
        name = "picky"
        find = "==> phi"
        restrictions = ["top_level"]
        "#,
    );
    assert_eq!(item, "taclet picky");
    assert!(message.contains("top_level"), "{message}");
}

#[test]
fn syntax_and_unknown_keys_are_rejected() {
    let (_, item, _) = load_extra("[[taclets]\nname = ");
    assert_eq!(item, "syntax");

    let (_, item, message) = load_extra(
        r#"
        [[taclets]]
        name = "typo"
        finds = "==> phi"
        "#,
    );
    assert_eq!(item, "syntax");
    assert!(message.contains("finds"), "{message}");
}

#[test]
fn unknown_solvers_are_rejected() {
    let (_, item, message) = load_extra(
        r#"
        [[builtins]]
        name = "oracle"
        solver = "z4"
        "#,
    );
    assert_eq!(item, "builtin oracle");
    assert!(message.contains("z4"));
}

#[test]
fn problems_are_parsed_against_the_loaded_signature() {
    let mut loader = RuleLoader::new(Services::default());
    loader
        .load_str(
            "problem.toml",
            r#"
            problem = "p(c) ==> p(c)"

            [[sorts]]
            name = "int"

            [[functions]]
            name = "c"
            sort = "int"

            [[predicates]]
            name = "p"
            args = ["int"]
            "#,
        )
        .unwrap();
    assert_eq!(loader.problem().unwrap().to_string(), "p(c) ==> p(c)");
    let loaded = loader.finish();
    assert!(loaded.problem.is_some());
    assert!(loaded.rules.is_empty());
}

#[test]
fn rule_files_load_from_disk() {
    let dir = std::env::temp_dir().join(format!("sq-loader-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("extra.toml");
    std::fs::write(
        &path,
        r#"
        [[taclets]]
        name = "orLeftKeep"
        find = "phi | psi ==>"
        goals = [{ add = "phi ==>" }, { add = "psi ==>" }]
        "#,
    )
    .unwrap();

    let mut loader = first_order_loader();
    let before = loader.rules().len();
    loader.load_file(&path).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();
    assert_eq!(loader.rules().len(), before + 1);
    assert_eq!(loader.rules().taclet("orLeftKeep").unwrap().goals().len(), 2);
}

#[test]
fn settings_survive_a_file_round_trip() {
    let mut settings = ProofSettings::default();
    settings.strategy.max_steps = 77;
    settings.strategy.goal_chooser = GoalChooserKind::DepthFirst;
    settings.strategy.timeout_ms = Some(1500);
    settings.strategy.properties.insert("gamma".into(), "5000".into());
    settings.side_proof_workers = 3;

    let path = std::env::temp_dir()
        .join(format!("sq-settings-{}", std::process::id()))
        .join("settings.toml");
    settings.save_to_toml(&path).unwrap();
    let loaded = ProofSettings::load_from_toml(&path).unwrap();
    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn invalid_settings_name_the_field() {
    let err = ProofSettings::from_toml_str("side_proof_workers = 0\n", "sq.toml").unwrap_err();
    let (file, item, _) = input_error(err);
    assert_eq!(file, "sq.toml");
    assert_eq!(item, "side_proof_workers");

    let err = ProofSettings::from_toml_str("[strategy]\nname = \" \"\n", "sq.toml").unwrap_err();
    assert_eq!(input_error(err).1, "strategy.name");

    let err = ProofSettings::from_toml_str("[strategy]\nmax_steps = \"many\"\n", "sq.toml").unwrap_err();
    assert!(err.is_settings_parse());
}
