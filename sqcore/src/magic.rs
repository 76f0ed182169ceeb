/// Name of the environment variable containing the path to the proof settings file.
/// If not set, defaults to
///  (1) on Linux and macOS: `$XDG_CONFIG_HOME/sq/settings.toml` or `$HOME/.config/sq/settings.toml`
///  (2) on Windows: `%APPDATA%\sq\settings.toml`
pub const ENV_SETTINGS_PATH: &str = "SQ_SETTINGS";

/// Strategy used when the settings do not name one.
pub const DEFAULT_STRATEGY: &str = "first_order";

/// Step budget of an automatic run when the settings do not give one.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Rule sets known to the default strategy, cheapest first.
pub const RULE_SET_CLOSURE: &str = "closure";
pub const RULE_SET_ALPHA: &str = "alpha";
pub const RULE_SET_UPDATE: &str = "update";
pub const RULE_SET_DELTA: &str = "delta";
pub const RULE_SET_SYMEX: &str = "symex";
pub const RULE_SET_BETA: &str = "beta";
pub const RULE_SET_GAMMA: &str = "gamma";

/// Candidate terms tried per schema variable that only a heuristic can instantiate.
pub const MAX_HEURISTIC_CANDIDATES: usize = 8;

/// Truth-table checks give up above this many propositional atoms.
pub const MAX_TRUTH_TABLE_ATOMS: usize = 12;
