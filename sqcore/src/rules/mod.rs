//! Rules and their applications.
//!
//! Role
//! - [`taclet`]: schematic rules and their builder.
//! - [`app`]: staged applications of taclets and built-in rules.
//! - [`discovery`]: the applications available on a goal.
//! - [`executor`]: the sequents of the goals an application produces.
//! - [`varcond`], [`prefix`], [`instantiate`]: checks and grounding used
//!   by the stages above.
//! - [`builtin`]: rules implemented in code and the solver seam.
pub mod app;
pub mod builtin;
pub mod discovery;
pub mod executor;
pub mod index;
pub mod instantiate;
pub mod prefix;
pub mod taclet;
pub mod varcond;

pub use app::{BuiltInRuleApp, RuleApp, TacletApp};
pub use builtin::{BuiltInRule, ExternalVerdictRule, SmtSolver, TruthTableSolver, Verdict};
pub use discovery::{RuleDiscovery, Scope};
pub use executor::{Execution, NewGoal, execute};
pub use index::RuleBase;
pub use taclet::{ApplicationRestriction, GoalTemplate, Replacement, Taclet, TacletBuilder, TacletKind};
pub use varcond::VariableCondition;
