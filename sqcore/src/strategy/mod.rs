//! Cost-guided rule selection.
//!
//! A [`Strategy`] maps a rule application on a goal to a [`RuleAppCost`].
//! The prover applies the cheapest queued application of the goal picked by
//! a [`GoalChooser`]; `Top` applications are never applied automatically.
//!
//! Strategies are registered by name through [`register_strategy!`] and
//! instantiated from [`StrategySettings`] with [`create_strategy`].
use sqlogic::{Name, services::Services};

use crate::{
    magic::{
        RULE_SET_ALPHA, RULE_SET_BETA, RULE_SET_CLOSURE, RULE_SET_DELTA, RULE_SET_GAMMA, RULE_SET_SYMEX,
        RULE_SET_UPDATE,
    },
    rules::RuleApp,
    settings::StrategySettings,
    utils::error::{ProofError, ProofResult},
};

pub mod chooser;
pub mod cost;
pub mod feature;
pub mod queue;
pub mod term_feature;

pub use chooser::{DefaultGoalChooser, DepthFirstGoalChooser, GoalChooser, goal_chooser};
pub use cost::RuleAppCost;
pub use feature::{Feature, GoalView, Projection};
pub use queue::{RuleAppContainer, RuleAppQueue};
pub use term_feature::{OpClass, TermFeature};

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn cost(&self, app: &RuleApp, goal: &GoalView<'_>, services: &Services) -> RuleAppCost;
}

/// A strategy given by a single feature.
#[derive(Debug, Clone)]
pub struct FeatureStrategy {
    name: String,
    feature: Feature,
}

impl FeatureStrategy {
    pub fn new(name: impl Into<String>, feature: Feature) -> Self {
        Self {
            name: name.into(),
            feature,
        }
    }

    pub fn feature(&self) -> &Feature {
        &self.feature
    }
}

impl Strategy for FeatureStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost(&self, app: &RuleApp, goal: &GoalView<'_>, services: &Services) -> RuleAppCost {
        self.feature.compute(app, goal, services)
    }
}

/// Factory registered under a strategy name.
pub struct StrategyFactory {
    pub name: &'static str,
    pub create: fn(&StrategySettings) -> ProofResult<Box<dyn Strategy>>,
}
inventory::collect!(StrategyFactory);

#[macro_export]
macro_rules! register_strategy {
    ($name:expr, $create:expr) => {
        $crate::inventory::submit! {
            $crate::strategy::StrategyFactory {
                name: $name,
                create: $create,
            }
        }
    };
}

/// Instantiates the strategy named in `settings`.
pub fn create_strategy(settings: &StrategySettings) -> ProofResult<Box<dyn Strategy>> {
    for factory in inventory::iter::<StrategyFactory> {
        if factory.name == settings.name {
            return (factory.create)(settings);
        }
    }
    Err(ProofError::UnknownStrategy(settings.name.clone()))
}

/// Names of all registered strategies, sorted.
pub fn available_strategies() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = inventory::iter::<StrategyFactory>.into_iter().map(|f| f.name).collect();
    names.sort_unstable();
    names
}

/// The bundled strategy for first-order sequents with updates and programs.
///
/// Costs by rule set, each overridable through an integer property of the
/// same name: closure 0, alpha 100, update 150, delta 200, symex 300,
/// beta 1000, gamma 2000 (non-duplicate only). Rules in no listed set cost
/// `Top` and are left to the user.
pub fn first_order(settings: &StrategySettings) -> ProofResult<Box<dyn Strategy>> {
    let defaults = [
        (RULE_SET_CLOSURE, 0),
        (RULE_SET_ALPHA, 100),
        (RULE_SET_UPDATE, 150),
        (RULE_SET_DELTA, 200),
        (RULE_SET_SYMEX, 300),
        (RULE_SET_BETA, 1000),
        (RULE_SET_GAMMA, 2000),
    ];
    let mut sets = Vec::with_capacity(defaults.len());
    for (set, cost) in defaults {
        let cost = Feature::constant(settings.int_property(set, cost)?);
        let feature = if set == RULE_SET_GAMMA {
            Feature::Sum(vec![cost, Feature::NonDuplicateApp])
        } else {
            cost
        };
        sets.push((Name::new(set), feature));
    }
    let feature = Feature::RuleSetDispatch {
        sets,
        default: Box::new(Feature::Const(RuleAppCost::Top)),
    };
    Ok(Box::new(FeatureStrategy::new(crate::magic::DEFAULT_STRATEGY, feature)))
}

register_strategy!(crate::magic::DEFAULT_STRATEGY, first_order);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_first_order() {
        assert!(available_strategies().contains(&"first_order"));
        let s = create_strategy(&StrategySettings::default()).unwrap();
        assert_eq!(s.name(), "first_order");
        let unknown = StrategySettings {
            name: "nonexistent".into(),
            ..StrategySettings::default()
        };
        assert!(create_strategy(&unknown).err().unwrap().is_unknown_strategy());
    }

    #[test]
    fn properties_override_costs() {
        let mut settings = StrategySettings::default();
        settings.properties.insert("beta".into(), "50".into());
        assert!(first_order(&settings).is_ok());
        settings.properties.insert("beta".into(), "cheap".into());
        assert!(first_order(&settings).err().unwrap().is_proof_input());
    }
}
