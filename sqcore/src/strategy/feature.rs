//! The feature language of strategies.
//!
//! A [`Feature`] computes a [`RuleAppCost`] for a rule application on a
//! goal. Features are plain data built from a few combinators, so a
//! strategy is a value that can be inspected, composed and tested piece by
//! piece.
use sqlogic::{
    Name,
    sequent::Sequent,
    services::Services,
    term::Term,
};

use super::{cost::RuleAppCost, term_feature::TermFeature};
use crate::{proof::NodeId, rules::RuleApp};

/// What a strategy may look at besides the application itself.
#[derive(Debug, Clone, Copy)]
pub struct GoalView<'a> {
    pub node: NodeId,
    pub sequent: &'a Sequent,
    /// Applications on the branch above the goal, oldest first.
    pub branch: &'a [&'a RuleApp],
}

/// Selects a term of an application for a [`TermFeature`].
#[derive(Debug, Clone)]
pub enum Projection {
    /// The term at the application's position.
    Focus,
    /// The whole formula containing the position.
    FocusFormula,
    /// Term instantiation of the named schema variable.
    Instantiation(Name),
    Sub(Box<Projection>, usize),
}

impl Projection {
    pub fn project(&self, app: &RuleApp) -> Option<Term> {
        match self {
            Projection::Focus => app.pos()?.subterm().ok().cloned(),
            Projection::FocusFormula => Some(app.pos()?.formula().formula().clone()),
            Projection::Instantiation(sv) => app.as_taclet_app()?.instantiations().term(sv).cloned(),
            Projection::Sub(inner, i) => inner.project(app)?.subs().get(*i).cloned(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Feature {
    Const(RuleAppCost),
    Sum(Vec<Feature>),
    Max(Vec<Feature>),
    /// `then` if `cond` is zero, `otherwise` else.
    IfZero {
        cond: Box<Feature>,
        then: Box<Feature>,
        otherwise: Box<Feature>,
    },
    Scale(Box<Feature>, i64),
    /// The feature of the first listed rule set the rule belongs to.
    RuleSetDispatch {
        sets: Vec<(Name, Feature)>,
        default: Box<Feature>,
    },
    /// Zero if the rule belongs to the rule set, `Top` otherwise.
    InRuleSet(Name),
    /// `Top` if the same application was already made on the branch.
    NonDuplicateApp,
    /// A term feature of a projected term; `Top` when the projection is empty.
    Term {
        projection: Projection,
        feature: TermFeature,
    },
}

impl Feature {
    pub fn constant(n: i64) -> Self {
        Feature::Const(RuleAppCost::Number(n))
    }

    pub fn if_zero(cond: Feature, then: Feature, otherwise: Feature) -> Self {
        Feature::IfZero {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn on(projection: Projection, feature: TermFeature) -> Self {
        Feature::Term { projection, feature }
    }

    pub fn compute(&self, app: &RuleApp, goal: &GoalView<'_>, services: &Services) -> RuleAppCost {
        match self {
            Feature::Const(c) => *c,
            Feature::Sum(fs) => fs
                .iter()
                .fold(RuleAppCost::ZERO, |acc, f| acc + f.compute(app, goal, services)),
            Feature::Max(fs) => fs
                .iter()
                .map(|f| f.compute(app, goal, services))
                .max()
                .unwrap_or(RuleAppCost::ZERO),
            Feature::IfZero { cond, then, otherwise } => {
                if cond.compute(app, goal, services) == RuleAppCost::ZERO {
                    then.compute(app, goal, services)
                } else {
                    otherwise.compute(app, goal, services)
                }
            }
            Feature::Scale(f, factor) => f.compute(app, goal, services).scale(*factor),
            Feature::RuleSetDispatch { sets, default } => {
                let rule_sets = app.rule_sets();
                sets.iter()
                    .find(|(set, _)| rule_sets.contains(set))
                    .map_or(default.as_ref(), |(_, f)| f)
                    .compute(app, goal, services)
            }
            Feature::InRuleSet(set) => {
                if app.rule_sets().contains(set) {
                    RuleAppCost::ZERO
                } else {
                    RuleAppCost::Top
                }
            }
            Feature::NonDuplicateApp => {
                if goal.branch.iter().any(|done| done.same_application(app)) {
                    RuleAppCost::Top
                } else {
                    RuleAppCost::ZERO
                }
            }
            Feature::Term { projection, feature } => match projection.project(app) {
                Some(t) => feature.compute(&t),
                None => RuleAppCost::Top,
            },
        }
    }
}
