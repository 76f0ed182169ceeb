//! Structural predicates and measures over terms.
//!
//! Predicates answer [`RuleAppCost::ZERO`] when they hold and
//! [`RuleAppCost::Top`] otherwise, so they compose with the feature
//! combinators (`IfZero` in particular).
use sqlogic::{
    op::{Junctor, Operator},
    term::Term,
};
use strum::{Display, EnumIs};

use super::cost::RuleAppCost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum OpClass {
    Junctor,
    Equality,
    Quantifier,
    IfThenElse,
    Function,
    LogicVariable,
    ProgramVariable,
    Update,
    UpdateApplication,
    Substitution,
    Modality,
    SchemaVariable,
}

impl OpClass {
    pub fn of(op: &Operator) -> OpClass {
        match op {
            Operator::Junctor(_) => OpClass::Junctor,
            Operator::Equals => OpClass::Equality,
            Operator::Quantifier(_) => OpClass::Quantifier,
            Operator::IfThenElse => OpClass::IfThenElse,
            Operator::Function(_) | Operator::Parametric(_) => OpClass::Function,
            Operator::LogicVariable(_) => OpClass::LogicVariable,
            Operator::ProgramVariable(_) => OpClass::ProgramVariable,
            Operator::ElementaryUpdate(_) | Operator::ParallelUpdate | Operator::SkipUpdate => OpClass::Update,
            Operator::UpdateApplication => OpClass::UpdateApplication,
            Operator::Substitution => OpClass::Substitution,
            Operator::Modality(_) => OpClass::Modality,
            Operator::SchemaVariable(_) => OpClass::SchemaVariable,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TermFeature {
    Const(RuleAppCost),
    OperatorIs(OpClass),
    JunctorIs(Junctor),
    /// A formula without junctors (other than `true`/`false`) or quantifiers at the top.
    Atom,
    /// An atom or a negated atom.
    Literal,
    /// A disjunction of literals.
    Clause,
    ContainsModality,
    Rigid,
    /// The feature applied to the `i`-th sub-term; `Top` if there is none.
    Sub(usize, Box<TermFeature>),
    /// Holds when the feature holds for the term and all its sub-terms.
    RecursiveAll(Box<TermFeature>),
    Not(Box<TermFeature>),
    And(Vec<TermFeature>),
    Or(Vec<TermFeature>),
    /// Depth of the term as a cost.
    Depth,
}

fn holds(b: bool) -> RuleAppCost {
    if b { RuleAppCost::ZERO } else { RuleAppCost::Top }
}

fn is_atom(t: &Term) -> bool {
    if !t.is_formula() {
        return false;
    }
    match t.op() {
        Operator::Junctor(j) => matches!(j, Junctor::True | Junctor::False),
        Operator::Quantifier(_) => false,
        _ => true,
    }
}

fn is_literal(t: &Term) -> bool {
    match t.op() {
        Operator::Junctor(Junctor::Not) => is_atom(t.sub(0)),
        _ => is_atom(t),
    }
}

fn is_clause(t: &Term) -> bool {
    match t.op() {
        Operator::Junctor(Junctor::Or) => is_clause(t.sub(0)) && is_clause(t.sub(1)),
        _ => is_literal(t),
    }
}

impl TermFeature {
    pub fn compute(&self, t: &Term) -> RuleAppCost {
        match self {
            TermFeature::Const(c) => *c,
            TermFeature::OperatorIs(class) => holds(OpClass::of(t.op()) == *class),
            TermFeature::JunctorIs(j) => holds(matches!(t.op(), Operator::Junctor(k) if k == j)),
            TermFeature::Atom => holds(is_atom(t)),
            TermFeature::Literal => holds(is_literal(t)),
            TermFeature::Clause => holds(is_clause(t)),
            TermFeature::ContainsModality => holds(t.contains_modality()),
            TermFeature::Rigid => holds(t.is_rigid()),
            TermFeature::Sub(i, f) => match t.subs().get(*i) {
                Some(s) => f.compute(s),
                None => RuleAppCost::Top,
            },
            TermFeature::RecursiveAll(f) => {
                holds(t.positions().into_iter().all(|(_, s)| f.compute(s) == RuleAppCost::ZERO))
            }
            TermFeature::Not(f) => holds(f.compute(t) != RuleAppCost::ZERO),
            TermFeature::And(fs) => fs.iter().fold(RuleAppCost::ZERO, |acc, f| acc + f.compute(t)),
            TermFeature::Or(fs) => fs.iter().map(|f| f.compute(t)).min().unwrap_or(RuleAppCost::Top),
            TermFeature::Depth => RuleAppCost::Number(i64::from(t.depth())),
        }
    }

    pub fn sub(i: usize, f: TermFeature) -> Self {
        TermFeature::Sub(i, Box::new(f))
    }

    pub fn not(f: TermFeature) -> Self {
        TermFeature::Not(Box::new(f))
    }

    pub fn recursive_all(f: TermFeature) -> Self {
        TermFeature::RecursiveAll(Box::new(f))
    }
}

#[cfg(test)]
mod tests {
    use sqlogic::parser::parse_term;

    use super::*;
    use crate::tests_utils::first_order_env;

    #[test]
    fn clause_shapes() {
        let (services, _) = first_order_env();
        let t = |s: &str| parse_term(&services, s).unwrap();
        assert_eq!(TermFeature::Clause.compute(&t("p(c) | !q | r")), RuleAppCost::ZERO);
        assert_eq!(TermFeature::Clause.compute(&t("p(c) | (q & r)")), RuleAppCost::Top);
        assert_eq!(TermFeature::Literal.compute(&t("!p(c)")), RuleAppCost::ZERO);
        assert_eq!(TermFeature::Literal.compute(&t("!!q")), RuleAppCost::Top);
        assert_eq!(TermFeature::Atom.compute(&t("\\forall int x; p(x)")), RuleAppCost::Top);
        assert_eq!(TermFeature::Atom.compute(&t("c = d")), RuleAppCost::ZERO);
    }

    #[test]
    fn combinators() {
        let (services, _) = first_order_env();
        let t = parse_term(&services, "q & p(add(c, d))").unwrap();
        let left_atom = TermFeature::sub(0, TermFeature::Atom);
        assert_eq!(left_atom.compute(&t), RuleAppCost::ZERO);
        assert_eq!(TermFeature::sub(2, TermFeature::Atom).compute(&t), RuleAppCost::Top);
        assert_eq!(TermFeature::not(TermFeature::ContainsModality).compute(&t), RuleAppCost::ZERO);
        assert_eq!(TermFeature::recursive_all(TermFeature::Rigid).compute(&t), RuleAppCost::ZERO);
        let either = TermFeature::Or(vec![TermFeature::Atom, TermFeature::JunctorIs(Junctor::And)]);
        assert_eq!(either.compute(&t), RuleAppCost::ZERO);
        let both = TermFeature::And(vec![TermFeature::Atom, TermFeature::JunctorIs(Junctor::And)]);
        assert_eq!(both.compute(&t), RuleAppCost::Top);
        assert_eq!(TermFeature::Depth.compute(&t), RuleAppCost::Number(i64::from(t.depth())));
    }
}
