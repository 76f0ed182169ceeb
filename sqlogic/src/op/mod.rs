//! Operators
//!
//! Every term node carries an [`Operator`]. The set of operator kinds is
//! closed: junctors, equality, quantifiers, conditional terms, function
//! symbols (plain and sort-parametric), variables, the update operators,
//! substitutions, modalities and schema variables. Each kind knows its arity,
//! how many variables it binds, its rigidity and the sort of terms it builds.
use std::sync::Arc;

use strum::{Display, EnumIs, EnumIter};

use crate::{
    program::ProgramElement,
    sort::Sort,
    term::Term,
    utils::{Error, Result},
};

mod function;
mod sv;
mod variable;

pub use function::{Function, ParametricFunctionDecl, ParametricFunctionInstance};
pub use sv::{SchemaVariable, SvKind};
pub use variable::{LogicVariable, ProgramVariable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumIs)]
pub enum Junctor {
    #[strum(serialize = "true")]
    True,
    #[strum(serialize = "false")]
    False,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "|")]
    Or,
    #[strum(serialize = "->")]
    Imp,
    #[strum(serialize = "<->")]
    Equiv,
}

impl Junctor {
    pub fn arity(self) -> usize {
        match self {
            Junctor::True | Junctor::False => 0,
            Junctor::Not => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumIs)]
pub enum Quantifier {
    #[strum(serialize = "\\forall")]
    All,
    #[strum(serialize = "\\exists")]
    Ex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum ModalityKind {
    /// Total correctness: the program terminates in a state satisfying the post-condition.
    Diamond,
    /// Partial correctness.
    Box,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum ModalityRef {
    Concrete(ModalityKind),
    Schema(Arc<SchemaVariable>),
}

/// Modal operator together with the program it executes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Modality {
    pub kind: ModalityRef,
    /// Always a [`ProgramElement::Block`].
    pub program: Arc<ProgramElement>,
}

impl Modality {
    pub fn new(kind: ModalityKind, statements: Vec<ProgramElement>) -> Self {
        Self {
            kind: ModalityRef::Concrete(kind),
            program: Arc::new(ProgramElement::Block(statements)),
        }
    }
}

/// Left-hand side of an elementary update `x := t`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum UpdateTarget {
    Variable(ProgramVariable),
    Schema(Arc<SchemaVariable>),
}

/// A variable declared by a binding operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum BoundVariable {
    Logic(LogicVariable),
    Schema(Arc<SchemaVariable>),
}

impl BoundVariable {
    pub fn name(&self) -> &crate::name::Name {
        match self {
            BoundVariable::Logic(v) => v.name(),
            BoundVariable::Schema(sv) => sv.name(),
        }
    }

    pub fn sort(&self) -> &Sort {
        match self {
            BoundVariable::Logic(v) => v.sort(),
            BoundVariable::Schema(sv) => sv.sort(),
        }
    }

    pub fn as_logic(&self) -> Option<&LogicVariable> {
        match self {
            BoundVariable::Logic(v) => Some(v),
            BoundVariable::Schema(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum Operator {
    Junctor(Junctor),
    Equals,
    Quantifier(Quantifier),
    /// `\if (c) \then (a) \else (b)`
    IfThenElse,
    Function(Arc<Function>),
    Parametric(Arc<ParametricFunctionInstance>),
    LogicVariable(LogicVariable),
    ProgramVariable(ProgramVariable),
    ElementaryUpdate(UpdateTarget),
    /// `u1 || u2`; on clashing left-hand sides the right update wins.
    ParallelUpdate,
    SkipUpdate,
    /// `{u} t`, sub-terms `[u, t]`.
    UpdateApplication,
    /// `{\subst x; s} t`, sub-terms `[s, t]`, binds `x` in `t`.
    Substitution,
    Modality(Modality),
    SchemaVariable(Arc<SchemaVariable>),
}

impl Operator {
    pub fn arity(&self) -> usize {
        match self {
            Operator::Junctor(j) => j.arity(),
            Operator::Equals => 2,
            Operator::Quantifier(_) => 1,
            Operator::IfThenElse => 3,
            Operator::Function(f) => f.arity(),
            Operator::Parametric(f) => f.arg_sorts().len(),
            Operator::LogicVariable(_) | Operator::ProgramVariable(_) => 0,
            Operator::ElementaryUpdate(_) => 1,
            Operator::ParallelUpdate => 2,
            Operator::SkipUpdate => 0,
            Operator::UpdateApplication => 2,
            Operator::Substitution => 2,
            Operator::Modality(_) => 1,
            Operator::SchemaVariable(_) => 0,
        }
    }

    /// Number of variables the operator binds, and the sub-term they scope over.
    pub fn binding(&self) -> Option<(usize, usize)> {
        match self {
            Operator::Quantifier(_) => Some((1, 0)),
            Operator::Substitution => Some((1, 1)),
            _ => None,
        }
    }

    pub fn is_rigid(&self) -> bool {
        match self {
            Operator::Function(f) => f.is_rigid(),
            Operator::Parametric(f) => f.is_rigid(),
            Operator::ProgramVariable(_) | Operator::Modality(_) => false,
            Operator::SchemaVariable(sv) => sv.is_rigid(),
            _ => true,
        }
    }

    pub fn as_schema_variable(&self) -> Option<&Arc<SchemaVariable>> {
        match self {
            Operator::SchemaVariable(sv) => Some(sv),
            _ => None,
        }
    }

    /// Readable operator name for diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            Operator::Junctor(j) => j.to_string(),
            Operator::Equals => "=".into(),
            Operator::Quantifier(q) => q.to_string(),
            Operator::IfThenElse => "\\if".into(),
            Operator::Function(f) => f.name().to_string(),
            Operator::Parametric(f) => f.to_string(),
            Operator::LogicVariable(v) => v.name().to_string(),
            Operator::ProgramVariable(v) => v.name().to_string(),
            Operator::ElementaryUpdate(UpdateTarget::Variable(v)) => format!("{}:=", v.name()),
            Operator::ElementaryUpdate(UpdateTarget::Schema(sv)) => format!("{}:=", sv.name()),
            Operator::ParallelUpdate => "||".into(),
            Operator::SkipUpdate => "\\skip".into(),
            Operator::UpdateApplication => "{}".into(),
            Operator::Substitution => "\\subst".into(),
            Operator::Modality(m) => match &m.kind {
                ModalityRef::Concrete(k) => k.to_string(),
                ModalityRef::Schema(sv) => sv.name().to_string(),
            },
            Operator::SchemaVariable(sv) => sv.name().to_string(),
        }
    }

    /// Sort of a term built from this operator and `subs`.
    pub fn sort(&self, subs: &[Term]) -> Sort {
        match self {
            Operator::Junctor(_)
            | Operator::Equals
            | Operator::Quantifier(_)
            | Operator::Modality(_) => Sort::formula(),
            Operator::IfThenElse | Operator::UpdateApplication | Operator::Substitution => subs
                .get(1)
                .map(|t| t.sort().clone())
                .unwrap_or_else(Sort::any),
            Operator::Function(f) => f.sort().clone(),
            Operator::Parametric(f) => f.sort().clone(),
            Operator::LogicVariable(v) => v.sort().clone(),
            Operator::ProgramVariable(v) => v.sort().clone(),
            Operator::ElementaryUpdate(_) | Operator::ParallelUpdate | Operator::SkipUpdate => {
                Sort::update()
            }
            Operator::SchemaVariable(sv) => sv.sort().clone(),
        }
    }

    /// Checks arity, binder count and argument sorts.
    ///
    /// Arguments rooted in a schema variable are only checked for their
    /// category (formula, update, term): their sort is known once the
    /// pattern is instantiated.
    pub fn validate(&self, subs: &[Term], bound: &[BoundVariable]) -> Result<()> {
        if subs.len() != self.arity() {
            return Err(Error::ArityMismatch {
                op: self.display_name(),
                expected: self.arity(),
                found: subs.len(),
            });
        }
        let expected_binders = self.binding().map_or(0, |(n, _)| n);
        if bound.len() != expected_binders {
            return Err(Error::BoundVariableMismatch {
                op: self.display_name(),
                expected: expected_binders,
                found: bound.len(),
            });
        }

        let check = |index: usize, expected: &Sort| -> Result<()> {
            let sub = &subs[index];
            let found = sub.sort();
            let schematic = sub.op().is_schema_variable() || expected.contains_generic();
            let category_ok = found.is_formula() == expected.is_formula()
                && found.is_update() == expected.is_update();
            if (schematic && category_ok) || found.extends_trans(expected) {
                Ok(())
            } else {
                Err(Error::IllSortedArgument {
                    op: self.display_name(),
                    index,
                    expected: expected.name().clone(),
                    found: found.name().clone(),
                })
            }
        };
        let term_check = |index: usize| -> Result<()> {
            let found = subs[index].sort();
            if found.is_formula() || found.is_update() {
                Err(Error::IllSortedArgument {
                    op: self.display_name(),
                    index,
                    expected: Sort::any().name().clone(),
                    found: found.name().clone(),
                })
            } else {
                Ok(())
            }
        };

        match self {
            Operator::Junctor(_) | Operator::Quantifier(_) | Operator::Modality(_) => {
                (0..subs.len()).try_for_each(|i| check(i, &Sort::formula()))
            }
            Operator::Equals => (0..2).try_for_each(term_check),
            Operator::IfThenElse => {
                check(0, &Sort::formula())?;
                if subs[1].sort().is_formula() {
                    check(2, &Sort::formula())
                } else {
                    term_check(1)?;
                    term_check(2)
                }
            }
            Operator::Function(f) => f
                .arg_sorts()
                .iter()
                .enumerate()
                .try_for_each(|(i, s)| check(i, s)),
            Operator::Parametric(f) => f
                .arg_sorts()
                .iter()
                .enumerate()
                .try_for_each(|(i, s)| check(i, s)),
            Operator::ElementaryUpdate(UpdateTarget::Variable(v)) => check(0, v.sort()),
            Operator::ElementaryUpdate(UpdateTarget::Schema(_)) => term_check(0),
            Operator::ParallelUpdate => (0..2).try_for_each(|i| check(i, &Sort::update())),
            Operator::UpdateApplication => check(0, &Sort::update()),
            Operator::Substitution => term_check(0),
            Operator::LogicVariable(_)
            | Operator::ProgramVariable(_)
            | Operator::SkipUpdate
            | Operator::SchemaVariable(_) => Ok(()),
        }
    }
}
