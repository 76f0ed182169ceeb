use std::sync::Arc;

use smallvec::{SmallVec, smallvec};

use super::{Term, TermFactory, TermLabel};
use crate::{
    op::{
        BoundVariable, Function, Junctor, LogicVariable, Modality, ModalityKind, ModalityRef,
        Operator, ParametricFunctionInstance, ProgramVariable, Quantifier, SchemaVariable,
        UpdateTarget,
    },
    program::ProgramElement,
    utils::Result,
};

/// Convenience constructors on top of a [`TermFactory`].
///
/// All constructors validate through the factory, so they fail with the same
/// errors as [`TermFactory::create`].
#[derive(Clone, Copy)]
pub struct TermBuilder<'a> {
    tf: &'a TermFactory,
}

impl<'a> TermBuilder<'a> {
    pub fn new(tf: &'a TermFactory) -> Self {
        Self { tf }
    }

    pub fn factory(&self) -> &'a TermFactory {
        self.tf
    }

    fn node(&self, op: Operator, subs: SmallVec<Term, 2>) -> Result<Term> {
        self.tf.create(op, subs, SmallVec::new(), SmallVec::new())
    }

    fn junctor(&self, j: Junctor, subs: SmallVec<Term, 2>) -> Result<Term> {
        self.node(Operator::Junctor(j), subs)
    }

    pub fn tt(&self) -> Result<Term> {
        self.tf.leaf(Operator::Junctor(Junctor::True))
    }

    pub fn ff(&self) -> Result<Term> {
        self.tf.leaf(Operator::Junctor(Junctor::False))
    }

    pub fn not(&self, t: Term) -> Result<Term> {
        self.junctor(Junctor::Not, smallvec![t])
    }

    pub fn and(&self, a: Term, b: Term) -> Result<Term> {
        self.junctor(Junctor::And, smallvec![a, b])
    }

    pub fn or(&self, a: Term, b: Term) -> Result<Term> {
        self.junctor(Junctor::Or, smallvec![a, b])
    }

    pub fn imp(&self, a: Term, b: Term) -> Result<Term> {
        self.junctor(Junctor::Imp, smallvec![a, b])
    }

    pub fn equiv(&self, a: Term, b: Term) -> Result<Term> {
        self.junctor(Junctor::Equiv, smallvec![a, b])
    }

    /// Left-nested conjunction; `true` for no operands.
    pub fn and_all(&self, terms: impl IntoIterator<Item = Term>) -> Result<Term> {
        let mut it = terms.into_iter();
        match it.next() {
            None => self.tt(),
            Some(first) => it.try_fold(first, |acc, t| self.and(acc, t)),
        }
    }

    /// Left-nested disjunction; `false` for no operands.
    pub fn or_all(&self, terms: impl IntoIterator<Item = Term>) -> Result<Term> {
        let mut it = terms.into_iter();
        match it.next() {
            None => self.ff(),
            Some(first) => it.try_fold(first, |acc, t| self.or(acc, t)),
        }
    }

    pub fn equals(&self, a: Term, b: Term) -> Result<Term> {
        self.node(Operator::Equals, smallvec![a, b])
    }

    pub fn ite(&self, cond: Term, then: Term, otherwise: Term) -> Result<Term> {
        self.node(Operator::IfThenElse, smallvec![cond, then, otherwise])
    }

    pub fn quantify(&self, q: Quantifier, v: BoundVariable, body: Term) -> Result<Term> {
        self.tf.create(
            Operator::Quantifier(q),
            smallvec![body],
            smallvec![v],
            SmallVec::new(),
        )
    }

    pub fn all(&self, v: &LogicVariable, body: Term) -> Result<Term> {
        self.quantify(Quantifier::All, BoundVariable::Logic(v.clone()), body)
    }

    pub fn ex(&self, v: &LogicVariable, body: Term) -> Result<Term> {
        self.quantify(Quantifier::Ex, BoundVariable::Logic(v.clone()), body)
    }

    pub fn func(&self, f: &Arc<Function>, args: impl IntoIterator<Item = Term>) -> Result<Term> {
        self.node(Operator::Function(f.clone()), args.into_iter().collect())
    }

    pub fn parametric(
        &self,
        f: &Arc<ParametricFunctionInstance>,
        args: impl IntoIterator<Item = Term>,
    ) -> Result<Term> {
        self.node(Operator::Parametric(f.clone()), args.into_iter().collect())
    }

    pub fn var(&self, v: &LogicVariable) -> Result<Term> {
        self.tf.var(v)
    }

    pub fn pv(&self, v: &ProgramVariable) -> Result<Term> {
        self.tf.leaf(Operator::ProgramVariable(v.clone()))
    }

    pub fn sv(&self, sv: &Arc<SchemaVariable>) -> Result<Term> {
        self.tf.leaf(Operator::SchemaVariable(sv.clone()))
    }

    pub fn elementary(&self, lhs: &ProgramVariable, value: Term) -> Result<Term> {
        self.node(
            Operator::ElementaryUpdate(UpdateTarget::Variable(lhs.clone())),
            smallvec![value],
        )
    }

    pub fn elementary_sv(&self, lhs: &Arc<SchemaVariable>, value: Term) -> Result<Term> {
        self.node(
            Operator::ElementaryUpdate(UpdateTarget::Schema(lhs.clone())),
            smallvec![value],
        )
    }

    pub fn parallel(&self, a: Term, b: Term) -> Result<Term> {
        self.node(Operator::ParallelUpdate, smallvec![a, b])
    }

    /// Right-nested parallel composition; `\skip` for no updates.
    pub fn parallel_all(&self, updates: impl IntoIterator<Item = Term>) -> Result<Term> {
        let updates: Vec<Term> = updates.into_iter().collect();
        let mut it = updates.into_iter().rev();
        match it.next() {
            None => self.skip(),
            Some(last) => it.try_fold(last, |acc, u| self.parallel(u, acc)),
        }
    }

    pub fn skip(&self) -> Result<Term> {
        self.tf.leaf(Operator::SkipUpdate)
    }

    pub fn apply(&self, update: Term, target: Term) -> Result<Term> {
        self.node(Operator::UpdateApplication, smallvec![update, target])
    }

    pub fn subst(&self, v: BoundVariable, replacement: Term, target: Term) -> Result<Term> {
        self.tf.create(
            Operator::Substitution,
            smallvec![replacement, target],
            smallvec![v],
            SmallVec::new(),
        )
    }

    pub fn modality(
        &self,
        kind: ModalityKind,
        statements: Vec<ProgramElement>,
        post: Term,
    ) -> Result<Term> {
        self.node(
            Operator::Modality(Modality::new(kind, statements)),
            smallvec![post],
        )
    }

    pub fn modality_with(&self, kind: ModalityRef, program: ProgramElement, post: Term) -> Result<Term> {
        let program = match program {
            block @ ProgramElement::Block(_) => block,
            other => ProgramElement::Block(vec![other]),
        };
        self.node(
            Operator::Modality(Modality {
                kind,
                program: Arc::new(program),
            }),
            smallvec![post],
        )
    }

    pub fn labeled(&self, t: &Term, labels: impl IntoIterator<Item = TermLabel>) -> Result<Term> {
        self.tf.relabel(t, labels.into_iter().collect())
    }
}
