//! Terms
//!
//! Role
//! - Immutable, structurally shared syntax trees over [`Operator`]s.
//! - Cached per node: structural hash, depth, sort, rigidity, free logic
//!   variables and whether a modality or schema variable occurs below.
//!
//! Terms compare structurally (`==`). Bound variables are compared by
//! identity, so two separately parsed `\forall int x; p(x)` are different
//! terms; [`Term::equals_mod_renaming`] identifies them.
//!
//! Construction goes through [`TermFactory`], which validates arity and sorts
//! and interns nodes so that repeated sub-terms share one allocation.
//!
//! Performance
//! - Equality short-circuits on pointer identity and on the cached hash,
//!   which makes comparing interned terms O(1) in the common case.
use std::{
    collections::hash_map::DefaultHasher,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use smallvec::SmallVec;

use crate::{
    op::{BoundVariable, LogicVariable, Operator, SchemaVariable},
    sort::Sort,
};

mod builder;
mod equality;
mod factory;
mod label;
mod pos;
mod subst;

pub use builder::TermBuilder;
pub use factory::TermFactory;
pub use label::TermLabel;
pub use pos::PosInTerm;

pub(crate) struct TermData {
    op: Operator,
    subs: SmallVec<Term, 2>,
    bound_vars: SmallVec<BoundVariable, 1>,
    labels: SmallVec<TermLabel, 1>,
    sort: Sort,
    hash: u64,
    depth: u32,
    rigid: bool,
    has_modality: bool,
    has_schema: bool,
    free_vars: SmallVec<LogicVariable, 2>,
}

#[derive(Clone)]
pub struct Term(Arc<TermData>);

impl Term {
    /// Builds a node without validation or interning.
    pub(crate) fn new_unchecked(
        op: Operator,
        subs: SmallVec<Term, 2>,
        bound_vars: SmallVec<BoundVariable, 1>,
        labels: SmallVec<TermLabel, 1>,
    ) -> Term {
        let sort = op.sort(&subs);

        let mut hasher = DefaultHasher::new();
        op.hash(&mut hasher);
        for s in &subs {
            s.0.hash.hash(&mut hasher);
        }
        bound_vars.hash(&mut hasher);
        labels.hash(&mut hasher);
        let hash = hasher.finish();

        let depth = subs.iter().map(|s| s.0.depth + 1).max().unwrap_or(0);
        let rigid = op.is_rigid() && subs.iter().all(|s| s.0.rigid);
        let has_modality = op.is_modality() || subs.iter().any(|s| s.0.has_modality);
        let has_schema = op.is_schema_variable()
            || matches!(&op, Operator::ElementaryUpdate(t) if t.is_schema())
            || matches!(&op, Operator::Modality(m) if m.kind.is_schema() || m.program.contains_schema())
            || bound_vars.iter().any(BoundVariable::is_schema)
            || labels.iter().any(TermLabel::is_schema)
            || subs.iter().any(|s| s.0.has_schema);

        let mut free_vars: SmallVec<LogicVariable, 2> = SmallVec::new();
        if let Operator::LogicVariable(v) = &op {
            free_vars.push(v.clone());
        }
        let scoped = op.binding().map(|(_, scoped)| scoped);
        for (i, s) in subs.iter().enumerate() {
            for v in &s.0.free_vars {
                let is_bound_here = scoped == Some(i)
                    && bound_vars.iter().any(|b| b.as_logic() == Some(v));
                if !is_bound_here && !free_vars.contains(v) {
                    free_vars.push(v.clone());
                }
            }
        }

        Term(Arc::new(TermData {
            op,
            subs,
            bound_vars,
            labels,
            sort,
            hash,
            depth,
            rigid,
            has_modality,
            has_schema,
            free_vars,
        }))
    }

    #[inline]
    pub fn op(&self) -> &Operator {
        &self.0.op
    }

    #[inline]
    pub fn sub(&self, i: usize) -> &Term {
        &self.0.subs[i]
    }

    #[inline]
    pub fn subs(&self) -> &[Term] {
        &self.0.subs
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.0.subs.len()
    }

    pub fn bound_vars(&self) -> &[BoundVariable] {
        &self.0.bound_vars
    }

    pub fn labels(&self) -> &[TermLabel] {
        &self.0.labels
    }

    pub fn has_labels(&self) -> bool {
        !self.0.labels.is_empty()
    }

    #[inline]
    pub fn sort(&self) -> &Sort {
        &self.0.sort
    }

    pub fn is_formula(&self) -> bool {
        self.0.sort.is_formula()
    }

    pub fn depth(&self) -> u32 {
        self.0.depth
    }

    /// Whether the term evaluates identically in every program state.
    pub fn is_rigid(&self) -> bool {
        self.0.rigid
    }

    pub fn contains_modality(&self) -> bool {
        self.0.has_modality
    }

    /// Whether a schema variable occurs anywhere in the term (it is a pattern).
    pub fn contains_schema_variables(&self) -> bool {
        self.0.has_schema
    }

    pub fn free_vars(&self) -> &[LogicVariable] {
        &self.0.free_vars
    }

    pub fn has_free_var(&self, v: &LogicVariable) -> bool {
        self.0.free_vars.contains(v)
    }

    pub fn is_closed(&self) -> bool {
        self.0.free_vars.is_empty()
    }

    pub fn structural_hash(&self) -> u64 {
        self.0.hash
    }

    pub fn ptr_eq(&self, other: &Term) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Schema variable at the root, if any.
    pub fn as_schema_variable(&self) -> Option<&Arc<SchemaVariable>> {
        self.0.op.as_schema_variable()
    }

    /// Logic variable at the root, if the term is a variable occurrence.
    pub fn as_logic_variable(&self) -> Option<&LogicVariable> {
        match &self.0.op {
            Operator::LogicVariable(v) => Some(v),
            _ => None,
        }
    }

    /// Index of the sub-term the bound variables scope over.
    pub fn binding_scope(&self) -> Option<usize> {
        self.0.op.binding().map(|(_, s)| s)
    }

    /// Sub-term reached by following `path` from this term.
    pub fn subterm(&self, path: &[u16]) -> Option<&Term> {
        let mut current = self;
        for &i in path {
            current = current.0.subs.get(i as usize)?;
        }
        Some(current)
    }

    /// Every sub-term with its position, in pre-order.
    pub fn positions(&self) -> Vec<(PosInTerm, &Term)> {
        let mut out = Vec::new();
        let mut stack: SmallVec<(PosInTerm, &Term), 16> = SmallVec::new();
        stack.push((PosInTerm::top(), self));
        while let Some((pos, t)) = stack.pop() {
            for (i, s) in t.subs().iter().enumerate().rev() {
                stack.push((pos.down(i), s));
            }
            out.push((pos, t));
        }
        out
    }

    /// Schema variables occurring in the term (including binders, update
    /// targets, modalities, programs and labels), each listed once in order
    /// of first occurrence.
    pub fn schema_variables(&self) -> Vec<Arc<SchemaVariable>> {
        let mut out: Vec<Arc<SchemaVariable>> = Vec::new();
        let mut push = |sv: &Arc<SchemaVariable>| {
            if !out.contains(sv) {
                out.push(sv.clone());
            }
        };
        for (_, t) in self.positions() {
            if !t.contains_schema_variables() {
                continue;
            }
            match t.op() {
                Operator::SchemaVariable(sv) => push(sv),
                Operator::ElementaryUpdate(crate::op::UpdateTarget::Schema(sv)) => push(sv),
                Operator::Modality(m) => {
                    if let crate::op::ModalityRef::Schema(sv) = &m.kind {
                        push(sv);
                    }
                    let mut stack = vec![m.program.as_ref()];
                    while let Some(p) = stack.pop() {
                        if let crate::program::ProgramElement::Schema(sv) = p {
                            push(sv);
                        }
                        let mut children = p.children();
                        children.reverse();
                        stack.extend(children);
                    }
                }
                _ => {}
            }
            for b in t.bound_vars() {
                if let BoundVariable::Schema(sv) = b {
                    push(sv);
                }
            }
            for l in t.labels() {
                if let TermLabel::Schema(sv) = l {
                    push(sv);
                }
            }
        }
        out
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let (a, b) = (&*self.0, &*other.0);
        a.hash == b.hash
            && a.op == b.op
            && a.subs == b.subs
            && a.bound_vars == b.bound_vars
            && a.labels == b.labels
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
