use smallvec::SmallVec;

use super::{Term, TermFactory};
use crate::{
    op::{BoundVariable, LogicVariable, Operator},
    utils::{Error, Result},
};

impl TermFactory {
    /// Same operator, binders and labels as `t` over new sub-terms.
    pub fn with_subs(&self, t: &Term, subs: SmallVec<Term, 2>) -> Result<Term> {
        if subs.iter().zip(t.subs()).all(|(a, b)| a.ptr_eq(b)) {
            return Ok(t.clone());
        }
        self.create(
            t.op().clone(),
            subs,
            t.bound_vars().iter().cloned().collect(),
            t.labels().iter().cloned().collect(),
        )
    }

    /// Replaces free occurrences of `var` in `term` by `replacement`.
    ///
    /// Binders of `term` that would capture a free variable of `replacement`
    /// are renamed to fresh variables first.
    pub fn substitute(&self, term: &Term, var: &LogicVariable, replacement: &Term) -> Result<Term> {
        if !term.has_free_var(var) {
            return Ok(term.clone());
        }
        if term.as_logic_variable() == Some(var) {
            return Ok(replacement.clone());
        }

        let scope = term.binding_scope();
        let mut bound: SmallVec<BoundVariable, 1> = term.bound_vars().iter().cloned().collect();
        let mut subs: SmallVec<Term, 2> = SmallVec::new();
        for (i, sub) in term.subs().iter().enumerate() {
            if Some(i) != scope {
                subs.push(self.substitute(sub, var, replacement)?);
                continue;
            }
            if bound.iter().any(|b| b.as_logic() == Some(var)) {
                subs.push(sub.clone());
                continue;
            }
            let mut sub = sub.clone();
            for b in bound.iter_mut() {
                let BoundVariable::Logic(v) = b else { continue };
                if replacement.has_free_var(v) && sub.has_free_var(var) {
                    let fresh = v.renamed_copy();
                    let fresh_term = self.var(&fresh)?;
                    sub = self.substitute(&sub, v, &fresh_term)?;
                    *b = BoundVariable::Logic(fresh);
                }
            }
            subs.push(self.substitute(&sub, var, replacement)?);
        }
        self.create(
            term.op().clone(),
            subs,
            bound,
            term.labels().iter().cloned().collect(),
        )
    }

    /// Replaces the sub-term at `path` by `new`, rebuilding the spine above it.
    pub fn replace_at(&self, term: &Term, path: &[u16], new: Term) -> Result<Term> {
        let Some((&first, rest)) = path.split_first() else {
            return Ok(new);
        };
        let i = first as usize;
        if i >= term.arity() {
            return Err(Error::InvalidPosition {
                path: format!("{path:?}"),
                term: term.to_string(),
            });
        }
        let replaced = self.replace_at(term.sub(i), rest, new)?;
        let mut subs: SmallVec<Term, 2> = term.subs().iter().cloned().collect();
        subs[i] = replaced;
        self.with_subs(term, subs)
    }

    /// Term consisting of the variable `v`.
    pub fn var(&self, v: &LogicVariable) -> Result<Term> {
        self.create(
            Operator::LogicVariable(v.clone()),
            SmallVec::new(),
            SmallVec::new(),
            SmallVec::new(),
        )
    }
}
