//! Update simplification helpers.
//!
//! These back the variable conditions of the update simplification rules:
//! - [`drop_effectless_elementaries`] removes elementary updates of a
//!   parallel update that are overwritten or assign variables the target
//!   never reads;
//! - [`apply_update_on_rigid`] pushes an update into the sub-terms of a
//!   rigid operator.
//!
//! Both answer `None` when they have nothing to do, which makes the rules
//! that use them idempotent.
use std::collections::BTreeSet;

use smallvec::SmallVec;

use crate::{
    op::{BoundVariable, Operator, UpdateTarget},
    program::ProgramElement,
    services::Services,
    term::Term,
    utils::Result,
};

/// Program variables read or written anywhere in `t`, by name.
pub fn program_variables(t: &Term) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for (_, s) in t.positions() {
        match s.op() {
            Operator::ProgramVariable(v) => {
                out.insert(v.name().to_string());
            }
            Operator::ElementaryUpdate(UpdateTarget::Variable(v)) => {
                out.insert(v.name().to_string());
            }
            Operator::Modality(m) => {
                let mut stack = vec![m.program.as_ref()];
                while let Some(p) = stack.pop() {
                    if let ProgramElement::Variable(v) = p {
                        out.insert(v.name().to_string());
                    }
                    stack.extend(p.children());
                }
            }
            _ => {}
        }
    }
    out
}

/// Elementary components of a parallel update, left to right.
///
/// `None` if the update contains anything but elementary, parallel and skip
/// updates (for instance an update application), whose effect is opaque.
pub fn elementary_updates(u: &Term) -> Option<Vec<Term>> {
    let mut out = Vec::new();
    let mut stack = vec![u];
    while let Some(t) = stack.pop() {
        match t.op() {
            Operator::ElementaryUpdate(_) => out.push(t.clone()),
            Operator::ParallelUpdate => {
                stack.push(t.sub(1));
                stack.push(t.sub(0));
            }
            Operator::SkipUpdate => {}
            _ => return None,
        }
    }
    Some(out)
}

/// `{u'} target` where `u'` keeps only the elementary updates of `u` that
/// can affect `target`; `None` if every component of `u` is kept.
pub fn drop_effectless_elementaries(
    update: &Term,
    target: &Term,
    services: &Services,
) -> Result<Option<Term>> {
    let Some(elementaries) = elementary_updates(update) else {
        return Ok(None);
    };
    let relevant = program_variables(target);
    let mut written: BTreeSet<String> = BTreeSet::new();
    let mut kept: Vec<Term> = Vec::new();
    for e in elementaries.iter().rev() {
        let Operator::ElementaryUpdate(UpdateTarget::Variable(v)) = e.op() else {
            return Ok(None);
        };
        let name = v.name().to_string();
        let overwritten = !written.insert(name.clone());
        if !overwritten && relevant.contains(&name) {
            kept.push(e.clone());
        }
    }
    kept.reverse();

    let components = count_components(update);
    if kept.len() == components {
        return Ok(None);
    }
    let tb = services.tb();
    if kept.is_empty() {
        return Ok(Some(target.clone()));
    }
    let u = tb.parallel_all(kept)?;
    Ok(Some(tb.apply(u, target.clone())?))
}

fn count_components(u: &Term) -> usize {
    match u.op() {
        Operator::ParallelUpdate => count_components(u.sub(0)) + count_components(u.sub(1)),
        _ => 1,
    }
}

/// `op({u} t1, ..., {u} tn)` for `target = op(t1, ..., tn)` with a rigid,
/// non-update operator; binders of `target` clashing with free variables of
/// `u` are renamed first. `None` if the operator is not rigid.
pub fn apply_update_on_rigid(update: &Term, target: &Term, services: &Services) -> Result<Option<Term>> {
    let op = target.op();
    let applicable = op.is_rigid()
        && !op.is_update_application()
        && !op.is_elementary_update()
        && !op.is_parallel_update()
        && !op.is_skip_update()
        && !op.is_schema_variable();
    if !applicable {
        return Ok(None);
    }
    if target.arity() == 0 {
        return Ok(Some(target.clone()));
    }

    let tf = services.term_factory();
    let tb = services.tb();
    let scope = target.binding_scope();
    let mut bound: SmallVec<BoundVariable, 1> = target.bound_vars().iter().cloned().collect();
    let mut subs: SmallVec<Term, 2> = target.subs().iter().cloned().collect();

    if let Some(scope) = scope {
        for b in bound.iter_mut() {
            let BoundVariable::Logic(v) = b else { continue };
            if update.has_free_var(v) {
                let fresh = v.renamed_copy();
                subs[scope] = tf.substitute(&subs[scope], v, &tf.var(&fresh)?)?;
                *b = BoundVariable::Logic(fresh);
            }
        }
    }

    let applied = subs
        .into_iter()
        .map(|s| tb.apply(update.clone(), s))
        .collect::<Result<SmallVec<Term, 2>>>()?;
    Ok(Some(tf.create(
        op.clone(),
        applied,
        bound,
        target.labels().iter().cloned().collect(),
    )?))
}
