use smallvec::SmallVec;

use super::Term;
use crate::op::{BoundVariable, LogicVariable, Operator};

type Renaming = SmallVec<(LogicVariable, LogicVariable), 4>;

impl Term {
    /// Structural equality up to consistent renaming of bound variables.
    ///
    /// `\forall int x; p(x)` and `\forall int y; p(y)` are equal modulo
    /// renaming; free variables must coincide. Labels are compared.
    pub fn equals_mod_renaming(&self, other: &Term) -> bool {
        let mut ctx = Renaming::new();
        eq_mod_renaming(self, other, &mut ctx)
    }

    /// Structural equality disregarding term labels at every level.
    pub fn equals_ignoring_labels(&self, other: &Term) -> bool {
        if self == other {
            return true;
        }
        self.op() == other.op()
            && self.bound_vars() == other.bound_vars()
            && self.arity() == other.arity()
            && self
                .subs()
                .iter()
                .zip(other.subs())
                .all(|(a, b)| a.equals_ignoring_labels(b))
    }
}

fn eq_mod_renaming(a: &Term, b: &Term, ctx: &mut Renaming) -> bool {
    if ctx.is_empty() && a == b {
        return true;
    }
    if a.structural_hash() == b.structural_hash() && a.is_closed() && b.is_closed() && a == b {
        return true;
    }
    if a.arity() != b.arity()
        || a.bound_vars().len() != b.bound_vars().len()
        || a.labels() != b.labels()
    {
        return false;
    }

    match (a.op(), b.op()) {
        (Operator::LogicVariable(x), Operator::LogicVariable(y)) => {
            let left = ctx.iter().rev().find(|(l, _)| l == x);
            let right = ctx.iter().rev().find(|(_, r)| r == y);
            match (left, right) {
                (Some((_, r)), Some((l, _))) => r == y && l == x,
                (None, None) => x == y,
                _ => false,
            }
        }
        (oa, ob) if oa != ob => false,
        _ => {
            let scope = a.binding_scope();
            let mut pushed = 0;
            for (ba, bb) in a.bound_vars().iter().zip(b.bound_vars()) {
                match (ba, bb) {
                    (BoundVariable::Logic(x), BoundVariable::Logic(y)) => {
                        if x.sort() != y.sort() {
                            ctx.truncate(ctx.len() - pushed);
                            return false;
                        }
                        ctx.push((x.clone(), y.clone()));
                        pushed += 1;
                    }
                    (x, y) if x == y => {}
                    _ => {
                        ctx.truncate(ctx.len() - pushed);
                        return false;
                    }
                }
            }

            let mut result = true;
            for i in 0..a.arity() {
                let ok = if Some(i) == scope || pushed == 0 {
                    eq_mod_renaming(a.sub(i), b.sub(i), ctx)
                } else {
                    // Sub-terms outside the binder's scope see the outer renaming only.
                    let inner: Renaming = ctx.drain(ctx.len() - pushed..).collect();
                    let ok = eq_mod_renaming(a.sub(i), b.sub(i), ctx);
                    ctx.extend(inner);
                    ok
                };
                if !ok {
                    result = false;
                    break;
                }
            }
            ctx.truncate(ctx.len() - pushed);
            result
        }
    }
}
