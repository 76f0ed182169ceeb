use std::{fmt, sync::Arc};

use smallvec::SmallVec;

use super::{MatchConditions, cursor::TermCursor, program::match_program};
use crate::{
    inst::{GenericSortCondition, InstantiationValue},
    op::{
        BoundVariable, LogicVariable, Modality, ModalityRef, Operator, ParametricFunctionInstance,
        SchemaVariable, SvKind, UpdateTarget,
    },
    program::ProgramElement,
    services::Services,
    term::{Term, TermLabel},
};

/// One step of a compiled pattern.
///
/// `Match*` instructions inspect the term under the cursor without moving
/// it; navigation is explicit through [`MatchInstruction::GotoNext`] and
/// [`MatchInstruction::GotoNextSibling`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchInstruction {
    /// Pattern sub-term without schema variables or free variables.
    MatchGround(Term),
    MatchOperator(Operator),
    /// Parametric function of the same family whose sort arguments fit.
    MatchSimilarParametric(Arc<ParametricFunctionInstance>),
    MatchLogicVariable(LogicVariable),
    MatchElementaryUpdate(UpdateTarget),
    MatchModality(Modality),
    MatchSchemaVariable(Arc<SchemaVariable>),
    MatchTermLabels(SmallVec<TermLabel, 1>),
    /// Binders of the parent of the cursor, entered before its scoped sub-term.
    BindVariables(SmallVec<BoundVariable, 1>),
    UnbindVariables(usize),
    GotoNext,
    GotoNextSibling,
}

impl MatchInstruction {
    /// Executes the instruction; `None` is a mismatch.
    pub(crate) fn execute(
        &self,
        cursor: &mut TermCursor<'_>,
        mc: MatchConditions,
        services: &Services,
    ) -> Option<MatchConditions> {
        use MatchInstruction as I;
        match self {
            I::GotoNext => {
                cursor.goto_next();
                Some(mc)
            }
            I::GotoNextSibling => {
                cursor.goto_next_sibling();
                Some(mc)
            }
            I::UnbindVariables(n) => {
                let mut mc = mc;
                let keep = mc.renaming.len().saturating_sub(*n);
                mc.renaming.truncate(keep);
                Some(mc)
            }
            I::BindVariables(pattern) => bind_variables(pattern, cursor.parent()?, mc, services),
            I::MatchGround(t) => {
                let current = cursor.current()?;
                (current == t || current.equals_ignoring_labels(t)).then_some(mc)
            }
            I::MatchOperator(op) => (cursor.current()?.op() == op).then_some(mc),
            I::MatchSimilarParametric(pattern) => {
                let Operator::Parametric(found) = cursor.current()?.op() else {
                    return None;
                };
                match_parametric(pattern, found, mc, services)
            }
            I::MatchLogicVariable(pattern) => {
                let found = cursor.current()?.as_logic_variable()?;
                match mc.renaming.iter().rev().find(|(p, _)| p == pattern) {
                    Some((_, c)) => (c == found).then_some(mc),
                    None => {
                        let captured = mc.renaming.iter().any(|(_, c)| c == found);
                        (!captured && found == pattern).then_some(mc)
                    }
                }
            }
            I::MatchElementaryUpdate(target) => {
                let Operator::ElementaryUpdate(found) = cursor.current()?.op() else {
                    return None;
                };
                match (target, found) {
                    (UpdateTarget::Schema(sv), UpdateTarget::Variable(pv)) => {
                        let value = InstantiationValue::Program(ProgramElement::Variable(pv.clone()));
                        mc.add(sv, value, services)
                    }
                    (a, b) => (a == b).then_some(mc),
                }
            }
            I::MatchModality(pattern) => {
                let Operator::Modality(found) = cursor.current()?.op() else {
                    return None;
                };
                match_modality(pattern, found, mc, services)
            }
            I::MatchSchemaVariable(sv) => match_schema_variable(sv, cursor.current()?, mc, services),
            I::MatchTermLabels(pattern) => match_labels(pattern, cursor.current()?, mc, services),
        }
    }
}

fn bind_variables(
    pattern: &[BoundVariable],
    binder: &Term,
    mut mc: MatchConditions,
    services: &Services,
) -> Option<MatchConditions> {
    let found = binder.bound_vars();
    if found.len() != pattern.len() {
        return None;
    }
    for (p, c) in pattern.iter().zip(found) {
        match (p, c) {
            (BoundVariable::Schema(sv), BoundVariable::Logic(v)) => {
                let t = services.term_factory().var(v).ok()?;
                mc = mc.add(sv, InstantiationValue::Term(t), services)?;
            }
            (BoundVariable::Logic(pv), BoundVariable::Logic(cv)) => {
                if pv.sort() != cv.sort() {
                    return None;
                }
                mc.renaming.push_back((pv.clone(), cv.clone()));
            }
            (a, b) => {
                if a != b {
                    return None;
                }
            }
        }
    }
    Some(mc)
}

/// Pushed logic-variable pairs a [`MatchInstruction::BindVariables`] adds.
pub(crate) fn renaming_pairs(pattern: &[BoundVariable]) -> usize {
    pattern.iter().filter(|b| b.is_logic()).count()
}

fn match_parametric(
    pattern: &ParametricFunctionInstance,
    found: &ParametricFunctionInstance,
    mut mc: MatchConditions,
    services: &Services,
) -> Option<MatchConditions> {
    if !pattern.is_similar(found) {
        return None;
    }
    for (p, c) in pattern.args().iter().zip(found.args()) {
        if !p.contains_generic() {
            if p != c {
                return None;
            }
            continue;
        }
        for cond in GenericSortCondition::collect(p, c, true)? {
            mc.inst = mc.inst.add_generic_condition(cond, services.sorts()).ok()?;
        }
    }
    Some(mc)
}

fn match_modality(
    pattern: &Modality,
    found: &Modality,
    mut mc: MatchConditions,
    services: &Services,
) -> Option<MatchConditions> {
    match (&pattern.kind, &found.kind) {
        (ModalityRef::Schema(sv), ModalityRef::Concrete(k)) => {
            mc = mc.add(sv, InstantiationValue::Modality(*k), services)?;
        }
        (a, b) if a == b => {}
        _ => return None,
    }
    mc.inst = match_program(&pattern.program, &found.program, mc.inst, services.sorts())?;
    Some(mc)
}

fn match_schema_variable(
    sv: &Arc<SchemaVariable>,
    current: &Term,
    mc: MatchConditions,
    services: &Services,
) -> Option<MatchConditions> {
    match sv.kind() {
        SvKind::ProgramVariable => {
            let Operator::ProgramVariable(pv) = current.op() else {
                return None;
            };
            let value = InstantiationValue::Program(ProgramElement::Variable(pv.clone()));
            mc.add(sv, value, services)
        }
        SvKind::Expression => {
            // Only instantiated expressions can be compared in term position.
            let InstantiationValue::Program(e) = mc.inst.get(sv.name().as_str())? else {
                return None;
            };
            let t = if sv.sort().is_formula() {
                services.program_to_formula(e)
            } else {
                services.program_to_term(e)
            };
            (t.ok()? == *current).then_some(mc)
        }
        SvKind::Statement | SvKind::StatementList | SvKind::Modality(_) | SvKind::Label => None,
        SvKind::Formula | SvKind::Term { .. } | SvKind::Variable | SvKind::Skolem | SvKind::Update => {
            mc.add(sv, InstantiationValue::Term(current.clone()), services)
        }
    }
}

fn match_labels(
    pattern: &[TermLabel],
    current: &Term,
    mut mc: MatchConditions,
    services: &Services,
) -> Option<MatchConditions> {
    let mut remaining: SmallVec<TermLabel, 1> = current.labels().iter().cloned().collect();
    let mut label_sv = None;
    for p in pattern {
        match p {
            TermLabel::Schema(sv) => label_sv = Some(sv),
            named => {
                let i = remaining.iter().position(|l| l == named)?;
                remaining.remove(i);
            }
        }
    }
    if let Some(sv) = label_sv {
        mc = mc.add(sv, InstantiationValue::Labels(remaining), services)?;
    }
    Some(mc)
}

impl fmt::Display for MatchInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MatchInstruction as I;
        match self {
            I::MatchGround(t) => write!(f, "ground {t}"),
            I::MatchOperator(op) => write!(f, "op {}", op.display_name()),
            I::MatchSimilarParametric(p) => write!(f, "similar {p}"),
            I::MatchLogicVariable(v) => write!(f, "lvar {}", v.name()),
            I::MatchElementaryUpdate(UpdateTarget::Variable(v)) => write!(f, "elem {v}"),
            I::MatchElementaryUpdate(UpdateTarget::Schema(sv)) => write!(f, "elem {sv}"),
            I::MatchModality(m) => write!(f, "modality {}", Operator::Modality(m.clone()).display_name()),
            I::MatchSchemaVariable(sv) => write!(f, "sv {sv}"),
            I::MatchTermLabels(ls) => write!(f, "labels {}", ls.len()),
            I::BindVariables(bs) => {
                write!(f, "bind")?;
                for b in bs {
                    write!(f, " {}", b.name())?;
                }
                Ok(())
            }
            I::UnbindVariables(n) => write!(f, "unbind {n}"),
            I::GotoNext => write!(f, "next"),
            I::GotoNextSibling => write!(f, "sibling"),
        }
    }
}
