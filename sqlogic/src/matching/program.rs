use std::sync::Arc;

use log::trace;

use crate::{
    inst::{InstantiationValue, SVInstantiations},
    op::{SchemaVariable, SvKind},
    program::ProgramElement,
    sort::SortRegistry,
};

/// Matches a program pattern against a concrete program fragment.
///
/// Statement-list schema variables match any (possibly empty) run of
/// consecutive statements of a block; splits are tried from the shortest.
pub(crate) fn match_program(
    pattern: &ProgramElement,
    concrete: &ProgramElement,
    inst: SVInstantiations,
    registry: &SortRegistry,
) -> Option<SVInstantiations> {
    use ProgramElement as P;
    match (pattern, concrete) {
        (P::Schema(sv), _) => match_schema(sv, concrete, inst, registry),
        (P::Block(ps), P::Block(cs)) => match_list(ps, cs, inst, registry),
        (P::Assign { lhs: pl, rhs: pr }, P::Assign { lhs: cl, rhs: cr }) => {
            let inst = match_program(pl, cl, inst, registry)?;
            match_program(pr, cr, inst, registry)
        }
        (
            P::If {
                cond: pc,
                then_branch: pt,
                else_branch: pe,
            },
            P::If {
                cond: cc,
                then_branch: ct,
                else_branch: ce,
            },
        ) => {
            let inst = match_program(pc, cc, inst, registry)?;
            let inst = match_program(pt, ct, inst, registry)?;
            match (pe, ce) {
                (Some(pe), Some(ce)) => match_program(pe, ce, inst, registry),
                (None, None) => Some(inst),
                _ => None,
            }
        }
        (P::While { cond: pc, body: pb }, P::While { cond: cc, body: cb }) => {
            let inst = match_program(pc, cc, inst, registry)?;
            match_program(pb, cb, inst, registry)
        }
        (P::Unary { op: po, operand: pa }, P::Unary { op: co, operand: ca }) if po == co => {
            match_program(pa, ca, inst, registry)
        }
        (
            P::Binary {
                op: po,
                lhs: pl,
                rhs: pr,
            },
            P::Binary {
                op: co,
                lhs: cl,
                rhs: cr,
            },
        ) if po == co => {
            let inst = match_program(pl, cl, inst, registry)?;
            match_program(pr, cr, inst, registry)
        }
        (P::Skip, P::Skip) => Some(inst),
        (P::Variable(a), P::Variable(b)) if a == b => Some(inst),
        (P::IntLiteral(a), P::IntLiteral(b)) if a == b => Some(inst),
        (P::BoolLiteral(a), P::BoolLiteral(b)) if a == b => Some(inst),
        _ => None,
    }
}

fn match_schema(
    sv: &Arc<SchemaVariable>,
    concrete: &ProgramElement,
    inst: SVInstantiations,
    registry: &SortRegistry,
) -> Option<SVInstantiations> {
    let fits = match sv.kind() {
        SvKind::ProgramVariable => concrete.is_variable(),
        SvKind::Expression => concrete.is_expression(),
        SvKind::Statement => concrete.is_statement(),
        SvKind::StatementList => {
            let single = [ProgramElement::Schema(sv.clone())];
            return match_list(&single, concrete.statements(), inst, registry);
        }
        _ => false,
    };
    if !fits {
        return None;
    }
    inst.add(sv, InstantiationValue::Program(concrete.clone()), registry)
        .inspect_err(|e| trace!("Program match rejected: {e}"))
        .ok()
}

fn match_list(
    patterns: &[ProgramElement],
    concrete: &[ProgramElement],
    inst: SVInstantiations,
    registry: &SortRegistry,
) -> Option<SVInstantiations> {
    let Some((first, rest)) = patterns.split_first() else {
        return concrete.is_empty().then_some(inst);
    };

    if let ProgramElement::Schema(sv) = first {
        if sv.kind().is_statement_list() {
            if let Some(InstantiationValue::ProgramList(bound)) = inst.get(sv.name().as_str()) {
                let n = bound.len();
                if concrete.len() < n || concrete[..n] != bound[..] {
                    return None;
                }
                return match_list(rest, &concrete[n..], inst, registry);
            }
            let min_rest = rest
                .iter()
                .filter(|p| !matches!(p, ProgramElement::Schema(s) if s.kind().is_statement_list()))
                .count();
            let max = concrete.len().saturating_sub(min_rest);
            for k in 0..=max {
                let taken = &concrete[..k];
                if !taken.iter().all(ProgramElement::is_statement) {
                    break;
                }
                let Ok(with) = inst.add(sv, InstantiationValue::ProgramList(taken.to_vec()), registry)
                else {
                    continue;
                };
                if let Some(done) = match_list(rest, &concrete[k..], with, registry) {
                    return Some(done);
                }
            }
            return None;
        }
    }

    let (head, tail) = concrete.split_first()?;
    let inst = match_program(first, head, inst, registry)?;
    match_list(rest, tail, inst, registry)
}
