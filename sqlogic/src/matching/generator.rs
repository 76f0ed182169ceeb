use super::{MatchInstruction, instruction::renaming_pairs};
use crate::{
    op::{ModalityRef, Operator, UpdateTarget},
    term::Term,
};

/// Emits the instructions matching `pattern`, ending with the cursor on the
/// pre-order successor of the matched sub-term.
pub(crate) fn emit(pattern: &Term, out: &mut Vec<MatchInstruction>) {
    let is_ground = !pattern.contains_schema_variables()
        && pattern.is_closed()
        && pattern.bound_vars().is_empty()
        && !pattern.has_labels();
    if is_ground && !pattern.op().is_logic_variable() {
        out.push(MatchInstruction::MatchGround(pattern.clone()));
        out.push(MatchInstruction::GotoNextSibling);
        return;
    }

    if pattern.has_labels() {
        out.push(MatchInstruction::MatchTermLabels(
            pattern.labels().iter().cloned().collect(),
        ));
    }

    match pattern.op() {
        Operator::SchemaVariable(sv) => {
            out.push(MatchInstruction::MatchSchemaVariable(sv.clone()));
            out.push(MatchInstruction::GotoNextSibling);
            return;
        }
        Operator::LogicVariable(v) => {
            out.push(MatchInstruction::MatchLogicVariable(v.clone()));
            out.push(MatchInstruction::GotoNextSibling);
            return;
        }
        Operator::Parametric(f) if f.args().iter().any(|s| s.contains_generic()) => {
            out.push(MatchInstruction::MatchSimilarParametric(f.clone()));
        }
        Operator::ElementaryUpdate(target @ UpdateTarget::Schema(_)) => {
            out.push(MatchInstruction::MatchElementaryUpdate(target.clone()));
        }
        Operator::Modality(m)
            if matches!(m.kind, ModalityRef::Schema(_)) || m.program.contains_schema() =>
        {
            out.push(MatchInstruction::MatchModality(m.clone()));
        }
        op => out.push(MatchInstruction::MatchOperator(op.clone())),
    }

    if pattern.arity() == 0 {
        out.push(MatchInstruction::GotoNextSibling);
        return;
    }

    out.push(MatchInstruction::GotoNext);
    let scope = pattern.binding_scope();
    for (i, sub) in pattern.subs().iter().enumerate() {
        if scope == Some(i) {
            out.push(MatchInstruction::BindVariables(
                pattern.bound_vars().iter().cloned().collect(),
            ));
        }
        emit(sub, out);
        if scope == Some(i) {
            let pushed = renaming_pairs(pattern.bound_vars());
            if pushed > 0 {
                out.push(MatchInstruction::UnbindVariables(pushed));
            }
        }
    }
}
