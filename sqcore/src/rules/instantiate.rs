//! Grounding of taclet templates under an instantiation.
use std::sync::Arc;

use smallvec::SmallVec;
use sqlogic::{
    inst::{GenericSortInstantiations, InstantiationValue, SVInstantiations},
    op::{BoundVariable, Modality, ModalityRef, Operator, SchemaVariable, UpdateTarget},
    program::{ProgramElement, ProgramFill},
    services::Services,
    term::{Term, TermLabel},
};

use crate::utils::error::{ProofError, ProofResult};

/// Replaces schema variables of templates by their instantiations.
///
/// Substitution operators whose variable is known are applied on the fly,
/// renaming binders that would capture free variables of the replacement.
/// In partial mode schema variables without instantiation are left in place
/// and substitutions are kept; this is used to specialise added rules.
pub struct Instantiator<'a> {
    inst: &'a SVInstantiations,
    generic: &'a GenericSortInstantiations,
    services: &'a Services,
    partial: bool,
}

impl<'a> Instantiator<'a> {
    pub fn new(inst: &'a SVInstantiations, generic: &'a GenericSortInstantiations, services: &'a Services) -> Self {
        Self {
            inst,
            generic,
            services,
            partial: false,
        }
    }

    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    fn missing(&self, sv: &SchemaVariable) -> ProofError {
        ProofError::Logic(sqlogic::Error::Uninstantiated { sv: sv.name().clone() })
    }

    pub fn term(&self, t: &Term) -> ProofResult<Term> {
        let tf = self.services.term_factory();
        if let Operator::SchemaVariable(sv) = t.op() {
            let Some(value) = self.inst.get(sv.name()) else {
                return if self.partial { Ok(t.clone()) } else { Err(self.missing(sv)) };
            };
            let grounded = match value {
                InstantiationValue::Term(v) => v.clone(),
                InstantiationValue::Program(p) if sv.sort().is_formula() => self.services.program_to_formula(p)?,
                InstantiationValue::Program(p) => self.services.program_to_term(p)?,
                other => {
                    return Err(ProofError::InvariantViolation(format!(
                        "`{}` := {other} used in term position",
                        sv.name()
                    )));
                }
            };
            if !t.has_labels() {
                return Ok(grounded);
            }
            let mut labels: SmallVec<TermLabel, 1> = grounded.labels().iter().cloned().collect();
            for l in self.labels(t.labels()) {
                if !labels.contains(&l) {
                    labels.push(l);
                }
            }
            return Ok(tf.relabel(&grounded, labels)?);
        }

        let subs = t
            .subs()
            .iter()
            .map(|s| self.term(s))
            .collect::<ProofResult<SmallVec<Term, 2>>>()?;

        let mut bound: SmallVec<BoundVariable, 1> = SmallVec::new();
        for b in t.bound_vars() {
            match b {
                BoundVariable::Schema(sv) => match self.inst.term(sv.name()).and_then(|v| v.as_logic_variable()) {
                    Some(v) => bound.push(BoundVariable::Logic(v.clone())),
                    None if self.partial => bound.push(b.clone()),
                    None => return Err(self.missing(sv)),
                },
                logic => bound.push(logic.clone()),
            }
        }

        if t.op().is_substitution() && !self.partial {
            if let Some(BoundVariable::Logic(v)) = bound.first() {
                return Ok(tf.substitute(&subs[1], v, &subs[0])?);
            }
        }

        let op = self.operator(t.op())?;
        let labels = self.labels(t.labels());
        Ok(tf.create(op, subs, bound, labels)?)
    }

    fn labels(&self, labels: &[TermLabel]) -> SmallVec<TermLabel, 1> {
        let mut out = SmallVec::new();
        for l in labels {
            match l {
                TermLabel::Schema(sv) => match self.inst.get(sv.name()) {
                    Some(InstantiationValue::Labels(ls)) => out.extend(ls.iter().cloned()),
                    _ if self.partial => out.push(l.clone()),
                    _ => {}
                },
                named => out.push(named.clone()),
            }
        }
        out
    }

    fn operator(&self, op: &Operator) -> ProofResult<Operator> {
        Ok(match op {
            Operator::ElementaryUpdate(UpdateTarget::Schema(sv)) => match self.inst.get(sv.name()) {
                Some(InstantiationValue::Program(ProgramElement::Variable(pv))) => {
                    Operator::ElementaryUpdate(UpdateTarget::Variable(pv.clone()))
                }
                _ if self.partial => op.clone(),
                _ => return Err(self.missing(sv)),
            },
            Operator::Modality(m) => {
                let kind = match &m.kind {
                    ModalityRef::Schema(sv) => match self.inst.get(sv.name()) {
                        Some(InstantiationValue::Modality(k)) => ModalityRef::Concrete(*k),
                        _ if self.partial => m.kind.clone(),
                        _ => return Err(self.missing(sv)),
                    },
                    concrete => concrete.clone(),
                };
                let program = if m.program.contains_schema() {
                    match self.program(&m.program) {
                        Ok(p) => Arc::new(p),
                        Err(_) if self.partial => m.program.clone(),
                        Err(e) => return Err(e),
                    }
                } else {
                    m.program.clone()
                };
                Operator::Modality(Modality { kind, program })
            }
            Operator::Parametric(f) if f.args().iter().any(|s| s.contains_generic()) => {
                let registry = self.services.sorts();
                let args = match f
                    .args()
                    .iter()
                    .map(|s| self.generic.realize(s, registry))
                    .collect::<sqlogic::Result<Vec<_>>>()
                {
                    Ok(args) => args,
                    Err(_) if self.partial => return Ok(op.clone()),
                    Err(e) => return Err(e.into()),
                };
                Operator::Parametric(self.services.instantiate_parametric(f.decl(), &args)?)
            }
            other => other.clone(),
        })
    }

    pub fn program(&self, p: &ProgramElement) -> ProofResult<ProgramElement> {
        let inst = self.inst;
        let fill = |sv: &Arc<SchemaVariable>| -> Option<ProgramFill<'a>> {
            match inst.get(sv.name())? {
                InstantiationValue::Program(e) => Some(ProgramFill::One(e)),
                InstantiationValue::ProgramList(es) => Some(ProgramFill::Many(es)),
                _ => None,
            }
        };
        Ok(p.instantiate(&fill)?)
    }

    /// Wraps `t` into the update context of the instantiation, outermost first.
    pub fn in_update_context(&self, t: Term) -> ProofResult<Term> {
        let tb = self.services.tb();
        let mut out = t;
        for u in self.inst.update_context().iter().rev() {
            out = tb.apply(u.clone(), out)?;
        }
        Ok(out)
    }
}
