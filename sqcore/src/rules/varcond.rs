//! Variable conditions: side conditions a taclet application must satisfy
//! beyond a successful match. Some of them compute instantiations instead
//! of only checking them.
use std::{fmt, sync::Arc};

use log::trace;
use sqlogic::{
    inst::{GenericSortCondition, InstantiationValue, SVInstantiations},
    op::SchemaVariable,
    services::Services,
    sort::Sort,
    term::Term,
    update::{apply_update_on_rigid, drop_effectless_elementaries},
};
use strum::{Display, EnumString};

use crate::utils::error::ProofResult;

/// A user supplied condition.
pub trait VariableConditionCheck: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// The extended instantiations, or `None` to reject the application.
    fn check(&self, inst: SVInstantiations, services: &Services) -> ProofResult<Option<SVInstantiations>>;

    /// Schema variables this condition instantiates.
    fn outputs(&self) -> Vec<Arc<SchemaVariable>> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SortRelation {
    Same,
    Sub,
}

#[derive(Debug, Clone)]
pub enum VariableCondition {
    /// The logic variable of `var` is not free in the instantiation of `term`.
    NotFreeIn {
        var: Arc<SchemaVariable>,
        term: Arc<SchemaVariable>,
    },
    Different(Arc<SchemaVariable>, Arc<SchemaVariable>),
    SortCompatible {
        left: Arc<SchemaVariable>,
        right: Arc<SchemaVariable>,
        relation: SortRelation,
    },
    IsRigid(Arc<SchemaVariable>),
    /// Instantiates `target` with the value of `source`, or checks equality.
    ForceEqual {
        target: Arc<SchemaVariable>,
        source: Arc<SchemaVariable>,
    },
    /// Pins `generic` to the sort of the instantiation of `sv`.
    ForceGenericSort {
        generic: Sort,
        sv: Arc<SchemaVariable>,
    },
    /// `result := {u'}target` without the effectless elementary updates of `u`.
    DropEffectlessElementaries {
        update: Arc<SchemaVariable>,
        target: Arc<SchemaVariable>,
        result: Arc<SchemaVariable>,
    },
    /// `result := op({u}t1, ..., {u}tn)` for a rigid top operator of `target`.
    ApplyUpdateOnRigid {
        update: Arc<SchemaVariable>,
        target: Arc<SchemaVariable>,
        result: Arc<SchemaVariable>,
    },
    Custom(Arc<dyn VariableConditionCheck>),
}

fn term<'i>(inst: &'i SVInstantiations, sv: &SchemaVariable) -> Option<&'i Term> {
    inst.term(sv.name())
}

fn same_value(a: &InstantiationValue, b: &InstantiationValue) -> bool {
    match (a, b) {
        (InstantiationValue::Term(x), InstantiationValue::Term(y)) => x == y || x.equals_mod_renaming(y),
        _ => a == b,
    }
}

impl VariableCondition {
    pub fn name(&self) -> String {
        match self {
            VariableCondition::NotFreeIn { .. } => "not_free_in".into(),
            VariableCondition::Different(..) => "different".into(),
            VariableCondition::SortCompatible { relation, .. } => format!("{relation}_sort"),
            VariableCondition::IsRigid(_) => "is_rigid".into(),
            VariableCondition::ForceEqual { .. } => "force_equal".into(),
            VariableCondition::ForceGenericSort { .. } => "force_generic_sort".into(),
            VariableCondition::DropEffectlessElementaries { .. } => "drop_effectless".into(),
            VariableCondition::ApplyUpdateOnRigid { .. } => "apply_update_on_rigid".into(),
            VariableCondition::Custom(c) => c.name().to_string(),
        }
    }

    /// Schema variables instantiated by this condition rather than by matching.
    pub fn outputs(&self) -> Vec<Arc<SchemaVariable>> {
        match self {
            VariableCondition::ForceEqual { target, .. } => vec![target.clone()],
            VariableCondition::DropEffectlessElementaries { result, .. }
            | VariableCondition::ApplyUpdateOnRigid { result, .. } => vec![result.clone()],
            VariableCondition::Custom(c) => c.outputs(),
            _ => Vec::new(),
        }
    }

    /// Schema variables read by this condition.
    pub fn inputs(&self) -> Vec<Arc<SchemaVariable>> {
        match self {
            VariableCondition::NotFreeIn { var, term } => vec![var.clone(), term.clone()],
            VariableCondition::Different(a, b) => vec![a.clone(), b.clone()],
            VariableCondition::SortCompatible { left, right, .. } => vec![left.clone(), right.clone()],
            VariableCondition::IsRigid(sv) => vec![sv.clone()],
            VariableCondition::ForceEqual { source, .. } => vec![source.clone()],
            VariableCondition::ForceGenericSort { sv, .. } => vec![sv.clone()],
            VariableCondition::DropEffectlessElementaries { update, target, .. }
            | VariableCondition::ApplyUpdateOnRigid { update, target, .. } => {
                vec![update.clone(), target.clone()]
            }
            VariableCondition::Custom(_) => Vec::new(),
        }
    }

    /// Checks the condition. Conditions over schema variables that are not
    /// instantiated yet hold vacuously.
    pub fn check(&self, inst: SVInstantiations, services: &Services) -> ProofResult<Option<SVInstantiations>> {
        let registry = services.sorts();
        let outcome = match self {
            VariableCondition::NotFreeIn { var, term: t } => {
                let v = term(&inst, var).and_then(|v| v.as_logic_variable());
                match (v, term(&inst, t)) {
                    (Some(v), Some(t)) => (!t.has_free_var(v)).then_some(inst),
                    _ => Some(inst),
                }
            }
            VariableCondition::Different(a, b) => match (inst.get(a.name()), inst.get(b.name())) {
                (Some(x), Some(y)) => (!same_value(x, y)).then_some(inst),
                _ => Some(inst),
            },
            VariableCondition::SortCompatible { left, right, relation } => {
                match (term(&inst, left), term(&inst, right)) {
                    (Some(l), Some(r)) => {
                        let ok = match relation {
                            SortRelation::Same => l.sort() == r.sort(),
                            SortRelation::Sub => l.sort().extends_trans(r.sort()),
                        };
                        ok.then_some(inst)
                    }
                    _ => Some(inst),
                }
            }
            VariableCondition::IsRigid(sv) => match term(&inst, sv) {
                Some(t) => t.is_rigid().then_some(inst),
                None => Some(inst),
            },
            VariableCondition::ForceEqual { target, source } => match inst.get(source.name()).cloned() {
                None => Some(inst),
                Some(value) => match inst.get(target.name()) {
                    Some(existing) => same_value(existing, &value).then_some(inst),
                    None => inst.add(target, value, registry).ok(),
                },
            },
            VariableCondition::ForceGenericSort { generic, sv } => match term(&inst, sv) {
                None => Some(inst),
                Some(t) => {
                    let cond = GenericSortCondition::Identity {
                        generic: generic.clone(),
                        sort: t.sort().clone(),
                    };
                    inst.add_generic_condition(cond, registry).ok()
                }
            },
            VariableCondition::DropEffectlessElementaries { update, target, result } => {
                self.compute(inst, update, target, result, services, drop_effectless_elementaries)?
            }
            VariableCondition::ApplyUpdateOnRigid { update, target, result } => {
                self.compute(inst, update, target, result, services, apply_update_on_rigid)?
            }
            VariableCondition::Custom(c) => c.check(inst, services)?,
        };
        if outcome.is_none() {
            trace!("Variable condition `{}` rejected the application.", self.name());
        }
        Ok(outcome)
    }

    fn compute(
        &self,
        inst: SVInstantiations,
        update: &SchemaVariable,
        target: &SchemaVariable,
        result: &Arc<SchemaVariable>,
        services: &Services,
        f: fn(&Term, &Term, &Services) -> sqlogic::Result<Option<Term>>,
    ) -> ProofResult<Option<SVInstantiations>> {
        let (Some(u), Some(t)) = (term(&inst, update), term(&inst, target)) else {
            return Ok(None);
        };
        match f(u, t, services)? {
            Some(r) => Ok(inst.add_term(result, r, services.sorts()).ok()),
            None => Ok(None),
        }
    }
}
