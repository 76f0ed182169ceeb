//! Carrying out a finished rule application on a sequent.
//!
//! Execution is pure: it computes the sequents of the new goals, the
//! skolem constants it introduces and the rules it adds, but commits
//! nothing. The proof commits the result (and declares the constants)
//! only when execution succeeded, so a failing application leaves the
//! proof untouched.
use std::sync::Arc;

use log::debug;
use smallvec::SmallVec;
use sqlogic::{
    Name,
    inst::{GenericSortInstantiations, InstantiationValue, SVInstantiations},
    op::{Function, LogicVariable, SvKind},
    sequent::{
        PosInOccurrence, Semisequent, SemisequentChangeInfo, Sequent, SequentChangeInfo, SequentFormula, Side,
    },
    services::Services,
};
use strum::IntoEnumIterator;

use super::{
    app::{BuiltInRuleApp, RuleApp, TacletApp},
    instantiate::Instantiator,
    taclet::{Replacement, Taclet},
};
use crate::utils::error::{ProofError, ProofResult};

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub label: Option<String>,
    pub change: SequentChangeInfo,
    pub added_rules: Vec<Arc<Taclet>>,
}

impl NewGoal {
    pub fn sequent(&self) -> &Sequent {
        &self.change.result
    }
}

#[derive(Debug, Clone)]
pub struct Execution {
    /// New goals in template order; empty when the goal is closed.
    pub goals: Vec<NewGoal>,
    /// Skolem constants to declare once the result is committed.
    pub introduced: Vec<Arc<Function>>,
    /// Final instantiation of a taclet application, generated values included.
    pub instantiations: Option<SVInstantiations>,
}

impl Execution {
    pub fn closes(&self) -> bool {
        self.goals.is_empty()
    }
}

/// Executes `app` on `sequent`.
///
/// `name_taken` reports names already used by rules or symbols outside
/// the services' namespaces (rule names in particular); fresh names for
/// skolem constants and added rules avoid them.
pub fn execute(
    app: &RuleApp,
    sequent: &Sequent,
    services: &Services,
    name_taken: &dyn Fn(&str) -> bool,
) -> ProofResult<Execution> {
    match app {
        RuleApp::Taclet(t) => execute_taclet(t, sequent, services, name_taken),
        RuleApp::BuiltIn(b) => execute_builtin(b, sequent, services),
    }
}

fn check_present(rule: &Name, sequent: &Sequent, pos: &PosInOccurrence) -> ProofResult<()> {
    match sequent.formula(pos.side(), pos.index()) {
        Some(f) if f == pos.formula() => Ok(()),
        _ => Err(ProofError::illegal(
            rule,
            format!("formula `{}` is not in the goal", pos.formula().formula()),
        )),
    }
}

fn execute_taclet(
    app: &TacletApp,
    sequent: &Sequent,
    services: &Services,
    name_taken: &dyn Fn(&str) -> bool,
) -> ProofResult<Execution> {
    let taclet = app.taclet();
    let name = taclet.name();
    if !app.is_finished() {
        return Err(ProofError::illegal(name, "the application is incomplete"));
    }
    if let Some(pos) = app.pos() {
        check_present(name, sequent, pos)?;
    }
    for p in app.assumes_positions() {
        check_present(name, sequent, p)?;
    }

    let sorts = services.sorts();
    let generic = app.instantiations().generic_instantiations(sorts)?;
    let mut inst = app.instantiations().clone();
    let mut introduced: Vec<Arc<Function>> = Vec::new();
    let is_fresh = |n: &str, introduced: &[Arc<Function>]| {
        !services.namespaces().is_taken(n) && !name_taken(n) && !introduced.iter().any(|f| f.name().as_str() == n)
    };
    // Variables free at the find position, which a generated binder must not capture.
    let at_find = app.pos().map(|p| p.subterm()).transpose()?;
    let mut free_names: Vec<Name> = sequent
        .iter()
        .flat_map(|(_, _, f)| f.formula().free_vars().iter())
        .chain(at_find.into_iter().flat_map(|t| t.free_vars().iter()))
        .map(|v| v.name().clone())
        .collect();
    for sv in taclet.generated_svs() {
        if inst.is_instantiated(sv) {
            continue;
        }
        inst = match sv.kind() {
            SvKind::Skolem => {
                let sort = generic.realize(sv.sort(), sorts)?;
                let fresh = Name::fresh_variant(sv.name(), |n| !is_fresh(n, &introduced));
                let f = Arc::new(Function::skolem(fresh, sort));
                let t = services.tb().func(&f, [])?;
                introduced.push(f);
                inst.add_term(sv, t, sorts)?
            }
            SvKind::Variable => {
                let sort = generic.realize(sv.sort(), sorts)?;
                let fresh = Name::fresh_variant(sv.name(), |n| {
                    !is_fresh(n, &introduced) || free_names.iter().any(|f| f.as_str() == n)
                });
                let v = LogicVariable::new(fresh, sort);
                free_names.push(v.name().clone());
                inst.add_term(sv, services.tb().var(&v)?, sorts)?
            }
            SvKind::Label => inst.add(sv, InstantiationValue::Labels(SmallVec::new()), sorts)?,
            other => {
                return Err(ProofError::InvariantViolation(format!(
                    "taclet `{name}`: `{}` of kind {other:?} cannot be generated",
                    sv.name()
                )));
            }
        };
    }

    let grounder = Instantiator::new(&inst, &generic, services);
    let mut rule_names: Vec<Name> = Vec::new();
    let mut goals = Vec::with_capacity(taclet.goals().len());
    for template in taclet.goals() {
        let mut change = SequentChangeInfo::unchanged(sequent);
        match (&template.replacewith, app.pos()) {
            (Some(Replacement::Term(r)), Some(pos)) => {
                let replacement = grounder.term(r)?;
                let top = services
                    .term_factory()
                    .replace_at(pos.formula().formula(), pos.pos_in_term().indices(), replacement)?;
                let step = change.result.replace(pos.side(), pos.index(), SequentFormula::new(top)?);
                change = change.combine(step);
            }
            (Some(Replacement::Sequent(s)), Some(pos)) => {
                change = replace_find(change, pos, s, &grounder)?;
            }
            (Some(_), None) => {
                return Err(ProofError::InvariantViolation(format!(
                    "taclet `{name}` replaces its find but has none"
                )));
            }
            (None, _) => {}
        }
        for side in Side::iter() {
            let added = template
                .add
                .side(side)
                .iter()
                .map(|f| SequentFormula::new(grounder.in_update_context(grounder.term(f.formula())?)?).map_err(ProofError::from))
                .collect::<ProofResult<Vec<_>>>()?;
            if added.is_empty() {
                continue;
            }
            let len = change.result.side(side).len();
            let step = change.result.insert_all(side, len, added);
            change = change.combine(step);
        }

        let mut added_rules = Vec::new();
        for rule in &template.addrules {
            let fresh = Name::fresh_variant(rule.name(), |n| name_taken(n) || rule_names.iter().any(|r| r.as_str() == n));
            rule_names.push(fresh.clone());
            added_rules.push(Arc::new(rule.specialize(fresh, &inst, services)?));
        }
        goals.push(NewGoal {
            label: template.label.clone(),
            change,
            added_rules,
        });
    }
    debug!(
        "Executed `{name}`: {} new goals, {} skolem constants.",
        goals.len(),
        introduced.len()
    );
    Ok(Execution {
        goals,
        introduced,
        instantiations: Some(inst),
    })
}

/// Replaces the find formula by the same-side formulas of `s`, in place,
/// and appends the formulas of the other side.
fn replace_find(
    mut change: SequentChangeInfo,
    pos: &PosInOccurrence,
    s: &Sequent,
    grounder: &Instantiator<'_>,
) -> ProofResult<SequentChangeInfo> {
    let ground = |semi: &Semisequent| -> ProofResult<Vec<SequentFormula>> {
        semi.iter()
            .map(|f| Ok(SequentFormula::new(grounder.in_update_context(grounder.term(f.formula())?)?)?))
            .collect()
    };
    let side = pos.side();
    let mut same = ground(s.side(side))?.into_iter();
    let other = ground(s.side(side.opposite()))?;

    let step = match same.next() {
        Some(first) => change.result.replace(side, pos.index(), first),
        None => change.result.remove(side, pos.index()),
    };
    change = change.combine(step);
    let rest: Vec<_> = same.collect();
    if !rest.is_empty() {
        let at = (pos.index() + 1).min(change.result.side(side).len());
        let step = change.result.insert_all(side, at, rest);
        change = change.combine(step);
    }
    if !other.is_empty() {
        let len = change.result.side(side.opposite()).len();
        let step = change.result.insert_all(side.opposite(), len, other);
        change = change.combine(step);
    }
    Ok(change)
}

fn execute_builtin(app: &BuiltInRuleApp, sequent: &Sequent, services: &Services) -> ProofResult<Execution> {
    if let Some(pos) = &app.pos {
        check_present(app.rule.name(), sequent, pos)?;
    }
    let goals = app
        .rule
        .apply(sequent, app.pos.as_ref(), services)?
        .into_iter()
        .map(|result| NewGoal {
            label: None,
            change: diff(sequent, result),
            added_rules: Vec::new(),
        })
        .collect();
    Ok(Execution {
        goals,
        introduced: Vec::new(),
        instantiations: None,
    })
}

/// Change record turning `old` into `new`, formula by formula.
fn diff(old: &Sequent, new: Sequent) -> SequentChangeInfo {
    let side_diff = |side: Side| {
        let (before, after) = (old.side(side), new.side(side));
        let info = SemisequentChangeInfo {
            added: after.iter().filter(|f| before.index_of(f).is_none()).cloned().collect(),
            removed: before.iter().filter(|f| after.index_of(f).is_none()).cloned().collect(),
            modified: Vec::new(),
            rejected: Vec::new(),
            result: after.clone(),
        };
        info.has_changed().then_some(info)
    };
    SequentChangeInfo {
        antecedent: side_diff(Side::Antecedent),
        succedent: side_diff(Side::Succedent),
        original: old.clone(),
        result: new,
    }
}
