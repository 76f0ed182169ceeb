//! Rule applications.
//!
//! A [`TacletApp`] is built in stages: matching the find part at a
//! position, matching the assumes formulas, adding instantiations that
//! matching cannot provide, and finally [`TacletApp::finish`], which runs
//! the variable conditions, resolves generic sorts and checks prefixes.
//! Only finished applications may be executed.
use std::{fmt, sync::Arc};

use log::trace;
use sqlogic::{
    Name,
    inst::{InstantiationValue, SVInstantiations},
    matching::{MatchConditions, MatchProgram},
    op::{BoundVariable, LogicVariable, Operator, SchemaVariable},
    sequent::{PosInOccurrence, Sequent, Side},
    services::Services,
    term::Term,
};

use super::{
    builtin::BuiltInRule,
    taclet::{ApplicationRestriction, Taclet, TacletKind},
};
use crate::utils::error::{ProofError, ProofResult};

#[derive(Debug, Clone)]
pub struct TacletApp {
    taclet: Arc<Taclet>,
    pos: Option<PosInOccurrence>,
    inst: SVInstantiations,
    assumes: Vec<PosInOccurrence>,
    context_vars: Vec<LogicVariable>,
    finished: bool,
}

/// What lies above a find position.
struct PathInfo {
    updates: Vec<Term>,
    only_updates: bool,
    in_state_scope: bool,
    bound: Vec<LogicVariable>,
}

fn walk_path(pos: &PosInOccurrence) -> PathInfo {
    let mut info = PathInfo {
        updates: Vec::new(),
        only_updates: true,
        in_state_scope: false,
        bound: Vec::new(),
    };
    let mut t = pos.formula().formula();
    for &i in pos.pos_in_term().indices() {
        let i = i as usize;
        match t.op() {
            Operator::UpdateApplication if i == 1 => {
                info.updates.push(t.sub(0).clone());
                info.in_state_scope = true;
            }
            Operator::Modality(_) => {
                info.only_updates = false;
                info.in_state_scope = true;
            }
            _ => info.only_updates = false,
        }
        if t.binding_scope() == Some(i) {
            info.bound.extend(t.bound_vars().iter().filter_map(BoundVariable::as_logic).cloned());
        }
        t = t.sub(i);
    }
    info
}

impl TacletApp {
    /// Matches the find part of `taclet` at `pos`; `None` if it does not apply there.
    pub fn at(taclet: &Arc<Taclet>, pos: Option<PosInOccurrence>, services: &Services) -> ProofResult<Option<TacletApp>> {
        let unmatched = |pos| TacletApp {
            taclet: taclet.clone(),
            pos,
            inst: SVInstantiations::new(),
            assumes: Vec::new(),
            context_vars: Vec::new(),
            finished: false,
        };
        let Some(pos) = pos else {
            return Ok(taclet.kind().is_no_find().then(|| unmatched(None)));
        };
        let side_ok = match taclet.kind() {
            TacletKind::NoFind => false,
            TacletKind::Rewrite => true,
            TacletKind::Antecedent => pos.is_top_level() && pos.side().is_antecedent(),
            TacletKind::Succedent => pos.is_top_level() && pos.side().is_succedent(),
        };
        if !side_ok {
            return Ok(None);
        }

        let restriction = taclet.restriction();
        let path = walk_path(&pos);
        if restriction.contains(ApplicationRestriction::SAME_UPDATE_LEVEL) && !path.only_updates {
            return Ok(None);
        }
        if restriction.contains(ApplicationRestriction::IN_SEQUENT_STATE) && path.in_state_scope {
            return Ok(None);
        }
        let touches_sequent = !taclet.assumes().is_empty()
            || taclet.goals().iter().any(|g| !g.add.is_empty() || !g.addrules.is_empty());
        if path.in_state_scope && touches_sequent && !restriction.contains(ApplicationRestriction::SAME_UPDATE_LEVEL) {
            return Ok(None);
        }
        let polarity = pos.polarity();
        if restriction.contains(ApplicationRestriction::ANTECEDENT_POLARITY) && polarity != Some(false) {
            return Ok(None);
        }
        if restriction.contains(ApplicationRestriction::SUCCEDENT_POLARITY) && polarity != Some(true) {
            return Ok(None);
        }

        let Some(program) = taclet.find_program() else {
            return Ok(None);
        };
        let focus = pos.subterm()?;
        let mut start = SVInstantiations::new();
        if restriction.contains(ApplicationRestriction::SAME_UPDATE_LEVEL) {
            start = start.with_update_context(path.updates.iter().cloned());
        }
        let Some(mc) = program.run(focus, MatchConditions::with_instantiations(start), services) else {
            return Ok(None);
        };
        trace!("Taclet `{}` matched at {}.", taclet.name(), pos.pos_in_term());
        let mut app = unmatched(Some(pos));
        app.inst = mc.into_instantiations();
        app.context_vars = path.bound;
        Ok(Some(app))
    }

    pub fn taclet(&self) -> &Arc<Taclet> {
        &self.taclet
    }

    pub fn pos(&self) -> Option<&PosInOccurrence> {
        self.pos.as_ref()
    }

    pub fn instantiations(&self) -> &SVInstantiations {
        &self.inst
    }

    pub fn assumes_positions(&self) -> &[PosInOccurrence] {
        &self.assumes
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn assumes_program(&self, index: usize, services: &Services) -> ProofResult<MatchProgram> {
        let (_, pattern) = &self.taclet.assumes()[index];
        let context = self.inst.update_context();
        if context.is_empty() {
            return Ok(self.taclet.assumes_programs()[index].clone());
        }
        let tb = services.tb();
        let mut wrapped = pattern.clone();
        for u in context.iter().rev() {
            wrapped = tb.apply(u.clone(), wrapped)?;
        }
        Ok(MatchProgram::compile(&wrapped))
    }

    fn match_assumes_at(
        mut self,
        index: usize,
        candidate: &PosInOccurrence,
        program: &MatchProgram,
        services: &Services,
    ) -> Option<TacletApp> {
        let mc = MatchConditions::with_instantiations(self.inst.clone());
        let mc = program.run(candidate.formula().formula(), mc, services)?;
        self.inst = mc.into_instantiations();
        self.assumes.push(candidate.clone());
        self.finished = false;
        Some(self)
    }

    /// Every way of matching the assumes formulas against `sequent`, in
    /// sequent order. The find formula itself is not a candidate.
    pub fn match_assumes(&self, sequent: &Sequent, services: &Services) -> ProofResult<Vec<TacletApp>> {
        let mut partial = vec![self.clone()];
        for index in self.assumes.len()..self.taclet.assumes().len() {
            let (side, _) = &self.taclet.assumes()[index];
            let program = self.assumes_program(index, services)?;
            let mut next = Vec::new();
            for app in partial {
                for (i, f) in sequent.side(*side).iter().enumerate() {
                    let is_find = app.pos.as_ref().is_some_and(|p| p.side() == *side && p.index() == i);
                    if is_find {
                        continue;
                    }
                    let candidate = PosInOccurrence::top_level(*side, i, f.clone());
                    if let Some(found) = app.clone().match_assumes_at(index, &candidate, &program, services) {
                        next.push(found);
                    }
                }
            }
            partial = next;
            if partial.is_empty() {
                break;
            }
        }
        Ok(partial)
    }

    /// Matches the assumes formulas against the given top-level formulas.
    pub fn with_assumes(&self, positions: &[PosInOccurrence], services: &Services) -> ProofResult<Option<TacletApp>> {
        if positions.len() != self.taclet.assumes().len() {
            return Ok(None);
        }
        let mut app = self.clone();
        app.assumes.clear();
        for (index, p) in positions.iter().enumerate() {
            if p.side() != self.taclet.assumes()[index].0 || !p.is_top_level() {
                return Ok(None);
            }
            let program = app.assumes_program(index, services)?;
            match app.match_assumes_at(index, p, &program, services) {
                Some(next) => app = next,
                None => return Ok(None),
            }
        }
        Ok(Some(app))
    }

    /// Adds an instantiation that matching could not provide.
    pub fn with_instantiation(
        &self,
        sv: &Arc<SchemaVariable>,
        value: InstantiationValue,
        services: &Services,
    ) -> ProofResult<TacletApp> {
        let inst = self
            .inst
            .add(sv, value, services.sorts())
            .map_err(|e| ProofError::illegal(self.taclet.name(), e))?;
        Ok(TacletApp {
            inst,
            finished: false,
            ..self.clone()
        })
    }

    /// Same as [`Self::with_instantiation`] for the schema variable called `name`.
    pub fn with_term(&self, name: &str, t: Term, services: &Services) -> ProofResult<TacletApp> {
        let sv = self
            .taclet
            .schema_variable(name)
            .ok_or_else(|| ProofError::illegal(self.taclet.name(), format!("no schema variable `{name}`")))?
            .clone();
        self.with_instantiation(&sv, InstantiationValue::Term(t), services)
    }

    /// Schema variables that still need a value from outside.
    pub fn missing(&self) -> Vec<Arc<SchemaVariable>> {
        self.taclet
            .heuristic_svs()
            .iter()
            .chain(self.taclet.interactive_svs())
            .filter(|sv| !self.inst.is_instantiated(sv))
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.assumes.len() == self.taclet.assumes().len() && self.missing().is_empty()
    }

    /// Runs the variable conditions, resolves generic sorts and checks the
    /// prefixes. `Ok(None)` rejects the application; an ambiguous generic
    /// sort is an error.
    pub fn finish(mut self, services: &Services) -> ProofResult<Option<TacletApp>> {
        if !self.is_complete() {
            return Ok(None);
        }
        for c in self.taclet.varconds() {
            match c.check(self.inst.clone(), services)? {
                Some(inst) => self.inst = inst,
                None => return Ok(None),
            }
        }
        if let Err(e) = self.inst.generic_instantiations(services.sorts()) {
            if e.is_ambiguous_generic_sort() {
                return Err(ProofError::InvariantViolation(format!(
                    "taclet `{}`: {e}",
                    self.taclet.name()
                )));
            }
            return Ok(None);
        }
        if !self.taclet.prefix().admits(&self.inst, &self.context_vars) {
            trace!("Taclet `{}` rejected by its prefix check.", self.taclet.name());
            return Ok(None);
        }
        self.finished = true;
        Ok(Some(self))
    }

    /// Same application on a changed sequent, if its formulas are still there.
    pub fn relocate(&self, sequent: &Sequent) -> Option<TacletApp> {
        let pos = match &self.pos {
            Some(p) => Some(p.relocate(sequent)?),
            None => None,
        };
        let assumes = self
            .assumes
            .iter()
            .map(|p| p.relocate(sequent))
            .collect::<Option<Vec<_>>>()?;
        Some(TacletApp {
            pos,
            assumes,
            ..self.clone()
        })
    }
}

#[derive(Clone)]
pub struct BuiltInRuleApp {
    pub rule: Arc<dyn BuiltInRule>,
    pub pos: Option<PosInOccurrence>,
}

impl fmt::Debug for BuiltInRuleApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltInRuleApp")
            .field("rule", self.rule.name())
            .field("pos", &self.pos.as_ref().map(|p| p.pos_in_term().to_string()))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum RuleApp {
    Taclet(TacletApp),
    BuiltIn(BuiltInRuleApp),
}

impl From<TacletApp> for RuleApp {
    fn from(app: TacletApp) -> Self {
        RuleApp::Taclet(app)
    }
}

impl RuleApp {
    pub fn rule_name(&self) -> &Name {
        match self {
            RuleApp::Taclet(t) => t.taclet.name(),
            RuleApp::BuiltIn(b) => b.rule.name(),
        }
    }

    pub fn pos(&self) -> Option<&PosInOccurrence> {
        match self {
            RuleApp::Taclet(t) => t.pos(),
            RuleApp::BuiltIn(b) => b.pos.as_ref(),
        }
    }

    pub fn rule_sets(&self) -> &[Name] {
        match self {
            RuleApp::Taclet(t) => t.taclet.rule_sets(),
            RuleApp::BuiltIn(b) => b.rule.rule_sets(),
        }
    }

    pub fn as_taclet_app(&self) -> Option<&TacletApp> {
        match self {
            RuleApp::Taclet(t) => Some(t),
            RuleApp::BuiltIn(_) => None,
        }
    }

    /// Applications whose availability depends on the whole sequent.
    pub fn is_volatile(&self) -> bool {
        match self {
            RuleApp::Taclet(t) => t.taclet.is_volatile(),
            RuleApp::BuiltIn(_) => true,
        }
    }

    pub fn relocate(&self, sequent: &Sequent) -> Option<RuleApp> {
        match self {
            RuleApp::Taclet(t) => t.relocate(sequent).map(RuleApp::Taclet),
            RuleApp::BuiltIn(b) => {
                let pos = match &b.pos {
                    Some(p) => Some(p.relocate(sequent)?),
                    None => None,
                };
                Some(RuleApp::BuiltIn(BuiltInRuleApp {
                    rule: b.rule.clone(),
                    pos,
                }))
            }
        }
    }

    /// Whether `self` and `other` apply the same rule to the same formula
    /// occurrence with the same instantiations. Formula indices are ignored.
    pub fn same_application(&self, other: &RuleApp) -> bool {
        let same_pos = |a: Option<&PosInOccurrence>, b: Option<&PosInOccurrence>| match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.side() == b.side() && a.formula() == b.formula() && a.pos_in_term() == b.pos_in_term()
            }
            _ => false,
        };
        if self.rule_name() != other.rule_name() || !same_pos(self.pos(), other.pos()) {
            return false;
        }
        match (self, other) {
            (RuleApp::Taclet(a), RuleApp::Taclet(b)) => a.inst.iter().eq(b.inst.iter()),
            _ => true,
        }
    }

    /// Side of the focus, if any.
    pub fn side(&self) -> Option<Side> {
        self.pos().map(PosInOccurrence::side)
    }
}
