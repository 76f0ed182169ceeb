//! Finding the applicable rules of a goal.
//!
//! Role
//! - Produces finished applications in a fixed order: no-find taclets,
//!   goal-wide built-in rules, then per formula (sequent order) and per
//!   position (pre-order) the taclets in registration order. The order
//!   breaks ties between equal costs, so proof search is reproducible.
//! - With [`Scope::Changed`] only the listed formulas are searched in full;
//!   the others only for volatile taclets, whose applications depend on
//!   the rest of the sequent.
//!
//! Performance
//! - [`Taclet::may_match`] filters on the top operator before a match
//!   program runs.
use std::{collections::BTreeSet, sync::Arc};

use im::Vector;
use log::trace;
use sqlogic::{
    inst::InstantiationValue,
    sequent::{PosInOccurrence, Sequent, Side},
    services::Services,
    term::Term,
};

use super::{
    app::{BuiltInRuleApp, RuleApp, TacletApp},
    index::RuleBase,
    taclet::Taclet,
};
use crate::{magic::MAX_HEURISTIC_CANDIDATES, utils::error::ProofResult};

#[derive(Debug, Clone, Copy)]
pub enum Scope<'s> {
    All,
    /// Formulas added or modified by the last rule application.
    Changed(&'s BTreeSet<(Side, usize)>),
}

impl Scope<'_> {
    fn searches(&self, side: Side, index: usize) -> bool {
        match self {
            Scope::All => true,
            Scope::Changed(set) => set.contains(&(side, index)),
        }
    }
}

pub struct RuleDiscovery<'a> {
    rules: &'a RuleBase,
    local: Option<&'a Vector<Arc<Taclet>>>,
    services: &'a Services,
}

impl<'a> RuleDiscovery<'a> {
    pub fn new(rules: &'a RuleBase, services: &'a Services) -> Self {
        Self {
            rules,
            local: None,
            services,
        }
    }

    /// Also offers the taclets added on the goal's branch, after the rule base.
    pub fn with_local_rules(mut self, local: &'a Vector<Arc<Taclet>>) -> Self {
        self.local = Some(local);
        self
    }

    fn taclets(&self) -> impl Iterator<Item = &'a Arc<Taclet>> + use<'a> {
        self.rules.taclets().iter().chain(self.local.into_iter().flatten())
    }

    pub fn discover(&self, sequent: &Sequent, scope: Scope<'_>) -> ProofResult<Vec<RuleApp>> {
        let mut out = Vec::new();
        let candidates = GroundTerms::collect(sequent);

        for taclet in self.taclets().filter(|t| t.kind().is_no_find()) {
            if matches!(scope, Scope::Changed(_)) && !taclet.is_volatile() {
                continue;
            }
            if let Some(app) = TacletApp::at(taclet, None, self.services)? {
                self.complete(app, sequent, &candidates, &mut out)?;
            }
        }

        for rule in self.rules.builtins() {
            if !rule.applies_at_positions() && rule.is_applicable(sequent, None, self.services) {
                out.push(RuleApp::BuiltIn(BuiltInRuleApp {
                    rule: rule.clone(),
                    pos: None,
                }));
            }
        }

        for (side, index, f) in sequent.iter() {
            let full = scope.searches(side, index);
            for (pit, sub) in f.formula().positions() {
                let pos = PosInOccurrence::new(side, index, f.clone(), pit);
                for taclet in self.taclets() {
                    if taclet.kind().is_no_find() || !(full || taclet.is_volatile()) || !taclet.may_match(sub) {
                        continue;
                    }
                    if let Some(app) = TacletApp::at(taclet, Some(pos.clone()), self.services)? {
                        self.complete(app, sequent, &candidates, &mut out)?;
                    }
                }
                if !full {
                    continue;
                }
                for rule in self.rules.builtins().iter().filter(|r| r.applies_at_positions()) {
                    if rule.is_applicable(sequent, Some(&pos), self.services) {
                        out.push(RuleApp::BuiltIn(BuiltInRuleApp {
                            rule: rule.clone(),
                            pos: Some(pos.clone()),
                        }));
                    }
                }
            }
        }
        trace!("Discovered {} rule applications.", out.len());
        Ok(out)
    }

    /// Matches assumes, fills heuristic instantiations and finishes `app`.
    fn complete(&self, app: TacletApp, sequent: &Sequent, ground: &GroundTerms, out: &mut Vec<RuleApp>) -> ProofResult<()> {
        for with_assumes in app.match_assumes(sequent, self.services)? {
            for filled in self.fill_heuristics(with_assumes, ground) {
                if !filled.taclet().interactive_svs().iter().all(|sv| filled.instantiations().is_instantiated(sv)) {
                    continue;
                }
                if let Some(done) = filled.finish(self.services)? {
                    out.push(RuleApp::Taclet(done));
                }
            }
        }
        Ok(())
    }

    fn fill_heuristics(&self, app: TacletApp, ground: &GroundTerms) -> Vec<TacletApp> {
        let mut apps = vec![app];
        let svs = apps[0].taclet().heuristic_svs().to_vec();
        for sv in svs {
            let mut next = Vec::new();
            for app in apps {
                if app.instantiations().is_instantiated(&sv) {
                    next.push(app);
                    continue;
                }
                let filled = ground
                    .terms
                    .iter()
                    .filter_map(|t| app.with_instantiation(&sv, InstantiationValue::Term(t.clone()), self.services).ok())
                    .take(MAX_HEURISTIC_CANDIDATES);
                next.extend(filled);
            }
            apps = next;
        }
        apps
    }
}

/// Closed non-formula terms of a sequent in order of first occurrence.
struct GroundTerms {
    terms: Vec<Term>,
}

impl GroundTerms {
    fn collect(sequent: &Sequent) -> Self {
        let mut terms: Vec<Term> = Vec::new();
        for (_, _, f) in sequent.iter() {
            for (_, t) in f.formula().positions() {
                let usable = t.is_closed()
                    && !t.is_formula()
                    && !t.sort().is_update()
                    && !t.contains_modality()
                    && !t.contains_schema_variables();
                if usable && !terms.contains(t) {
                    terms.push(t.clone());
                }
            }
        }
        Self { terms }
    }
}
