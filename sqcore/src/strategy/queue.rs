//! Per-goal queue of costed rule applications.
//!
//! Role
//! - Holds the applications of one goal ordered by cost, then by the
//!   discovery sequence number. `Top`-cost applications are never queued.
//! - [`RuleAppQueue::derive`] builds the queue of a new goal from the
//!   queue of its parent: applications that survive the sequent change are
//!   relocated and re-costed, and only the changed formulas are searched
//!   again (plus everything volatile).
//!
//! Performance
//! - Derivation avoids re-matching unchanged formulas, which dominate the
//!   sequent in long proofs.
use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use sqlogic::{
    sequent::{SequentChangeInfo, Side},
    services::Services,
};
use strum::IntoEnumIterator;

use super::{Strategy, cost::RuleAppCost, feature::GoalView};
use crate::{
    rules::{RuleApp, RuleDiscovery, Scope},
    utils::error::ProofResult,
};

#[derive(Debug, Clone)]
pub struct RuleAppContainer {
    pub cost: RuleAppCost,
    pub seq: u64,
    pub app: RuleApp,
}

#[derive(Debug, Clone, Default)]
pub struct RuleAppQueue {
    entries: BTreeMap<(RuleAppCost, u64), RuleApp>,
    next_seq: u64,
}

impl RuleAppQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Costs and queues `app`; returns whether it was queued.
    pub fn push(&mut self, app: RuleApp, cost: RuleAppCost) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        if cost.is_top() {
            return false;
        }
        self.entries.insert((cost, seq), app);
        true
    }

    pub fn pop_best(&mut self) -> Option<RuleAppContainer> {
        let ((cost, seq), app) = self.entries.pop_first()?;
        Some(RuleAppContainer { cost, seq, app })
    }

    pub fn best_cost(&self) -> Option<RuleAppCost> {
        self.entries.keys().next().map(|(c, _)| *c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Containers in queue order.
    pub fn iter(&self) -> impl Iterator<Item = RuleAppContainer> + '_ {
        self.entries.iter().map(|((cost, seq), app)| RuleAppContainer {
            cost: *cost,
            seq: *seq,
            app: app.clone(),
        })
    }

    /// Queue of a goal searched from scratch.
    pub fn fill(
        strategy: &dyn Strategy,
        discovery: &RuleDiscovery<'_>,
        goal: &GoalView<'_>,
        services: &Services,
    ) -> ProofResult<Self> {
        let mut queue = Self::new();
        for app in discovery.discover(goal.sequent, Scope::All)? {
            let cost = strategy.cost(&app, goal, services);
            queue.push(app, cost);
        }
        trace!("Queued {} applications for goal {}.", queue.len(), goal.node);
        Ok(queue)
    }

    /// Queue of the goal `goal`, whose sequent resulted from `change` of the
    /// sequent this queue was computed for.
    pub fn derive(
        &self,
        change: &SequentChangeInfo,
        strategy: &dyn Strategy,
        discovery: &RuleDiscovery<'_>,
        goal: &GoalView<'_>,
        services: &Services,
    ) -> ProofResult<Self> {
        let sequent = goal.sequent;
        let mut changed: BTreeSet<(Side, usize)> = BTreeSet::new();
        for side in Side::iter() {
            let fresh = change
                .added(side)
                .iter()
                .chain(change.modified(side).iter().map(|m| &m.new));
            for f in fresh {
                if let Some(i) = sequent.side(side).index_of(f) {
                    changed.insert((side, i));
                }
            }
        }

        // Entries are visited in queue order; re-queue them in discovery order.
        let mut kept: Vec<(u64, RuleApp)> = self
            .entries
            .iter()
            .filter(|(_, app)| !app.is_volatile())
            .filter_map(|((_, seq), app)| Some((*seq, app.relocate(sequent)?)))
            .collect();
        kept.sort_by_key(|(seq, _)| *seq);

        let mut queue = Self::new();
        for (_, app) in kept {
            let cost = strategy.cost(&app, goal, services);
            queue.push(app, cost);
        }
        let retained = queue.len();
        for app in discovery.discover(sequent, Scope::Changed(&changed))? {
            let cost = strategy.cost(&app, goal, services);
            queue.push(app, cost);
        }
        trace!(
            "Derived queue for goal {}: {retained} kept, {} new.",
            goal.node,
            queue.len() - retained
        );
        Ok(queue)
    }
}
