//! The automatic proof search loop.
//!
//! Role
//! - Keeps one [`RuleAppQueue`] per open goal, applies the cheapest
//!   application of the goal picked by the [`GoalChooser`] and derives the
//!   queues of the new goals from the queue of their parent.
//! - Stops on a closed proof, when no automatic goal has a finite-cost
//!   application left, on the step or time budget, or when the [`StopFlag`]
//!   is raised. Stop checks happen only between applications.
//!
//! Goals applied to from outside the prover (interactive steps, pruning)
//! are picked up on the next step: stale queues are dropped and unknown
//! goals are searched from scratch.
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use strum::{Display, EnumIs};

use crate::{
    proof::{NodeId, Proof, RuleAppInfo},
    rules::RuleDiscovery,
    settings::StrategySettings,
    strategy::{GoalChooser, GoalView, RuleAppCost, RuleAppQueue, Strategy, create_strategy, goal_chooser},
    utils::error::{ProofError, ProofResult},
};

pub mod side;

/// Cooperative cancellation flag shared between a running prover and its
/// controllers.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    Closed,
    NoApplicableRule,
    MaxSteps,
    Timeout,
    Cancelled,
}

/// Summary of one [`Prover::run`].
#[derive(Debug, Clone)]
pub struct ProverRunInfo {
    pub reason: StopReason,
    /// Applications carried out.
    pub steps: usize,
    pub closed_goals: usize,
    pub open_goals: usize,
    pub elapsed: Duration,
    /// Applications that failed and were dropped from their queue.
    pub skipped: usize,
}

#[derive(Debug)]
pub enum StepOutcome {
    Applied(RuleAppInfo),
    /// The chosen application failed; it is gone from its queue.
    Skipped(ProofError),
    /// No automatic goal has a finite-cost application.
    NothingApplicable,
}

pub struct Prover {
    strategy: Box<dyn Strategy>,
    chooser: Box<dyn GoalChooser>,
    settings: StrategySettings,
    stop: StopFlag,
    agendas: BTreeMap<NodeId, RuleAppQueue>,
}

impl Prover {
    /// Prover using the strategy registered under `settings.name`.
    pub fn new(settings: &StrategySettings) -> ProofResult<Self> {
        let strategy = create_strategy(settings)?;
        Ok(Self::with_strategy(strategy, settings))
    }

    pub fn with_strategy(strategy: Box<dyn Strategy>, settings: &StrategySettings) -> Self {
        Self {
            strategy,
            chooser: goal_chooser(settings.goal_chooser),
            settings: settings.clone(),
            stop: StopFlag::new(),
            agendas: BTreeMap::new(),
        }
    }

    /// Handle to cancel a running [`Self::run`] from another thread.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub fn settings(&self) -> &StrategySettings {
        &self.settings
    }

    /// Queue of `goal` as currently known to the prover.
    pub fn agenda(&self, goal: NodeId) -> Option<&RuleAppQueue> {
        self.agendas.get(&goal)
    }

    fn fresh_queue(&self, proof: &Proof, goal: NodeId) -> ProofResult<RuleAppQueue> {
        let node = proof.node(goal)?;
        let branch = proof.applied_on_branch(goal)?;
        let view = GoalView {
            node: goal,
            sequent: node.sequent(),
            branch: &branch,
        };
        let discovery = RuleDiscovery::new(proof.rules(), proof.services()).with_local_rules(node.local_rules());
        RuleAppQueue::fill(self.strategy.as_ref(), &discovery, &view, proof.services())
    }

    fn sync_agendas(&mut self, proof: &Proof) -> ProofResult<()> {
        self.agendas.retain(|id, _| proof.goal(*id).is_some());
        for goal in proof.open_goals() {
            if !self.agendas.contains_key(&goal) {
                let queue = self.fresh_queue(proof, goal)?;
                self.agendas.insert(goal, queue);
            }
        }
        Ok(())
    }

    fn automatic(&self, proof: &Proof) -> impl Iterator<Item = (NodeId, Option<RuleAppCost>)> {
        self.agendas
            .iter()
            .filter(|(id, _)| proof.goal(**id).is_some_and(|g| g.is_automatic()))
            .map(|(id, queue)| (*id, queue.best_cost()))
    }

    /// Applies the cheapest application of the chosen goal.
    ///
    /// Only fatal errors are returned; a failing application is dropped and
    /// reported as [`StepOutcome::Skipped`].
    pub fn step(&mut self, proof: &mut Proof) -> ProofResult<StepOutcome> {
        self.sync_agendas(proof)?;
        let candidates: Vec<(NodeId, RuleAppCost)> = self
            .automatic(proof)
            .filter_map(|(id, cost)| Some((id, cost?)))
            .collect();
        let Some(goal) = self.chooser.choose(&candidates) else {
            return Ok(StepOutcome::NothingApplicable);
        };
        let Some(mut queue) = self.agendas.remove(&goal) else {
            return Err(ProofError::InvariantViolation(format!(
                "goal chooser `{}` picked {goal}, which has no queue",
                self.chooser.name()
            )));
        };
        let Some(best) = queue.pop_best() else {
            return Ok(StepOutcome::NothingApplicable);
        };
        let rule = best.app.rule_name().clone();
        debug!("Applying `{rule}` on {goal} at cost {}.", best.cost);

        match proof.apply(goal, best.app) {
            Ok(info) => {
                for child in &info.new_goals {
                    let Some(change) = info.journal.change(*child) else {
                        continue;
                    };
                    let node = proof.node(*child)?;
                    let branch = proof.applied_on_branch(*child)?;
                    let view = GoalView {
                        node: *child,
                        sequent: node.sequent(),
                        branch: &branch,
                    };
                    let discovery =
                        RuleDiscovery::new(proof.rules(), proof.services()).with_local_rules(node.local_rules());
                    let derived = queue.derive(change, self.strategy.as_ref(), &discovery, &view, proof.services())?;
                    self.agendas.insert(*child, derived);
                }
                Ok(StepOutcome::Applied(info))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Skipping `{rule}` on {goal}: {e}");
                self.agendas.insert(goal, queue);
                Ok(StepOutcome::Skipped(e))
            }
        }
    }

    /// Searches until one of the [`StopReason`]s holds.
    pub fn run(&mut self, proof: &mut Proof) -> ProofResult<ProverRunInfo> {
        let start = Instant::now();
        let timeout = self.settings.timeout_ms.map(Duration::from_millis);
        let mut steps = 0;
        let mut closed_goals = 0;
        let mut skipped = 0;
        info!(
            "Starting `{}` on proof `{}` with {} open goals.",
            self.strategy.name(),
            proof.name(),
            proof.open_goals().len()
        );

        let reason = loop {
            if proof.is_closed() {
                break StopReason::Closed;
            }
            if self.stop.is_stopped() {
                break StopReason::Cancelled;
            }
            if steps >= self.settings.max_steps {
                break StopReason::MaxSteps;
            }
            if timeout.is_some_and(|t| start.elapsed() >= t) {
                break StopReason::Timeout;
            }
            if self.settings.stop_at_first_open_goal {
                self.sync_agendas(proof)?;
                if self.automatic(proof).any(|(_, cost)| cost.is_none()) {
                    break StopReason::NoApplicableRule;
                }
            }
            match self.step(proof)? {
                StepOutcome::Applied(info) => {
                    steps += 1;
                    if info.closed_goal() {
                        closed_goals += 1;
                    }
                }
                StepOutcome::Skipped(_) => skipped += 1,
                StepOutcome::NothingApplicable => break StopReason::NoApplicableRule,
            }
        };

        let run = ProverRunInfo {
            reason,
            steps,
            closed_goals,
            open_goals: proof.open_goals().len(),
            elapsed: start.elapsed(),
            skipped,
        };
        info!(
            "Stopped ({}) after {} steps in {:?}: {} goals closed, {} open, {} skipped.",
            run.reason, run.steps, run.elapsed, run.closed_goals, run.open_goals, run.skipped
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_utils::{first_order_env, proof_for};

    #[test]
    fn closes_propositional_tautology() {
        let (services, rules) = first_order_env();
        let mut proof = proof_for(&services, &rules, "p(c) & q ==> q & p(c)");
        let mut prover = Prover::new(&StrategySettings::default()).unwrap();
        let run = prover.run(&mut proof).unwrap();
        assert_eq!(run.reason, StopReason::Closed);
        assert!(proof.is_closed());
        assert_eq!(run.open_goals, 0);
        assert_eq!(run.closed_goals, 2);
    }

    #[test]
    fn raised_flag_cancels_before_any_step() {
        let (services, rules) = first_order_env();
        let mut proof = proof_for(&services, &rules, "p(c) ==> p(c)");
        let mut prover = Prover::new(&StrategySettings::default()).unwrap();
        prover.stop_flag().stop();
        let run = prover.run(&mut proof).unwrap();
        assert_eq!(run.reason, StopReason::Cancelled);
        assert_eq!(run.steps, 0);
        assert!(!proof.is_closed());
    }

    #[test]
    fn step_budget_is_a_normal_stop() {
        let (services, rules) = first_order_env();
        let mut proof = proof_for(&services, &rules, "==> (p(c) | q) & (q | r)");
        let settings = StrategySettings {
            max_steps: 1,
            ..StrategySettings::default()
        };
        let run = Prover::new(&settings).unwrap().run(&mut proof).unwrap();
        assert_eq!(run.reason, StopReason::MaxSteps);
        assert_eq!(run.steps, 1);
        assert_eq!(proof.open_goals().len(), run.open_goals);
    }

    #[test]
    fn interactive_goals_are_left_alone() {
        let (services, rules) = first_order_env();
        let mut proof = proof_for(&services, &rules, "p(c) ==> p(c)");
        proof.set_automatic(proof.root(), false).unwrap();
        let run = Prover::new(&StrategySettings::default())
            .unwrap()
            .run(&mut proof)
            .unwrap();
        assert_eq!(run.reason, StopReason::NoApplicableRule);
        assert_eq!(run.steps, 0);
    }
}
