//! Notifications about proof tree changes.
//!
//! Every mutation of a [`super::Proof`] returns the events it caused and
//! also sends them to the subscribed channels. A subscriber whose receiver
//! was dropped is forgotten on the next send.
use crossbeam::channel::{Receiver, Sender, unbounded};
use log::trace;
use sqlogic::{Name, sequent::SequentChangeInfo};
use strum::EnumIs;
use uuid::Uuid;

use super::{NodeId, journal::NodeChangeJournal};

#[derive(Debug, Clone, EnumIs)]
pub enum ProofEvent {
    NodeAdded { node: NodeId, parent: Option<NodeId> },
    /// An open goal was replaced by the goals of a rule application; `by`
    /// is empty when the application closed it.
    GoalReplaced { goal: NodeId, by: Vec<NodeId> },
    SequentChanged { node: NodeId, change: SequentChangeInfo },
    GoalClosed { goal: NodeId },
    Pruned { node: NodeId, removed: Vec<NodeId> },
    ProofClosed { proof: Uuid },
}

/// Result of applying one rule to a goal.
#[derive(Debug, Clone)]
pub struct RuleAppInfo {
    pub node: NodeId,
    pub rule: Name,
    pub new_goals: Vec<NodeId>,
    pub journal: NodeChangeJournal,
    pub events: Vec<ProofEvent>,
}

impl RuleAppInfo {
    pub fn closed_goal(&self) -> bool {
        self.new_goals.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Vec<Sender<ProofEvent>>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self) -> Receiver<ProofEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn publish(&mut self, events: &[ProofEvent]) {
        if self.subscribers.is_empty() {
            return;
        }
        self.subscribers
            .retain(|tx| events.iter().all(|e| tx.send(e.clone()).is_ok()));
        trace!("Published {} proof events to {} subscribers.", events.len(), self.subscribers.len());
    }
}
